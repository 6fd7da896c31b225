use super::Ensure;
use crate::{
    mark::{FINAL_PASS, PROVISIONAL_PASS},
    ChainName, DropLogConfig, PodSnapshot, RuleSpec,
};

/// Logs, then rejects, traffic that no policy chain marked as permitted.
pub fn drop_unmarked(
    pod: &PodSnapshot,
    pod_chain: &ChainName,
    drop_log: &DropLogConfig,
) -> Vec<Ensure> {
    let log = RuleSpec::new()
        .comment(format!(
            "rule to log dropped traffic POD name:{} namespace: {}",
            pod.name, pod.namespace
        ))
        .without_mark(PROVISIONAL_PASS)
        .nflog(drop_log.nflog_group)
        .limit(&drop_log.limit, drop_log.limit_burst);
    let reject = RuleSpec::new()
        .comment(format!(
            "rule to REJECT traffic destined for POD name:{} namespace: {}",
            pod.name, pod.namespace
        ))
        .without_mark(PROVISIONAL_PASS)
        .reject();

    vec![Ensure::tail(pod_chain, log), Ensure::tail(pod_chain, reject)]
}

/// Hands surviving traffic on: clears the provisional bit so the packet can be evaluated afresh
/// by another pod chain (when source and destination are both local), then sets the final bit
/// the node's accept rule matches.
pub fn mark_tail(pod_chain: &ChainName) -> Vec<Ensure> {
    let reset = RuleSpec::new().set_mark(PROVISIONAL_PASS.clear());
    let accept = RuleSpec::new()
        .comment("set mark to ACCEPT traffic that comply to network policies")
        .set_mark(FINAL_PASS.set());
    vec![Ensure::tail(pod_chain, reset), Ensure::tail(pod_chain, accept)]
}
