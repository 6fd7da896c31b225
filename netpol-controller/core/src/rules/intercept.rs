use super::Ensure;
use crate::{ChainConfig, ChainName, PodSnapshot, RuleSpec};

/// Sends traffic destined to the pod through its chain.
///
/// Routed traffic from other nodes is caught in the forward chain; traffic the service proxy
/// sends back to a pod on this node is caught in the output chain; traffic switched between pods
/// on the same bridge is caught in the forward chain by the physdev match.
pub fn inbound_interception(
    pod: &PodSnapshot,
    pod_chain: &ChainName,
    chains: &ChainConfig,
) -> Vec<Ensure> {
    let comment = format!(
        "rule to jump traffic destined to POD name:{} namespace: {} to chain {}",
        pod.name, pod.namespace, pod_chain
    );
    let routed = RuleSpec::new()
        .comment(&comment)
        .dst(pod.ip)
        .jump(pod_chain);
    let bridged = RuleSpec::new()
        .bridged()
        .comment(comment)
        .dst(pod.ip)
        .jump(pod_chain);

    vec![
        Ensure::head(&chains.forward, routed.clone()),
        Ensure::head(&chains.output, routed),
        Ensure::head(&chains.forward, bridged),
    ]
}

/// Sends traffic sourced from the pod through its chain, whichever path it leaves by.
pub fn outbound_interception(
    pod: &PodSnapshot,
    pod_chain: &ChainName,
    chains: &ChainConfig,
) -> Vec<Ensure> {
    let comment = format!(
        "rule to jump traffic from POD name:{} namespace: {} to chain {}",
        pod.name, pod.namespace, pod_chain
    );
    let routed = RuleSpec::new()
        .comment(&comment)
        .src(pod.ip)
        .jump(pod_chain);
    let bridged = RuleSpec::new()
        .bridged()
        .comment(comment)
        .src(pod.ip)
        .jump(pod_chain);

    let mut rules = [&chains.input, &chains.forward, &chains.output]
        .into_iter()
        .map(|chain| Ensure::tail(chain, routed.clone()))
        .collect::<Vec<_>>();
    rules.push(Ensure::head(&chains.forward, bridged));
    rules
}
