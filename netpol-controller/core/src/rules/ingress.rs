use super::{established_allow, policy_jump, Ensure};
use crate::{ChainConfig, ChainName, PodSnapshot, PolicySnapshot, RuleSpec};

/// Runs traffic destined to the pod through every policy that selects it for ingress.
///
/// A pod no policy selects is handed to the default ingress chain instead, which leaves it open.
/// Jumps are inserted at the chain head in the order `policies` is given; that order carries no
/// precedence.
pub fn ingress_rules(
    pod: &PodSnapshot,
    pod_chain: &ChainName,
    policies: &[PolicySnapshot],
    chains: &ChainConfig,
) -> Vec<Ensure> {
    let mut rules = policies
        .iter()
        .filter(|p| p.policy_type.governs_ingress() && p.targets(&pod.ip))
        .map(|p| Ensure::head(pod_chain, policy_jump(p)))
        .collect::<Vec<_>>();

    if rules.is_empty() {
        let rule = RuleSpec::new()
            .dst(pod.ip)
            .comment("run through default ingress policy chain")
            .jump(&chains.default_ingress);
        rules.push(Ensure::head(pod_chain, rule));
    }

    let local_node = RuleSpec::new()
        .comment("rule to permit the traffic to pods when source is the pod's local node")
        .src_local()
        .dst(pod.ip)
        .accept();
    rules.push(Ensure::head(pod_chain, local_node));
    rules.push(Ensure::head(pod_chain, established_allow()));

    rules
}
