use super::{established_allow, policy_jump, Ensure};
use crate::{ChainConfig, ChainName, PodSnapshot, PolicySnapshot, RuleSpec};

/// Runs traffic sourced from the pod through every policy that selects it for egress, or through
/// the default egress chain when none does.
pub fn egress_rules(
    pod: &PodSnapshot,
    pod_chain: &ChainName,
    policies: &[PolicySnapshot],
    chains: &ChainConfig,
) -> Vec<Ensure> {
    let mut rules = policies
        .iter()
        .filter(|p| p.policy_type.governs_egress() && p.targets(&pod.ip))
        .map(|p| Ensure::head(pod_chain, policy_jump(p)))
        .collect::<Vec<_>>();

    if rules.is_empty() {
        let rule = RuleSpec::new()
            .src(pod.ip)
            .comment("run through default egress policy chain")
            .jump(&chains.default_egress);
        rules.push(Ensure::head(pod_chain, rule));
    }

    rules.push(Ensure::head(pod_chain, established_allow()));
    rules
}
