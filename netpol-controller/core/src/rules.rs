//! Decides which rules must exist for a pod.
//!
//! Builders are pure: they return the rules a pod needs, in the order they must be applied, and
//! leave the packet filter alone. [`PodFirewall`](crate::PodFirewall) applies them.

mod egress;
mod ingress;
mod intercept;
mod tail;

pub use self::{
    egress::egress_rules,
    ingress::ingress_rules,
    intercept::{inbound_interception, outbound_interception},
    tail::{drop_unmarked, mark_tail},
};
use crate::{ChainConfig, ChainName, DropLogConfig, PodSnapshot, PolicySnapshot, RuleSpec};

/// A rule that must exist in a chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ensure {
    pub chain: ChainName,
    pub placement: Placement,
    pub rule: RuleSpec,
}

/// Where a missing rule is added. Either way, a rule that already exists is left in place.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Inserted at position 1, so the most recently inserted rule is evaluated first.
    Head,
    Tail,
}

/// Everything a pod's chain needs, in application order: policy dispatch, interception of the
/// global paths, then the chain tail.
pub fn pod_rules(
    pod: &PodSnapshot,
    pod_chain: &ChainName,
    policies: &[PolicySnapshot],
    chains: &ChainConfig,
    drop_log: &DropLogConfig,
) -> Vec<Ensure> {
    let mut rules = ingress_rules(pod, pod_chain, policies, chains);
    rules.extend(egress_rules(pod, pod_chain, policies, chains));
    rules.extend(inbound_interception(pod, pod_chain, chains));
    rules.extend(outbound_interception(pod, pod_chain, chains));
    rules.extend(drop_unmarked(pod, pod_chain, drop_log));
    rules.extend(mark_tail(pod_chain));
    rules
}

// === impl Ensure ===

impl Ensure {
    pub(crate) fn head(chain: &ChainName, rule: RuleSpec) -> Self {
        Self {
            chain: chain.clone(),
            placement: Placement::Head,
            rule,
        }
    }

    pub(crate) fn tail(chain: &ChainName, rule: RuleSpec) -> Self {
        Self {
            chain: chain.clone(),
            placement: Placement::Tail,
            rule,
        }
    }
}

/// A jump from a pod chain to a policy chain.
fn policy_jump(policy: &PolicySnapshot) -> RuleSpec {
    RuleSpec::new()
        .comment(format!("run through nw policy {}", policy.name))
        .jump(&policy.chain)
}

/// Permits return traffic for connections the firewall already admitted.
fn established_allow() -> RuleSpec {
    RuleSpec::new()
        .comment("rule for stateful firewall for pod")
        .established()
        .accept()
}
