use crate::{core::PolicySnapshot, core::PolicyType, index::Resync};
use parking_lot::RwLock;
use std::{collections::HashSet, net::IpAddr, sync::Arc};

/// Produces the policy memberships for a synchronization pass.
pub trait ResolvePolicies {
    /// Returns every policy with chain references for `version`.
    fn resolve(&self, version: &str) -> Vec<PolicySnapshot>;
}

/// A network policy's membership, independent of any generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPolicy {
    pub namespace: String,
    pub name: String,
    pub policy_type: PolicyType,
    pub target_pods: HashSet<IpAddr>,
}

/// Holds the most recently published policy memberships.
///
/// Publishing requests a resync so that pod chains pick up the change.
#[derive(Clone, Debug)]
pub struct SharedPolicies {
    policies: Arc<RwLock<Vec<ResolvedPolicy>>>,
    resync: Resync,
}

// === impl SharedPolicies ===

impl SharedPolicies {
    pub fn new(resync: Resync) -> Self {
        Self {
            policies: Arc::new(RwLock::new(Vec::new())),
            resync,
        }
    }

    pub fn publish(&self, policies: impl IntoIterator<Item = ResolvedPolicy>) {
        let policies = policies.into_iter().collect::<Vec<_>>();
        tracing::debug!(policies = policies.len(), "Publishing network policies");
        *self.policies.write() = policies;
        self.resync.request();
    }
}

impl ResolvePolicies for SharedPolicies {
    fn resolve(&self, version: &str) -> Vec<PolicySnapshot> {
        self.policies
            .read()
            .iter()
            .map(|p| {
                PolicySnapshot::new(
                    &*p.namespace,
                    &*p.name,
                    p.target_pods.iter().copied(),
                    version,
                )
                .with_policy_type(p.policy_type)
            })
            .collect()
    }
}

impl<R: ResolvePolicies + ?Sized> ResolvePolicies for Arc<R> {
    fn resolve(&self, version: &str) -> Vec<PolicySnapshot> {
        (**self).resolve(version)
    }
}
