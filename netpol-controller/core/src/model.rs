use crate::{policy_chain_name, ChainName};
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    net::IpAddr,
};

/// Pods scheduled on this node that have an address, keyed by that address.
pub type LocalPods = BTreeMap<IpAddr, PodSnapshot>;

/// The parts of a pod that firewall rules are built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodSnapshot {
    pub ip: IpAddr,
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
}

/// Traffic directions a policy governs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PolicyType {
    Ingress,
    Egress,
    #[default]
    Both,
}

/// A network policy as resolved for one generation.
///
/// The policy's own chain is built elsewhere; pod chains only jump to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicySnapshot {
    pub name: String,
    pub namespace: String,
    pub policy_type: PolicyType,

    /// Addresses of the pods this policy selects.
    pub target_pods: HashSet<IpAddr>,

    /// The chain implementing this policy's rules.
    pub chain: ChainName,
}

/// Chains in use after a synchronization pass. Chains with the pod chain prefix that are not in
/// this set are stale.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActiveChains(BTreeSet<ChainName>);

// === impl PolicyType ===

impl PolicyType {
    pub fn governs_ingress(self) -> bool {
        matches!(self, Self::Ingress | Self::Both)
    }

    pub fn governs_egress(self) -> bool {
        matches!(self, Self::Egress | Self::Both)
    }
}

// === impl PolicySnapshot ===

impl PolicySnapshot {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        target_pods: impl IntoIterator<Item = IpAddr>,
        version: &str,
    ) -> Self {
        let namespace = namespace.into();
        let name = name.into();
        let chain = policy_chain_name(&namespace, &name, version);
        Self {
            name,
            namespace,
            policy_type: PolicyType::default(),
            target_pods: target_pods.into_iter().collect(),
            chain,
        }
    }

    pub fn with_policy_type(mut self, policy_type: PolicyType) -> Self {
        self.policy_type = policy_type;
        self
    }

    pub fn targets(&self, ip: &IpAddr) -> bool {
        self.target_pods.contains(ip)
    }
}

// === impl ActiveChains ===

impl ActiveChains {
    pub fn insert(&mut self, chain: ChainName) -> bool {
        self.0.insert(chain)
    }

    pub fn contains(&self, chain: &str) -> bool {
        self.0.contains(chain)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainName> {
        self.0.iter()
    }
}

impl IntoIterator for ActiveChains {
    type Item = ChainName;
    type IntoIter = std::collections::btree_set::IntoIter<ChainName>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<ChainName> for ActiveChains {
    fn from_iter<I: IntoIterator<Item = ChainName>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
