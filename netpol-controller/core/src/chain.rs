use data_encoding::BASE32;
use sha2::{Digest, Sha256};
use std::{borrow::Borrow, fmt};

/// Prefix of per-pod firewall chains.
pub const POD_CHAIN_PREFIX: &str = "KUBE-POD-FW-";

/// Prefix of per-policy chains.
pub const POLICY_CHAIN_PREFIX: &str = "KUBE-NWPLCY-";

/// Number of encoded digest characters kept in a chain name.
///
/// iptables limits chain names to 28 characters; the longest prefix plus the suffix must fit.
const DIGEST_LEN: usize = 16;

/// The name of a filter chain.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainName(String);

/// Names the firewall chain of a pod for a given generation.
pub fn pod_chain_name(namespace: &str, pod: &str, version: &str) -> ChainName {
    ChainName::hashed(POD_CHAIN_PREFIX, namespace, pod, version)
}

/// Names the chain holding a network policy's rules for a given generation.
pub fn policy_chain_name(namespace: &str, policy: &str, version: &str) -> ChainName {
    ChainName::hashed(POLICY_CHAIN_PREFIX, namespace, policy, version)
}

// === impl ChainName ===

impl ChainName {
    /// Wraps a chain that is not content-addressed, e.g. a pre-provisioned global chain.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    fn hashed(prefix: &str, namespace: &str, name: &str, version: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update(name.as_bytes());
        hasher.update(version.as_bytes());
        let encoded = BASE32.encode(&hasher.finalize());
        Self(format!("{prefix}{}", &encoded[..DIGEST_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for ChainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ChainName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChainName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
