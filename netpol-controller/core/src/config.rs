use crate::ChainName;

/// Names of the pre-provisioned chains that pod chains are wired into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainConfig {
    /// Traffic addressed to the node itself.
    pub input: ChainName,

    /// Routed and bridged traffic.
    pub forward: ChainName,

    /// Traffic originated on the node, including service-proxied traffic returning to a pod.
    pub output: ChainName,

    /// Jumped to from a pod chain when no policy selects the pod for ingress.
    pub default_ingress: ChainName,

    /// Jumped to from a pod chain when no policy selects the pod for egress.
    pub default_egress: ChainName,
}

/// Parameters of the rule that logs traffic about to be rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropLogConfig {
    pub nflog_group: u16,

    /// An iptables `limit` rate, e.g. `10/minute`.
    pub limit: String,

    pub limit_burst: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            input: "KUBE-ROUTER-INPUT".into(),
            forward: "KUBE-ROUTER-FORWARD".into(),
            output: "KUBE-ROUTER-OUTPUT".into(),
            default_ingress: "KUBE-NWPLCY-DEFAULT-INGRESS".into(),
            default_egress: "KUBE-NWPLCY-DEFAULT-EGRESS".into(),
        }
    }
}

impl Default for DropLogConfig {
    fn default() -> Self {
        Self {
            nflog_group: 100,
            limit: "10/minute".to_string(),
            limit_burst: 10,
        }
    }
}
