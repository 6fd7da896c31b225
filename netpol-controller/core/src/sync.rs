use crate::{
    pod_chain_name,
    rules::{self, Ensure, Placement},
    ActiveChains, ChainConfig, ChainName, DropLogConfig, LocalPods, PolicySnapshot, Table,
    FILTER_TABLE,
};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::{net::IpAddr, sync::Arc};
use tracing::{debug, info, instrument, trace};

/// Lists the pods running on a node.
pub trait LocalPodSource {
    /// Returns the pods hosted at `node_ip` that have been assigned an address.
    fn local_pods(&self, node_ip: IpAddr) -> Result<LocalPods>;
}

impl<S: LocalPodSource> LocalPodSource for Arc<RwLock<S>> {
    fn local_pods(&self, node_ip: IpAddr) -> Result<LocalPods> {
        self.read().local_pods(node_ip)
    }
}

/// Materializes per-pod firewall chains on a node.
#[derive(Debug)]
pub struct PodFirewall<T, P> {
    table: T,
    pods: P,
    node_ip: IpAddr,
    chains: ChainConfig,
    drop_log: DropLogConfig,
}

// === impl PodFirewall ===

impl<T: Table, P: LocalPodSource> PodFirewall<T, P> {
    pub fn new(table: T, pods: P, node_ip: IpAddr) -> Self {
        Self {
            table,
            pods,
            node_ip,
            chains: ChainConfig::default(),
            drop_log: DropLogConfig::default(),
        }
    }

    pub fn with_chains(mut self, chains: ChainConfig) -> Self {
        self.chains = chains;
        self
    }

    pub fn with_drop_log(mut self, drop_log: DropLogConfig) -> Self {
        self.drop_log = drop_log;
        self
    }

    pub fn node_ip(&self) -> IpAddr {
        self.node_ip
    }

    /// Ensures every local pod has a chain for `version`, wired into the global paths and
    /// dispatching to the chains of the policies that select it.
    ///
    /// Returns the chains that are in use. The pass stops at the first failure; rules applied
    /// before it are left in place and the next pass converges on them.
    #[instrument(skip(self, policies), fields(%version, policies = policies.len()))]
    pub fn sync(&self, policies: &[PolicySnapshot], version: &str) -> Result<ActiveChains> {
        let pods = self
            .pods
            .local_pods(self.node_ip)
            .with_context(|| format!("failed to list pods local to {}", self.node_ip))?;

        let mut active = ActiveChains::default();
        for pod in pods.values() {
            let chain = pod_chain_name(&pod.namespace, &pod.name, version);
            self.ensure_chain(&chain).with_context(|| {
                format!("failed to create chain {chain} for pod {}/{}", pod.namespace, pod.name)
            })?;
            active.insert(chain.clone());

            let rules = rules::pod_rules(pod, &chain, policies, &self.chains, &self.drop_log);
            for ensure in &rules {
                self.ensure(ensure).with_context(|| {
                    format!(
                        "failed to ensure rule in {} for pod {}/{}: {}",
                        ensure.chain, pod.namespace, pod.name, ensure.rule
                    )
                })?;
            }
            debug!(ns = %pod.namespace, pod = %pod.name, ip = %pod.ip, %chain, "Synced");
        }

        info!(pods = pods.len(), chains = active.len(), "Synced pod firewall chains");
        Ok(active)
    }

    fn ensure_chain(&self, chain: &ChainName) -> Result<()> {
        match self.table.new_chain(FILTER_TABLE, chain.as_str()) {
            Ok(()) => {
                trace!(%chain, "Created");
                Ok(())
            }
            Err(error) if error.is_already_exists() => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    fn ensure(&self, Ensure { chain, placement, rule }: &Ensure) -> Result<()> {
        let chain = chain.as_str();
        match placement {
            Placement::Head => {
                if !self.table.exists(FILTER_TABLE, chain, rule)? {
                    self.table.insert(FILTER_TABLE, chain, 1, rule)?;
                }
            }
            Placement::Tail => self.table.append_unique(FILTER_TABLE, chain, rule)?,
        }
        Ok(())
    }
}
