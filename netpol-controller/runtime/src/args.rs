use crate::{
    core::{ChainConfig, ChainName, DropLogConfig, PodFirewall},
    index::{
        metrics::{EventMetrics, PodIndexMetrics, ResyncMetrics},
        resync_channel, EventBridge, PodCache,
    },
    iptables::Iptables,
    k8s,
    metrics::SyncMetrics,
    node, Reconciler, SharedPolicies,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use kube::runtime::watcher;
use parking_lot::RwLock;
use prometheus_client::registry::Registry;
use std::{net::IpAddr, path::PathBuf, sync::Arc};
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "netpol",
    about = "Maintains per-pod network policy firewall chains on a node"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "netpol=info,warn",
        env = "NETPOL_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The node whose pods are firewalled. Its address is used unless `--node-ip` is set.
    #[clap(long, env = "NODE_NAME")]
    node_name: Option<String>,

    #[clap(long, env = "NODE_IP")]
    node_ip: Option<IpAddr>,

    /// Interval between full resynchronizations, in seconds.
    #[clap(long, default_value = "300")]
    sync_period_secs: u64,

    #[clap(long, default_value = "iptables")]
    iptables_path: PathBuf,

    #[clap(long, default_value = "KUBE-ROUTER-INPUT")]
    input_chain: String,

    #[clap(long, default_value = "KUBE-ROUTER-FORWARD")]
    forward_chain: String,

    #[clap(long, default_value = "KUBE-ROUTER-OUTPUT")]
    output_chain: String,

    #[clap(long, default_value = "KUBE-NWPLCY-DEFAULT-INGRESS")]
    default_ingress_chain: String,

    #[clap(long, default_value = "KUBE-NWPLCY-DEFAULT-EGRESS")]
    default_egress_chain: String,

    /// NFLOG group that rejected traffic is logged to.
    #[clap(long, default_value = "100")]
    nflog_group: u16,

    #[clap(long, default_value = "10/minute")]
    log_limit: String,

    #[clap(long, default_value = "10")]
    log_limit_burst: u32,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            node_name,
            node_ip,
            sync_period_secs,
            iptables_path,
            input_chain,
            forward_chain,
            output_chain,
            default_ingress_chain,
            default_egress_chain,
            nflog_group,
            log_limit,
            log_limit_burst,
        } = self;

        let chains = ChainConfig {
            input: ChainName::new(input_chain),
            forward: ChainName::new(forward_chain),
            output: ChainName::new(output_chain),
            default_ingress: ChainName::new(default_ingress_chain),
            default_egress: ChainName::new(default_egress_chain),
        };
        let drop_log = DropLogConfig {
            nflog_group,
            limit: log_limit,
            limit_burst: log_limit_burst,
        };

        let mut prom = <Registry>::default();
        let netpol = prom.sub_registry_with_prefix("netpol");
        let resync_metrics = ResyncMetrics::register(netpol);
        let event_metrics = EventMetrics::register(netpol);
        let sync_metrics = SyncMetrics::register(netpol.sub_registry_with_prefix("sync"));

        // Every pod event that could change membership funnels into a single pending resync.
        let (resync, resyncs) = resync_channel(resync_metrics);
        let pods = PodCache::shared(EventBridge::new(resync.clone(), event_metrics));
        let pod_index = Arc::new(RwLock::new(PodIndexMetrics::register(pods.clone(), netpol)));
        let policies = SharedPolicies::new(resync);

        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let node_ip = match (node_ip, node_name.as_deref()) {
            (Some(ip), _) => ip,
            (None, Some(name)) => node::discover(runtime.client(), name).await?,
            (None, None) => bail!("either --node-name or --node-ip must be set"),
        };
        info!(%node_ip, node = ?node_name, "Using node address");

        let iptables = Iptables::new(iptables_path).context("failed to initialize iptables")?;

        // Only pods bound to this node are of interest when its name is known.
        let watch = match node_name.as_deref() {
            Some(name) => {
                watcher::Config::default().fields(&format!("spec.nodeName={name}"))
            }
            None => watcher::Config::default(),
        };
        let pod_events = runtime.watch_all::<k8s::Pod>(watch);
        tokio::spawn(
            kubert::index::namespaced(pod_index, pod_events).instrument(info_span!("pods")),
        );

        let firewall = PodFirewall::new(iptables, pods, node_ip)
            .with_chains(chains)
            .with_drop_log(drop_log);
        // The generations receiver is where a collector of stale pod chains would attach. Nothing in
        // this process consumes it, so each generation's chains and jump rules stay installed
        // until removed externally.
        let (reconciler, _generations) = Reconciler::new(
            firewall,
            policies,
            resyncs,
            Duration::from_secs(sync_period_secs),
            sync_metrics,
        );
        tokio::spawn(
            reconciler
                .run(runtime.shutdown_handle())
                .instrument(info_span!("reconcile")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
