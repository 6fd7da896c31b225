use crate::{
    core::{ActiveChains, LocalPodSource, PodFirewall, Table},
    index::ResyncRx,
    metrics::SyncMetrics,
    ResolvePolicies,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::{
    sync::watch,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// The outcome of a successful synchronization pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generation {
    pub version: String,

    /// Pod chains in use by this generation. Chains with the pod chain prefix outside this set
    /// may be removed.
    pub active: ActiveChains,
}

/// Observes published generations. `None` until the first pass succeeds.
pub type Generations = watch::Receiver<Option<Arc<Generation>>>;

/// Drives synchronization passes one at a time.
pub struct Reconciler<T, P, R> {
    firewall: Arc<PodFirewall<T, P>>,
    policies: R,
    resyncs: ResyncRx,
    period: Duration,
    generations: watch::Sender<Option<Arc<Generation>>>,
    last_version: i64,
    metrics: SyncMetrics,
}

// === impl Reconciler ===

impl<T, P, R> Reconciler<T, P, R>
where
    T: Table + Send + Sync + 'static,
    P: LocalPodSource + Send + Sync + 'static,
    R: ResolvePolicies,
{
    pub fn new(
        firewall: PodFirewall<T, P>,
        policies: R,
        resyncs: ResyncRx,
        period: Duration,
        metrics: SyncMetrics,
    ) -> (Self, Generations) {
        let (generations, rx) = watch::channel(None);
        let reconciler = Self {
            firewall: Arc::new(firewall),
            policies,
            resyncs,
            period,
            generations,
            last_version: 0,
            metrics,
        };
        (reconciler, rx)
    }

    /// Runs a pass at start, then whenever a resync is requested or the period elapses, until
    /// shutdown is signaled. A pass in progress completes before shutdown is released.
    pub async fn run(mut self, drain: drain::Watch) {
        let mut ticks = time::interval(self.period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin! {
            let shutdown = drain.signaled();
        }

        loop {
            tokio::select! {
                biased;
                release = &mut shutdown => {
                    debug!("Shutdown signaled");
                    drop(release);
                    return;
                }
                Some(()) = self.resyncs.recv() => debug!("Resync requested"),
                _ = ticks.tick() => debug!("Periodic resync"),
            }

            // Requests that arrived during the previous pass are satisfied by this one.
            self.resyncs.try_recv();

            if let Err(error) = self.reconcile().await {
                warn!(?error, "Synchronization failed");
            }
            ticks.reset();
        }
    }

    /// Runs a single pass and publishes its generation.
    ///
    /// On failure nothing is published and the previous generation remains current.
    pub async fn reconcile(&mut self) -> Result<Arc<Generation>> {
        let version = self.next_version()?;
        let policies = self.policies.resolve(&version);

        let start = Instant::now();
        info!(%version, policies = policies.len(), "Synchronizing");
        let firewall = self.firewall.clone();
        let span = tracing::Span::current();
        let res = tokio::task::spawn_blocking({
            let version = version.clone();
            move || span.in_scope(|| firewall.sync(&policies, &version))
        })
        .await
        .context("synchronization task failed")
        .and_then(|res| res);

        let active = match res {
            Ok(active) => active,
            Err(error) => {
                self.metrics.failed(start.elapsed());
                return Err(error.context(format!("generation {version}")));
            }
        };
        self.metrics.succeeded(start.elapsed(), active.len());
        info!(%version, chains = active.len(), elapsed = ?start.elapsed(), "Synchronized");

        let generation = Arc::new(Generation { version, active });
        self.generations.send_replace(Some(generation.clone()));
        Ok(generation)
    }

    /// Returns the current time in Unix nanoseconds, bumped if needed so that versions are
    /// strictly increasing.
    fn next_version(&mut self) -> Result<String> {
        let now = chrono::Utc::now()
            .timestamp_nanos_opt()
            .context("system time is out of range")?;
        self.last_version = now.max(self.last_version + 1);
        Ok(self.last_version.to_string())
    }
}
