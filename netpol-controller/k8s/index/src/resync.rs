use crate::metrics::ResyncMetrics;
use tokio::sync::mpsc;
use tracing::trace;

/// Requests a full resynchronization.
///
/// Requests coalesce: while one is pending, further requests are no-ops.
#[derive(Clone, Debug)]
pub struct Resync {
    tx: mpsc::Sender<()>,
    metrics: ResyncMetrics,
}

/// Receives resynchronization requests.
#[derive(Debug)]
pub struct ResyncRx(mpsc::Receiver<()>);

pub fn channel(metrics: ResyncMetrics) -> (Resync, ResyncRx) {
    let (tx, rx) = mpsc::channel(1);
    (Resync { tx, metrics }, ResyncRx(rx))
}

// === impl Resync ===

impl Resync {
    /// Returns true if a new request was queued and false if one was already pending (or the
    /// receiver is gone).
    pub fn request(&self) -> bool {
        self.metrics.requested.inc();
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                trace!("Resync already pending");
                self.metrics.coalesced.inc();
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                trace!("Resync receiver dropped");
                false
            }
        }
    }
}

// === impl ResyncRx ===

impl ResyncRx {
    /// Waits for a request. Returns `None` once every `Resync` handle has been dropped.
    pub async fn recv(&mut self) -> Option<()> {
        self.0.recv().await
    }

    /// Takes a pending request, if there is one.
    pub fn try_recv(&mut self) -> bool {
        self.0.try_recv().is_ok()
    }
}
