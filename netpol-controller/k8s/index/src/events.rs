use crate::{metrics::EventMetrics, Resync};
use netpol_controller_k8s_api::{self as k8s, ResourceExt};
use tracing::{debug, error, trace};

/// A pod lifecycle notification.
#[derive(Clone, Debug)]
pub enum PodEvent {
    Added(k8s::Pod),
    Updated { old: k8s::Pod, new: k8s::Pod },
    Deleted(DeletedPod),
}

/// The payload of a delete notification.
#[derive(Clone, Debug)]
pub enum DeletedPod {
    Pod(k8s::Pod),

    /// The deletion was observed without its final state, e.g. because the watch was
    /// disconnected when it happened. `last_known` holds the cached state, if any.
    Tombstone {
        key: String,
        last_known: Option<k8s::Pod>,
    },
}

/// Translates pod lifecycle notifications into resynchronization requests.
#[derive(Clone, Debug)]
pub struct EventBridge {
    resync: Resync,
    metrics: EventMetrics,
}

// === impl DeletedPod ===

impl DeletedPod {
    pub fn into_pod(self) -> Option<k8s::Pod> {
        match self {
            Self::Pod(pod) => Some(pod),
            Self::Tombstone { last_known, .. } => last_known,
        }
    }
}

// === impl EventBridge ===

impl EventBridge {
    pub fn new(resync: Resync, metrics: EventMetrics) -> Self {
        Self { resync, metrics }
    }

    /// Returns true if the event warranted a resync.
    pub fn handle(&self, event: PodEvent) -> bool {
        match event {
            PodEvent::Added(pod) => {
                debug!(ns = ?pod.namespace(), name = %pod.name_any(), "Received pod add event");
            }

            PodEvent::Updated { old, new } => {
                // Only the phase and address affect firewall membership.
                if k8s::pod::phase(&old) == k8s::pod::phase(&new)
                    && k8s::pod::pod_ip(&old) == k8s::pod::pod_ip(&new)
                {
                    trace!(ns = ?new.namespace(), name = %new.name_any(), "Ignoring pod update");
                    self.metrics.ignored.inc();
                    return false;
                }
                debug!(ns = ?new.namespace(), name = %new.name_any(), "Received pod update event");
            }

            PodEvent::Deleted(deleted) => {
                let key = match &deleted {
                    DeletedPod::Pod(pod) => format!(
                        "{}/{}",
                        pod.namespace().unwrap_or_default(),
                        pod.name_any()
                    ),
                    DeletedPod::Tombstone { key, .. } => key.clone(),
                };
                let Some(pod) = deleted.into_pod() else {
                    error!(%key, "Unexpected pod delete event without a recoverable pod");
                    self.metrics.dropped.inc();
                    return false;
                };
                debug!(ns = ?pod.namespace(), name = %pod.name_any(), "Received pod delete event");
            }
        }

        self.resync.request();
        true
    }
}
