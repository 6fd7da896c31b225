use crate::SharedPodCache;
use kubert::index::{IndexNamespacedResource, NamespacedRemoved};
use netpol_controller_k8s_api::{self as k8s, ResourceExt};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

/// Instruments the pod cache as it is driven by the watch.
#[derive(Debug)]
pub struct PodIndexMetrics {
    inner: SharedPodCache,

    size: Family<NamespaceLabels, Gauge>,
    applies: Counter,
    deletes: Counter,
    resets: Counter,
}

/// Counts resynchronization requests, including those absorbed by a pending request.
#[derive(Clone, Debug, Default)]
pub struct ResyncMetrics {
    pub(crate) requested: Counter,
    pub(crate) coalesced: Counter,
}

/// Counts pod events that did not lead to a resync.
#[derive(Clone, Debug, Default)]
pub struct EventMetrics {
    pub(crate) ignored: Counter,
    pub(crate) dropped: Counter,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct NamespaceLabels {
    namespace: String,
}

// === impl PodIndexMetrics ===

impl PodIndexMetrics {
    pub fn register(inner: SharedPodCache, prom: &mut Registry) -> Self {
        let size = Family::default();
        prom.register(
            "pod_index_size",
            "Gauge of the number of pods in the index",
            size.clone(),
        );

        let applies = Counter::default();
        prom.register(
            "pod_index_applies",
            "Count of pod applies to the index",
            applies.clone(),
        );

        let deletes = Counter::default();
        prom.register(
            "pod_index_deletes",
            "Count of pod deletes from the index",
            deletes.clone(),
        );

        let resets = Counter::default();
        prom.register(
            "pod_index_resets",
            "Count of resets of the pod index",
            resets.clone(),
        );

        Self {
            inner,
            size,
            applies,
            deletes,
            resets,
        }
    }

    fn set_size(&self, namespace: String) {
        let size = self.inner.read().namespace_len(&namespace);
        self.size
            .get_or_create(&NamespaceLabels { namespace })
            .set(size as i64);
    }
}

impl IndexNamespacedResource<k8s::Pod> for PodIndexMetrics {
    fn apply(&mut self, pod: k8s::Pod) {
        self.applies.inc();
        let namespace = pod.namespace().unwrap_or_default();
        self.inner.write().apply(pod);
        self.set_size(namespace);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.deletes.inc();
        self.inner.write().delete(namespace.clone(), name);
        self.set_size(namespace);
    }

    fn reset(&mut self, pods: Vec<k8s::Pod>, removed: NamespacedRemoved) {
        self.resets.inc();
        let mut namespaces = pods
            .iter()
            .filter_map(|pod| pod.namespace())
            .chain(removed.keys().cloned())
            .collect::<Vec<_>>();
        namespaces.sort();
        namespaces.dedup();
        self.inner.write().reset(pods, removed);
        for namespace in namespaces {
            self.set_size(namespace);
        }
    }
}

// === impl ResyncMetrics ===

impl ResyncMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let requested = Counter::default();
        prom.register(
            "resync_requests",
            "Count of resynchronization requests",
            requested.clone(),
        );

        let coalesced = Counter::default();
        prom.register(
            "resync_requests_coalesced",
            "Count of resynchronization requests absorbed by a pending request",
            coalesced.clone(),
        );

        Self {
            requested,
            coalesced,
        }
    }
}

// === impl EventMetrics ===

impl EventMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let ignored = Counter::default();
        prom.register(
            "pod_events_ignored",
            "Count of pod updates that did not change the pod's phase or address",
            ignored.clone(),
        );

        let dropped = Counter::default();
        prom.register(
            "pod_events_dropped",
            "Count of pod deletions that could not be recovered",
            dropped.clone(),
        );

        Self { ignored, dropped }
    }
}
