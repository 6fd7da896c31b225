use crate::{DeletedPod, EventBridge, PodEvent};
use ahash::AHashMap as HashMap;
use kubert::index::{IndexNamespacedResource, NamespacedRemoved};
use netpol_controller_core::{LocalPodSource, LocalPods, PodSnapshot};
use netpol_controller_k8s_api::{self as k8s, ResourceExt};
use parking_lot::RwLock;
use std::{net::IpAddr, sync::Arc};
use tracing::{trace, warn};

pub type SharedPodCache = Arc<RwLock<PodCache>>;

/// Holds the latest observed state of every watched pod, keyed by namespace and name.
#[derive(Debug)]
pub struct PodCache {
    namespaces: HashMap<String, HashMap<String, k8s::Pod>>,
    events: EventBridge,
}

// === impl PodCache ===

impl PodCache {
    pub fn new(events: EventBridge) -> Self {
        Self {
            namespaces: HashMap::default(),
            events,
        }
    }

    pub fn shared(events: EventBridge) -> SharedPodCache {
        Arc::new(RwLock::new(Self::new(events)))
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&k8s::Pod> {
        self.namespaces.get(namespace)?.get(name)
    }

    pub fn len(&self) -> usize {
        self.namespaces.values().map(|pods| pods.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn namespace_len(&self, namespace: &str) -> usize {
        self.namespaces.get(namespace).map_or(0, |pods| pods.len())
    }

    fn remove(&mut self, namespace: &str, name: &str) -> Option<k8s::Pod> {
        let pods = self.namespaces.get_mut(namespace)?;
        let pod = pods.remove(name);
        if pods.is_empty() {
            self.namespaces.remove(namespace);
        }
        pod
    }
}

impl IndexNamespacedResource<k8s::Pod> for PodCache {
    fn apply(&mut self, pod: k8s::Pod) {
        let Some(namespace) = pod.namespace() else {
            warn!(name = %pod.name_any(), "Ignoring pod without a namespace");
            return;
        };
        let name = pod.name_any();

        let event = match self
            .namespaces
            .entry(namespace)
            .or_default()
            .insert(name, pod.clone())
        {
            Some(old) => PodEvent::Updated { old, new: pod },
            None => PodEvent::Added(pod),
        };
        self.events.handle(event);
    }

    fn delete(&mut self, namespace: String, name: String) {
        let deleted = match self.remove(&namespace, &name) {
            Some(pod) => DeletedPod::Pod(pod),
            None => DeletedPod::Tombstone {
                key: format!("{namespace}/{name}"),
                last_known: None,
            },
        };
        self.events.handle(PodEvent::Deleted(deleted));
    }

    fn reset(&mut self, pods: Vec<k8s::Pod>, removed: NamespacedRemoved) {
        for pod in pods {
            self.apply(pod);
        }

        // Removals observed across a watch restart carry no final state.
        for (namespace, names) in removed {
            for name in names {
                let last_known = self.remove(&namespace, &name);
                self.events
                    .handle(PodEvent::Deleted(DeletedPod::Tombstone {
                        key: format!("{namespace}/{name}"),
                        last_known,
                    }));
            }
        }
    }
}

impl LocalPodSource for PodCache {
    fn local_pods(&self, node_ip: IpAddr) -> anyhow::Result<LocalPods> {
        let mut local = LocalPods::new();
        for (namespace, pods) in &self.namespaces {
            for (name, pod) in pods {
                let on_node = k8s::pod::host_ip(pod)
                    .and_then(|ip| ip.parse::<IpAddr>().ok())
                    .is_some_and(|ip| ip == node_ip);
                if !on_node {
                    continue;
                }

                let Some(addr) = k8s::pod::pod_ip(pod) else {
                    trace!(ns = %namespace, %name, "Pod has no address yet");
                    continue;
                };
                let ip = match addr.parse::<IpAddr>() {
                    Ok(ip) => ip,
                    Err(error) => {
                        warn!(ns = %namespace, %name, %addr, %error, "Ignoring pod with invalid address");
                        continue;
                    }
                };

                local.insert(
                    ip,
                    PodSnapshot {
                        ip,
                        name: name.clone(),
                        namespace: namespace.clone(),
                        labels: pod.labels().clone(),
                    },
                );
            }
        }
        Ok(local)
    }
}
