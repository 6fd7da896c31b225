//! Accessors for the pod status fields that decide firewall membership.

use crate::Pod;

/// The pod's assigned address, if it has one.
pub fn pod_ip(pod: &Pod) -> Option<&str> {
    status_field(pod, |s| s.pod_ip.as_deref())
}

/// The address of the node hosting the pod, if it has been scheduled.
pub fn host_ip(pod: &Pod) -> Option<&str> {
    status_field(pod, |s| s.host_ip.as_deref())
}

pub fn phase(pod: &Pod) -> Option<&str> {
    status_field(pod, |s| s.phase.as_deref())
}

fn status_field<'p>(
    pod: &'p Pod,
    f: impl FnOnce(&'p crate::PodStatus) -> Option<&'p str>,
) -> Option<&'p str> {
    pod.status.as_ref().and_then(f).filter(|v| !v.is_empty())
}
