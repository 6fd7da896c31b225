use crate::k8s::{self, Api, Client};
use anyhow::{Context, Result};
use std::net::IpAddr;

/// Returns the node's first `InternalIP` address, falling back to its first `ExternalIP`.
pub fn node_address(node: &k8s::Node) -> Option<IpAddr> {
    let addresses = node.status.as_ref()?.addresses.as_deref()?;
    let first = |kind: &str| {
        addresses
            .iter()
            .filter(|a| a.type_ == kind)
            .find_map(|a| a.address.parse().ok())
    };
    first("InternalIP").or_else(|| first("ExternalIP"))
}

pub(crate) async fn discover(client: Client, name: &str) -> Result<IpAddr> {
    let node = Api::<k8s::Node>::all(client)
        .get(name)
        .await
        .with_context(|| format!("failed to fetch node {name}"))?;
    node_address(&node).with_context(|| format!("node {name} has no usable address"))
}
