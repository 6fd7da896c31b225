#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod pod;

pub use k8s_openapi::api::{
    self,
    core::v1::{Node, NodeAddress, NodeStatus, Pod, PodSpec, PodStatus},
};
pub use kube::{
    api::{Api, ObjectMeta, ResourceExt},
    runtime::watcher,
    Client, Error, Resource,
};
