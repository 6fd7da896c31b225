#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use netpol_controller_core as core;
pub use netpol_controller_iptables as iptables;
pub use netpol_controller_k8s_api as k8s;
pub use netpol_controller_k8s_index as index;

mod args;
pub mod metrics;
mod node;
mod policies;
mod reconcile;

pub use self::{
    args::Args,
    node::node_address,
    policies::{ResolvePolicies, ResolvedPolicy, SharedPolicies},
    reconcile::{Generation, Generations, Reconciler},
};
