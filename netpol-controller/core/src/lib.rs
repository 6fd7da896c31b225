//! Pod firewall chain synchronization.
//!
//! Given the pods local to a node and a resolved set of network policies (each with the addresses
//! of the pods it targets), the [`PodFirewall`] materializes one filter chain per pod, wires that
//! chain into the node's global traffic paths, and reports the set of chains that must survive
//! garbage collection:
//!
//! ```text
//! [ KUBE-ROUTER-FORWARD ] --(-d/-s pod)--> [ KUBE-POD-FW-* ] --> [ KUBE-NWPLCY-* ]
//!                                                |                     |
//!                                                |        sets 0x10000 on permitted packets
//!                                                v
//!                                 log + reject unmarked, else 0x20000
//! ```
//!
//! Every chain name embeds a generation tag so that successive passes never collide. Old chains
//! are removed by an external collector once the new generation has been wired in.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod chain;
mod config;
pub mod mark;
mod model;
pub mod rule;
pub mod rules;
mod sync;
mod table;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use self::{
    chain::{pod_chain_name, policy_chain_name, ChainName},
    config::{ChainConfig, DropLogConfig},
    model::{ActiveChains, LocalPods, PodSnapshot, PolicySnapshot, PolicyType},
    rule::RuleSpec,
    sync::{LocalPodSource, PodFirewall},
    table::{Table, TableError, FILTER_TABLE},
};
