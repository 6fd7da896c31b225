//! Pod state for the node's firewall.
//!
//! Pod watch events are applied to a [`PodCache`], which is the authoritative source of the pods
//! local to this node. Every event that could change firewall membership is reduced to a single
//! effect: a request for a full resynchronization, delivered over a [`Resync`] channel that holds
//! at most one pending request.
//!
//! ```text
//! [ Pod watch ] -> [ PodCache ] -> [ EventBridge ] -> [ Resync ] -> reconciler
//!                       ^                                               |
//!                       +------------------ local_pods -----------------+
//! ```
//!
//! The cache never mutates the packet filter itself.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod events;
pub mod metrics;
mod pod;
mod resync;


pub use self::{
    events::{DeletedPod, EventBridge, PodEvent},
    pod::{PodCache, SharedPodCache},
    resync::{channel as resync_channel, Resync, ResyncRx},
};
