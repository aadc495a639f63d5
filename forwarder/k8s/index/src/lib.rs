//! Indexes the cluster resources that forwarder reconciliation reads.
//!
//! The index holds the latest `ClusterLogForwarder`, `ClusterLogging` and
//! `Secret` resources observed by the runtime's watches. Whenever a change
//! could alter the outcome of reconciling a forwarder, the forwarder's ID is
//! published on the index's update channel. The controller then takes a
//! [`Snapshot`] of everything the forwarder depends on, so that the pure
//! reconcile stages never hold the index lock.
//!
//! ```text
//! [ ClusterLogging ] -> [ ClusterLogForwarder ] <- [ Secret ]
//! ```
//!
//! Forwarders, their sibling `ClusterLogging` and the secrets they reference
//! are always in the same namespace.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod index;
pub mod metrics;

#[cfg(test)]
mod tests;

pub use self::index::{Forwarder, ForwarderId, Index, SharedIndex, Snapshot};
