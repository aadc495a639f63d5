#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Reconciles `ClusterLogForwarder` resources into collector configuration.
//!
//! Watches feed a shared index; the index publishes the IDs of forwarders
//! whose inputs changed, and a single controller task reconciles them one at
//! a time. Each reconcile migrates, validates and generates the forwarder
//! under a deadline, applies the collector `ConfigMap` and `Service`s, and
//! patches the forwarder's status.

pub use logging_forwarder_core as core;
pub use logging_forwarder_generator as generator;
pub use logging_forwarder_k8s_api as k8s;
pub use logging_forwarder_k8s_index as index;
pub use logging_forwarder_migrate as migrate;
pub use logging_forwarder_validate as validate;

mod access;
mod args;
mod controller;
mod metrics;
pub mod reconcile;

pub use self::{
    access::ReviewedAccess,
    args::Args,
    controller::{Controller, Settings},
    metrics::ControllerMetrics,
};
