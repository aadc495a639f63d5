#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Types and collaborator interfaces shared by every stage of forwarder
//! reconciliation.
//!
//! Nothing in this crate performs I/O. The runtime supplies implementations of
//! [`SecretStore`], [`ResourceLookup`] and [`AccessReviewer`] that are backed by
//! snapshots of cluster state, so the migrate, validate and generate stages
//! remain pure functions of their inputs.

pub mod access;
pub mod cancel;
pub mod collector;
pub mod lookup;
pub mod secret;
pub mod service;
pub mod tenant;
pub mod tls;

pub use self::{
    access::AccessReviewer,
    cancel::{CancellationToken, Cancelled},
    collector::CollectorKind,
    lookup::{LookupError, ResourceLookup, StaticResources},
    secret::{Secret, SecretSnapshot, SecretStore},
    service::ServiceRequirement,
    tenant::Tenant,
    tls::TlsProfile,
};
