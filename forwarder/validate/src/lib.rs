#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Checks a migrated forwarder against the rules that generation relies on.
//!
//! Validation runs a fixed sequence of passes. A pass either fails the whole
//! forwarder with a [`Fatal`] error, or records conditions on the inputs,
//! outputs, filters and pipelines it inspects. Readiness is monotonic: once a
//! pass marks an entity as not ready, later passes cannot make it ready again.
//!
//! The forwarder is ready only when every pipeline is ready; a single invalid
//! pipeline makes the whole forwarder invalid.

mod collector;
mod filters;
mod forwarder;
mod inputs;
mod outputs;
mod pipelines;
mod service_account;
mod transport;

#[cfg(test)]
mod tests;

use logging_forwarder_core::{
    cancel, AccessReviewer, CancellationToken, Cancelled, CollectorKind, LookupError,
    ResourceLookup, Secret, SecretStore,
};
use logging_forwarder_k8s_api::{
    ClusterLogForwarderSpec, ClusterLogForwarderStatus, ClusterLoggingSpec, Condition,
    NamedConditions, Reason,
};
use logging_forwarder_migrate::{Extras, Warning};
use std::collections::BTreeMap;

pub use self::forwarder::{LOG_LEVELS, LOG_LEVEL_ANNOTATION};

/// Everything a validation pass may consult.
pub struct Context<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
    pub annotations: &'a BTreeMap<String, String>,

    /// The migrated spec.
    pub spec: &'a ClusterLogForwarderSpec,

    /// The sibling `ClusterLogging` spec, if one exists.
    pub logging: Option<&'a ClusterLoggingSpec>,
    pub extras: &'a Extras,
    pub warnings: &'a [Warning],
    pub collector: CollectorKind,

    pub secrets: &'a dyn SecretStore,
    pub resources: &'a dyn ResourceLookup,
    pub access: &'a dyn AccessReviewer,
}

/// A single validation pass.
pub trait Validate {
    fn name(&self) -> &'static str;

    fn validate(
        &self,
        cx: &Context<'_>,
        status: &mut ClusterLogForwarderStatus,
    ) -> Result<(), Fatal>;
}

/// Stops validation of the forwarder.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Fatal {
    #[error("{0}")]
    Invalid(String),

    /// A lookup failed; the reconcile should be retried.
    #[error("{0}")]
    Transient(String),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

const PASSES: [&dyn Validate; 12] = [
    &forwarder::NameSanity,
    &forwarder::Singleton,
    &forwarder::Dependency,
    &forwarder::Annotations,
    &collector::Compatibility,
    &service_account::ServiceAccount,
    &inputs::Inputs,
    &outputs::Outputs,
    &filters::Filters,
    &pipelines::Pipelines,
    &transport::UrlTls,
    &transport::HttpContentType,
];

/// Validates the forwarder described by `cx`, checking `token` between
/// passes.
///
/// Returns the status to publish. The root `Ready` condition is true only when
/// every pipeline is ready.
pub fn validate(
    cx: &Context<'_>,
    token: &CancellationToken,
) -> Result<ClusterLogForwarderStatus, Fatal> {
    if cx.spec.pipelines.is_empty() {
        tracing::debug!(namespace = %cx.namespace, name = %cx.name, "ClusterLogForwarder disabled");
        return Err(Fatal::Invalid("ClusterLogForwarder disabled".to_string()));
    }

    let mut status = ClusterLogForwarderStatus::default();
    for pass in PASSES {
        cancel::check(token, pass.name())?;
        pass.validate(cx, &mut status)?;
    }
    pipelines::revalidate_outputs(cx, &mut status);

    if !cx.warnings.is_empty() {
        let reason = cx.warnings[0].reason;
        let message = cx
            .warnings
            .iter()
            .map(|w| w.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        status.conditions.set(Condition::degraded(reason, message));
    }

    let unready = status
        .pipelines
        .not_ready()
        .map(|(name, _)| name)
        .collect::<Vec<_>>();
    if unready.is_empty() {
        status.conditions.set(Condition::ready());
    } else {
        tracing::debug!(namespace = %cx.namespace, name = %cx.name, pipelines = ?unready, "Not all pipelines are valid");
        status.conditions.set(Condition::invalid(format!(
            "invalid clf spec; one or more errors present: {unready:?}"
        )));
    }
    Ok(status)
}

// === impl Fatal ===

impl Fatal {
    /// The root condition to publish, or `None` when nothing may be
    /// published.
    pub fn to_condition(&self) -> Option<Condition> {
        match self {
            Self::Invalid(msg) => Some(Condition::invalid(msg.clone())),
            Self::Transient(msg) => Some(Condition::not_ready(Reason::Transient, msg.clone())),
            Self::Cancelled(_) => None,
        }
    }
}

/// Records a failure for `name` unless an earlier check already failed it.
fn fail(conds: &mut NamedConditions, name: &str, condition: Condition) {
    if !conds.is_not_ready(name) {
        conds.set(name, condition);
    }
}

/// Fetches a secret from the forwarder's namespace. A secret that is absent,
/// or that could not be read before the deadline, is `None`.
fn lookup_secret(cx: &Context<'_>, name: &str) -> Result<Option<Secret>, Fatal> {
    match cx.secrets.get(cx.namespace, name) {
        Ok(secret) => Ok(secret),
        Err(LookupError::Timeout) => {
            tracing::debug!(namespace = %cx.namespace, secret = %name, "Secret lookup timed out");
            Ok(None)
        }
        Err(error @ LookupError::Unavailable(_)) => Err(Fatal::Transient(format!(
            "failed to read secret {name:?}: {error}"
        ))),
    }
}
