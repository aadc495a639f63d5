//! Runs the migrate, validate and generate stages for one forwarder.

use crate::{
    core::{
        self, AccessReviewer, CancellationToken, Cancelled, CollectorKind, LookupError,
        ResourceLookup, SecretStore,
    },
    generator::{self, GenerateError, Generated},
    k8s::{
        ClusterLogForwarderSpec, ClusterLogForwarderStatus, ClusterLoggingSpec, Condition, Reason,
    },
    migrate, validate,
};
use std::collections::BTreeMap;


/// Everything one reconcile reads.
pub struct Input<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
    pub annotations: &'a BTreeMap<String, String>,
    pub spec: &'a ClusterLogForwarderSpec,

    /// The sibling `ClusterLogging` spec, if one exists.
    pub logging: Option<&'a ClusterLoggingSpec>,

    /// The namespace in which the log store is deployed.
    pub log_store_namespace: &'a str,

    /// The collector used when the sibling `ClusterLogging` does not name one.
    pub collector: CollectorKind,

    pub secrets: &'a dyn SecretStore,
    pub resources: &'a dyn ResourceLookup,
    pub access: &'a dyn AccessReviewer,
}

/// The result of a reconcile that ran to completion.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    /// The migrated spec.
    pub spec: ClusterLogForwarderSpec,
    pub collector: CollectorKind,
    pub status: ClusterLogForwarderStatus,

    /// The collector configuration, when the forwarder is ready and
    /// generation succeeded. The previous configuration stays in place
    /// otherwise.
    pub config: Option<Generated>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Reconciles `input`. Nothing is published when the token fires before the
/// reconcile completes.
pub fn reconcile(input: &Input<'_>, token: &CancellationToken) -> Result<Outcome, ReconcileError> {
    core::cancel::check(token, "migrate")?;
    let target = migrate::Target {
        namespace: input.namespace,
        name: input.name,
        logging: input.logging,
        log_store_namespace: input.log_store_namespace,
    };
    let mut extras = migrate::Extras::default();
    let migrated = migrate::migrate(&target, input.spec.clone(), &mut extras);
    let collector = collector_kind(migrated.logging.as_ref(), input.collector);

    let cx = validate::Context {
        namespace: input.namespace,
        name: input.name,
        annotations: input.annotations,
        spec: &migrated.spec,
        logging: migrated.logging.as_ref(),
        extras: &extras,
        warnings: &migrated.warnings,
        collector,
        secrets: input.secrets,
        resources: input.resources,
        access: input.access,
    };
    let mut status = match validate::validate(&cx, token) {
        Ok(status) => status,
        Err(validate::Fatal::Cancelled(cancelled)) => return Err(cancelled.into()),
        Err(fatal) => {
            tracing::info!(namespace = %input.namespace, name = %input.name, error = %fatal, "ClusterLogForwarder is not valid");
            let mut status = ClusterLogForwarderStatus::default();
            if let Some(condition) = fatal.to_condition() {
                status.conditions.set(condition);
            }
            return Ok(Outcome {
                spec: migrated.spec,
                collector,
                status,
                config: None,
            });
        }
    };

    if !status.is_ready() {
        return Ok(Outcome {
            spec: migrated.spec,
            collector,
            status,
            config: None,
        });
    }

    let cx = generator::Context {
        namespace: input.namespace,
        name: input.name,
        spec: &migrated.spec,
        collector,
        secrets: input.secrets,
        resources: input.resources,
        fluentd: migrated
            .logging
            .as_ref()
            .and_then(ClusterLoggingSpec::fluentd_tuning),
    };
    let config = match generator::generate(&cx, token) {
        Ok(config) => Some(config),
        Err(GenerateError::Cancelled(cancelled)) => return Err(cancelled.into()),
        Err(error) => {
            tracing::info!(namespace = %input.namespace, name = %input.name, %error, "Failed to generate collector configuration");
            status.conditions.set(generate_condition(&error));
            None
        }
    };

    Ok(Outcome {
        spec: migrated.spec,
        collector,
        status,
        config,
    })
}

/// The collector named by the sibling `ClusterLogging`, or `default`.
fn collector_kind(logging: Option<&ClusterLoggingSpec>, default: CollectorKind) -> CollectorKind {
    let Some(name) = logging.and_then(ClusterLoggingSpec::collector_type) else {
        return default;
    };
    match name.parse() {
        Ok(kind) => kind,
        Err(error) => {
            tracing::warn!(%error, collector = %default, "Using default collector");
            default
        }
    }
}

/// The condition published when a valid forwarder cannot be generated.
fn generate_condition(error: &GenerateError) -> Condition {
    match error {
        GenerateError::UnsupportedOutput { .. } => Condition::invalid(error.to_string()),
        GenerateError::MissingSecret { .. } | GenerateError::Lookup(LookupError::Timeout) => {
            Condition::missing_resource(error.to_string())
        }
        GenerateError::Lookup(LookupError::Unavailable(_)) | GenerateError::Cancelled(_) => {
            Condition::not_ready(Reason::Transient, error.to_string())
        }
    }
}

// === impl Outcome ===

impl Outcome {
    /// True when the outcome depends on a lookup that may succeed if retried.
    pub fn is_transient(&self) -> bool {
        self.status
            .ready_condition()
            .map(|c| c.reason == Some(Reason::Transient))
            .unwrap_or(false)
    }
}
