//! Rewrites a user's forwarder into the canonical form that validation and
//! generation operate on.
//!
//! Migration never fails. Each step is a pure rewrite of the forwarder (and of
//! the sibling `ClusterLogging` spec, when there is one); steps that change
//! the meaning of what the user wrote record a warning. Steps run in a fixed
//! order:
//!
//! 1. deprecated collection fields are folded into their replacements;
//! 2. a lokistack log store gets a console visualization by default;
//! 3. anonymous pipelines are named and receiver types are inferred;
//! 4. a forwarder that declares nothing routes application and
//!    infrastructure logs to the log store;
//! 5. the reserved inputs that pipelines reference are stubbed;
//! 6. pipelines that reach a lokistack are split by tenant, otherwise the
//!    reserved `default` output is synthesised or replaced;
//! 7. the legacy singleton gets its service account.
//!
//! Running the migration on its own output changes nothing.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod collection;
mod defaults;
mod extras;
mod inputs;
mod lokistack;

#[cfg(test)]
mod tests;

pub use self::extras::Extras;
use logging_forwarder_k8s_api::{
    names, ClusterLogForwarderSpec, ClusterLoggingSpec, Condition, LogStoreKind, Reason,
};

/// Identifies the forwarder being migrated and its cluster context.
#[derive(Clone, Debug)]
pub struct Target<'a> {
    pub namespace: &'a str,
    pub name: &'a str,

    /// The sibling `ClusterLogging` spec, if one exists.
    pub logging: Option<&'a ClusterLoggingSpec>,

    /// The namespace in which the log store is deployed.
    pub log_store_namespace: &'a str,
}

/// The canonical forwarder along with the warnings raised while producing it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Migrated {
    pub spec: ClusterLogForwarderSpec,
    pub logging: Option<ClusterLoggingSpec>,
    pub warnings: Vec<Warning>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub reason: Reason,
    pub message: String,
}

// === impl Target ===

impl<'a> Target<'a> {
    pub fn new(namespace: &'a str, name: &'a str) -> Self {
        Self {
            namespace,
            name,
            logging: None,
            log_store_namespace: names::LEGACY_NAMESPACE,
        }
    }

    pub fn with_logging(mut self, logging: Option<&'a ClusterLoggingSpec>) -> Self {
        self.logging = logging;
        self
    }

    pub fn is_legacy(&self) -> bool {
        names::is_legacy(self.namespace, self.name)
    }
}

// === impl Warning ===

impl Warning {
    fn deprecated(message: impl Into<String>) -> Self {
        Self {
            reason: Reason::Deprecated,
            message: message.into(),
        }
    }

    fn migrated(message: impl Into<String>) -> Self {
        Self {
            reason: Reason::Migrated,
            message: message.into(),
        }
    }

    /// The warning as a `Degraded` condition.
    pub fn to_condition(&self) -> Condition {
        Condition::degraded(self.reason, self.message.clone())
    }
}

/// Migrates `spec` into its canonical form, recording signals for later
/// stages in `extras`.
pub fn migrate(
    target: &Target<'_>,
    spec: ClusterLogForwarderSpec,
    extras: &mut Extras,
) -> Migrated {
    let mut warnings = Vec::new();

    let logging = target.logging.cloned().map(|mut logging| {
        collection::unify(&mut logging, &mut warnings);
        defaults::visualization(&mut logging);
        logging
    });

    let mut spec = spec;
    inputs::name_pipelines(&mut spec);
    inputs::infer_receiver_types(&mut spec);

    let log_store = logging.as_ref().filter(|l| l.log_store.is_some());
    if log_store.is_some() {
        defaults::default_pipeline(&mut spec);
    }
    inputs::stub_reserved(&mut spec, extras);

    match log_store {
        Some(store) if store.log_store_kind() == Some(LogStoreKind::LokiStack) => {
            if let Some(lokistack) = store.lokistack_name() {
                lokistack::split(&mut spec, lokistack, target.log_store_namespace, &mut warnings);
            }
        }
        Some(_) => defaults::default_output(&mut spec, extras, &mut warnings),
        None => {}
    }

    if target.is_legacy() {
        defaults::service_account(&mut spec);
    }

    tracing::debug!(
        namespace = %target.namespace,
        name = %target.name,
        warnings = warnings.len(),
        "Migrated forwarder",
    );
    Migrated {
        spec,
        logging,
        warnings,
    }
}
