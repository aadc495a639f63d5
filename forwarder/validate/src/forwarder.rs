use crate::{Context, Fatal, Validate};
use logging_forwarder_k8s_api::{names, ClusterLogForwarderStatus, Condition};
use once_cell::sync::Lazy;
use regex::Regex;

pub const LOG_LEVEL_ANNOTATION: &str = "logging.openshift.io/log-level";
pub const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Forwarder names become the names of the collector's workload and of the
/// resources derived from it, which append suffixes of up to 11 characters.
const MAX_NAME_LEN: usize = 52;

/// Names taken by the components of the managed logging stack.
const RESERVED_NAMES: [&str; 4] = [
    "logfilesmetricexporter",
    "elasticsearch",
    "kibana",
    "lokistack",
];

static DNS_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("DNS label regex must compile")
});

/// The forwarder's name must be usable for the resources derived from it.
pub(crate) struct NameSanity;

/// Only `openshift-logging` may hold a forwarder named `instance`.
pub(crate) struct Singleton;

/// The legacy singleton requires a `ClusterLogging` beside it.
pub(crate) struct Dependency;

/// Checks the annotations the collector reads.
pub(crate) struct Annotations;

impl Validate for NameSanity {
    fn name(&self) -> &'static str {
        "name"
    }

    fn validate(&self, cx: &Context<'_>, _: &mut ClusterLogForwarderStatus) -> Result<(), Fatal> {
        if !DNS_LABEL.is_match(cx.name) {
            return Err(Fatal::Invalid(format!(
                "Name {:?} must be a valid DNS-1123 label",
                cx.name
            )));
        }
        if cx.name.len() > MAX_NAME_LEN {
            return Err(Fatal::Invalid(format!(
                "Name {:?} must be no more than {MAX_NAME_LEN} characters",
                cx.name
            )));
        }
        if RESERVED_NAMES.contains(&cx.name) {
            return Err(Fatal::Invalid(format!(
                "Name {:?} conflicts with an object deployed by the cluster logging operator",
                cx.name
            )));
        }
        Ok(())
    }
}

impl Validate for Singleton {
    fn name(&self) -> &'static str {
        "singleton"
    }

    fn validate(&self, cx: &Context<'_>, _: &mut ClusterLogForwarderStatus) -> Result<(), Fatal> {
        if cx.name == names::SINGLETON_NAME && cx.namespace != names::LEGACY_NAMESPACE {
            return Err(Fatal::Invalid(format!(
                "Name {:?} is reserved for the ClusterLogForwarder in {:?}",
                names::SINGLETON_NAME,
                names::LEGACY_NAMESPACE,
            )));
        }
        Ok(())
    }
}

impl Validate for Dependency {
    fn name(&self) -> &'static str {
        "dependency"
    }

    fn validate(&self, cx: &Context<'_>, _: &mut ClusterLogForwarderStatus) -> Result<(), Fatal> {
        if names::is_legacy(cx.namespace, cx.name) && cx.logging.is_none() {
            return Err(Fatal::Invalid(format!(
                "ClusterLogging {:?} must exist in {:?} to use ClusterLogForwarder {:?}",
                names::SINGLETON_NAME,
                names::LEGACY_NAMESPACE,
                names::SINGLETON_NAME,
            )));
        }
        Ok(())
    }
}

impl Validate for Annotations {
    fn name(&self) -> &'static str {
        "annotations"
    }

    fn validate(
        &self,
        cx: &Context<'_>,
        status: &mut ClusterLogForwarderStatus,
    ) -> Result<(), Fatal> {
        if let Some(level) = cx.annotations.get(LOG_LEVEL_ANNOTATION) {
            if !LOG_LEVELS.contains(&level.as_str()) {
                status.conditions.set(Condition::validation_failure(format!(
                    "{LOG_LEVEL_ANNOTATION} has invalid level {level:?}; must be one of {LOG_LEVELS:?}"
                )));
            }
        }
        Ok(())
    }
}
