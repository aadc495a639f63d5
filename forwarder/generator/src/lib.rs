#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Generates the collector configuration of a validated forwarder.
//!
//! The document is a directed graph of collector components. Each input
//! becomes one or more sources, each feeding a normalizing remap; a router
//! gives every input a stable ID that pipelines consume; each pipeline is a
//! chain of transforms; and each output is a sink fed by the pipelines that
//! reference it. A metrics exporter is always appended.
//!
//! Forwarders collected by fluentd are rendered in fluentd's own dialect
//! instead.
//!
//! Generation is deterministic: the same forwarder and collaborator state
//! always render the same bytes.

pub mod framework;

mod elements;
mod filters;
mod fluentd;
mod metrics;
mod normalize;
mod pipelines;
mod sinks;
mod sources;


use self::framework::{Element, Generator, Part, Section, StructuredElement};
use logging_forwarder_core::{
    cancel, CancellationToken, Cancelled, CollectorKind, LookupError, ResourceLookup,
    SecretStore, ServiceRequirement,
};
use logging_forwarder_k8s_api::{
    logging::FluentdForwarderSpec, names, ClusterLogForwarderSpec, InputSpec,
};
use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
};

/// Where the collector finds the secrets it is given, one directory per
/// secret.
pub const SECRETS_DIR: &str = "/var/run/ocp-collector/secrets";

const SECRET_BACKEND: &str = "kubernetes_secret";

/// Everything generation reads.
pub struct Context<'a> {
    pub namespace: &'a str,
    pub name: &'a str,

    /// The migrated and validated spec.
    pub spec: &'a ClusterLogForwarderSpec,
    pub collector: CollectorKind,

    pub secrets: &'a dyn SecretStore,
    pub resources: &'a dyn ResourceLookup,

    /// Buffer and file-reader tuning for the fluentd collector.
    pub fluentd: Option<&'a FluentdForwarderSpec>,
}

/// A generated configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generated {
    pub document: String,

    /// Ports the collector service must expose for receiver inputs, ordered
    /// by name.
    pub services: Vec<ServiceRequirement>,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("output {output:?} has unsupported type {type_:?}")]
    UnsupportedOutput { output: String, type_: String },

    #[error("secret {secret:?} for output {output:?} not found")]
    MissingSecret { output: String, secret: String },

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Settings at the root of the document.
struct Global {
    data_dir: String,
}

/// Declares the directory that `SECRET[..]` references are read from.
struct SecretBackend;

/// Generates the configuration for `cx`, checking `token` between stages.
pub fn generate(cx: &Context<'_>, token: &CancellationToken) -> Result<Generated, GenerateError> {
    match cx.collector {
        CollectorKind::Vector => generate_vector(cx, token),
        CollectorKind::Fluentd => fluentd::generate(cx, token),
    }
}

fn generate_vector(
    cx: &Context<'_>,
    token: &CancellationToken,
) -> Result<Generated, GenerateError> {
    cancel::check(token, "generate")?;
    let tls = cx.resources.cluster_tls_profile()?;

    let mut parts = vec![
        Part::template(Global {
            data_dir: format!("/var/lib/vector/{}/{}", cx.namespace, cx.name),
        }),
        Part::structured(SecretBackend),
    ];
    let mut services = BTreeSet::new();

    for input in referenced_inputs(cx.spec) {
        let adapted = sources::adapt(cx, &input, &tls);
        let mut elements = adapted.elements;
        elements.push(Box::new(pipelines::router(&input, adapted.outputs)));
        parts.push(Part::from(Section::new(
            format!("Input {:?}", input.name),
            elements,
        )));
        services.extend(adapted.service);
    }

    cancel::check(token, "pipelines")?;
    let filters = cx.spec.filter_map();
    let mut feeds = BTreeMap::<&str, Vec<String>>::new();
    for pipeline in &cx.spec.pipelines {
        let chain = pipelines::chain(pipeline, &filters);
        for output in &pipeline.output_refs {
            feeds
                .entry(output.as_str())
                .or_default()
                .push(chain.output.clone());
        }
        parts.push(Part::from(Section::new(
            format!("Pipeline {:?}", pipeline.name),
            chain.elements,
        )));
    }

    cancel::check(token, "outputs")?;
    let outputs = cx.spec.output_map();
    for (name, mut inputs) in feeds {
        let Some(output) = outputs.get(name) else {
            tracing::warn!(output = %name, "Skipping undeclared output");
            continue;
        };
        inputs.sort();
        inputs.dedup();
        parts.extend(sinks::adapt(cx, output, inputs, &tls)?);
    }

    parts.push(Part::template(metrics::Metrics::new(tls)));

    let document = Generator::default().generate(parts);
    tracing::debug!(namespace = %cx.namespace, name = %cx.name, bytes = document.len(), "Generated collector configuration");
    Ok(Generated {
        document,
        services: services.into_iter().collect(),
    })
}

/// The inputs that pipelines reference, ordered by name. Only these are
/// collected. Reserved inputs need not be declared.
pub(crate) fn referenced_inputs(spec: &ClusterLogForwarderSpec) -> Vec<Cow<'_, InputSpec>> {
    let declared = spec.input_map();
    spec.pipelines
        .iter()
        .flat_map(|p| p.input_refs.iter().map(String::as_str))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter_map(|name| match declared.get(name) {
            Some(input) => Some(Cow::Borrowed(*input)),
            None => {
                let reserved = InputSpec::reserved(name).map(Cow::Owned);
                if reserved.is_none() {
                    tracing::warn!(input = %name, "Skipping undeclared input");
                }
                reserved
            }
        })
        .collect()
}

/// Formats a name for use in a component ID.
pub(crate) fn component_id(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// The file holding `key` of `secret` in the collector's filesystem.
pub(crate) fn secret_path(secret: &str, key: &str) -> String {
    format!("{SECRETS_DIR}/{secret}/{key}")
}

/// A reference the collector resolves to the value of `key` in `secret`.
pub(crate) fn secret_ref(secret: &str, key: &str) -> String {
    format!("SECRET[{SECRET_BACKEND}.{secret}/{key}]")
}

// === impl Context ===

impl Context<'_> {
    /// The service account the collector runs as.
    pub fn service_account(&self) -> &str {
        self.spec
            .service_account_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(names::DEFAULT_SERVICE_ACCOUNT)
    }
}

impl Element for Global {
    fn name(&self) -> &str {
        "global"
    }

    fn template(&self) -> String {
        format!(
            "expire_metrics_secs = 60\ndata_dir = {}",
            framework::funcs::quote(&self.data_dir)
        )
    }
}

impl StructuredElement for SecretBackend {
    fn config(&self) -> toml::Table {
        let mut backend = toml::Table::new();
        backend.insert("type".to_string(), "directory".into());
        backend.insert("path".to_string(), SECRETS_DIR.into());
        let mut secret = toml::Table::new();
        secret.insert(SECRET_BACKEND.to_string(), toml::Value::Table(backend));
        let mut root = toml::Table::new();
        root.insert("secret".to_string(), toml::Value::Table(secret));
        root
    }
}
