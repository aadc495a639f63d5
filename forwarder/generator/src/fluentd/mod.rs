//! Generates configuration for the fluentd collector.
//!
//! Sources tag records by origin and hand them to the `@INGRESS` label, which
//! attaches kubernetes metadata, normalizes them and relabels them by tenant.
//! Each tenant label routes records into the labels of the pipelines that
//! read it, each pipeline label copies records into its outputs' labels, and
//! each output label ends in the store that ships them.

mod directive;
mod ingress;
mod outputs;
mod routes;

pub(crate) use self::directive::Directive;

use crate::{
    framework::{Element, Generator, Part, Section},
    referenced_inputs, Context, GenerateError, Generated,
};
use logging_forwarder_core::{cancel, CancellationToken, Tenant};
use logging_forwarder_k8s_api::{
    input::INFRA_SOURCE_CONTAINER, logging::FluentdBufferSpec, InputSpec,
};
use std::collections::{BTreeMap, BTreeSet};

/// Where buffers and file positions are kept.
pub(crate) const DATA_DIR: &str = "/var/lib/fluentd";

/// What the referenced inputs read, merged across inputs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Collection {
    pub application: bool,
    pub infrastructure: BTreeSet<String>,
    pub audit: BTreeSet<String>,
}

/// Generates the fluentd configuration for `cx`.
pub(crate) fn generate(
    cx: &Context<'_>,
    token: &CancellationToken,
) -> Result<Generated, GenerateError> {
    cancel::check(token, "generate")?;
    let tls = cx.resources.cluster_tls_profile()?;
    let inputs = referenced_inputs(cx.spec);
    let collection = Collection::new(inputs.iter().map(|i| &**i));

    let mut parts = vec![
        Part::from(Section::new(
            "Generated collector configuration",
            vec![boxed(ingress::system())],
        )),
        Part::from(ingress::metrics(&tls)),
    ];
    parts.extend(ingress::sources(cx, &collection));
    parts.extend(ingress::labels(&collection));

    cancel::check(token, "pipelines")?;
    parts.extend(routes::tenants(cx.spec, &inputs));
    parts.extend(cx.spec.pipelines.iter().map(routes::pipeline));

    cancel::check(token, "outputs")?;
    let referenced = cx
        .spec
        .pipelines
        .iter()
        .flat_map(|p| p.output_refs.iter().map(String::as_str))
        .collect::<BTreeSet<_>>();
    let outputs = cx.spec.output_map();
    let mut labels = BTreeMap::new();
    for name in referenced {
        let Some(output) = outputs.get(name) else {
            tracing::warn!(output = %name, "Skipping undeclared output");
            continue;
        };
        labels.insert(name, outputs::label(cx, output, &tls)?);
    }
    if !labels.is_empty() {
        parts.push(Part::from(Section::new(
            "Ship logs to specific outputs",
            labels.into_values().map(boxed).collect(),
        )));
    }

    let document = Generator::default().generate(parts);
    tracing::debug!(
        namespace = %cx.namespace,
        name = %cx.name,
        bytes = document.len(),
        "Generated fluentd configuration"
    );
    Ok(Generated {
        document,
        services: Vec::new(),
    })
}

pub(crate) fn boxed(directive: Directive) -> Box<dyn Element> {
    Box::new(directive)
}

/// The label of a pipeline or output: `@` and the upper-cased name with
/// every other character replaced by `_`.
pub(crate) fn label_name(name: &str) -> String {
    let name = name
        .to_ascii_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>();
    format!("@{name}")
}

/// The label that records of `tenant` are routed from.
pub(crate) fn tenant_label(tenant: Tenant) -> String {
    format!("@_{}", tenant.as_str().to_ascii_uppercase())
}

/// The ID of an output's store, which also names its buffer directory.
pub(crate) fn store_id(name: &str) -> String {
    crate::component_id(name)
}

/// The buffer tuning configured on `ClusterLogging`, if any.
pub(crate) fn buffer_spec<'a>(cx: &Context<'a>) -> Option<&'a FluentdBufferSpec> {
    cx.fluentd?.buffer.as_ref()
}

// === impl Collection ===

impl Collection {
    /// Merges what `inputs` read. Receivers are not collected by fluentd.
    pub fn new<'i>(inputs: impl IntoIterator<Item = &'i InputSpec>) -> Self {
        let mut collection = Self::default();
        for input in inputs {
            if input.receiver.is_some() {
                tracing::warn!(input = %input.name, "Skipping receiver input");
                continue;
            }
            collection.application |= input.application.is_some();
            collection
                .infrastructure
                .extend(input.infrastructure_sources().into_iter().map(String::from));
            collection
                .audit
                .extend(input.audit_sources().into_iter().map(String::from));
        }
        collection
    }

    pub fn collects(&self, tenant: Tenant) -> bool {
        match tenant {
            Tenant::Application => self.application,
            Tenant::Infrastructure => !self.infrastructure.is_empty(),
            Tenant::Audit => !self.audit.is_empty(),
        }
    }

    /// Container logs are read for applications and for infrastructure
    /// containers.
    pub fn reads_containers(&self) -> bool {
        self.application || self.infrastructure.contains(INFRA_SOURCE_CONTAINER)
    }
}
