use crate::{
    output::ElasticsearchStructuredSpec, ClusterLogForwarderStatus, FilterSpec, InputSpec,
    OutputSpec, PipelineSpec,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Describes which logs are collected, how they are transformed and where
/// they are sent.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "logging.openshift.io",
    version = "v1",
    kind = "ClusterLogForwarder",
    status = "ClusterLogForwarderStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLogForwarderSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipelines: Vec<PipelineSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_defaults: Option<OutputDefaults>,

    /// The service account the collector runs as. Required except for the
    /// legacy singleton.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

/// Settings applied to the `default` output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch: Option<ElasticsearchStructuredSpec>,
}

impl ClusterLogForwarderSpec {
    pub fn input_map(&self) -> BTreeMap<&str, &InputSpec> {
        self.inputs.iter().map(|i| (i.name.as_str(), i)).collect()
    }

    pub fn output_map(&self) -> BTreeMap<&str, &OutputSpec> {
        self.outputs.iter().map(|o| (o.name.as_str(), o)).collect()
    }

    pub fn filter_map(&self) -> BTreeMap<&str, &FilterSpec> {
        self.filters.iter().map(|f| (f.name.as_str(), f)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
            && self.outputs.is_empty()
            && self.filters.is_empty()
            && self.pipelines.is_empty()
    }

    /// The secrets the forwarder's outputs and receivers read.
    pub fn secret_names(&self) -> BTreeSet<&str> {
        let outputs = self.outputs.iter().filter_map(|o| o.secret_name());
        let receivers = self.inputs.iter().filter_map(|i| {
            i.receiver
                .as_ref()?
                .tls
                .as_ref()?
                .secret_name
                .as_deref()
        });
        outputs.chain(receivers).filter(|n| !n.is_empty()).collect()
    }

    /// The elasticsearch structured-index default, if any.
    pub fn default_es_structured(&self) -> Option<&ElasticsearchStructuredSpec> {
        self.output_defaults
            .as_ref()
            .and_then(|d| d.elasticsearch.as_ref())
    }
}
