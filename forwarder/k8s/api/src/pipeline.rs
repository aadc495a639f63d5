use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PARSE_JSON: &str = "json";

/// Carries records from a set of inputs, through filters, to a set of
/// outputs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    /// May be empty; the migrator names anonymous pipelines.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default)]
    pub input_refs: Vec<String>,

    #[serde(default)]
    pub output_refs: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_refs: Vec<String>,

    /// Attached to every record as `openshift.labels`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// `json` parses the message of application records into `structured`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse: Option<String>,

    #[serde(default)]
    pub detect_multiline_errors: bool,
}

impl PipelineSpec {
    pub fn new(name: impl Into<String>, inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            name: name.into(),
            input_refs: inputs.iter().map(|s| s.to_string()).collect(),
            output_refs: outputs.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: &[&str]) -> Self {
        self.filter_refs = filters.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn parses_json(&self) -> bool {
        self.parse.as_deref() == Some(PARSE_JSON)
    }

    pub fn references_output(&self, name: &str) -> bool {
        self.output_refs.iter().any(|o| o == name)
    }

    pub fn references_input(&self, name: &str) -> bool {
        self.input_refs.iter().any(|i| i == name)
    }
}
