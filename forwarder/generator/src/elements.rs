//! Transform components shared by sources, pipelines and sinks.

use crate::framework::{
    funcs::{array, kv, lines, multiline, quote},
    Element,
};

/// Runs a VRL program over each event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Remap {
    pub id: String,
    pub inputs: Vec<String>,
    pub vrl: String,
}

/// Keeps events for which a VRL condition holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Filter {
    pub id: String,
    pub inputs: Vec<String>,
    pub condition: String,
}

/// Limits events per second, optionally per templated key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Throttle {
    pub id: String,
    pub inputs: Vec<String>,
    pub threshold: i64,
    pub key_field: Option<String>,
}

/// Joins multi-line exception stack traces into single events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DetectExceptions {
    pub id: String,
    pub inputs: Vec<String>,
}

const THROTTLE_WINDOW_SECS: i64 = 1;

const EXCEPTION_GROUP_BY: [&str; 5] = [
    "kubernetes.namespace_name",
    "kubernetes.pod_name",
    "kubernetes.container_name",
    "kubernetes.pod_id",
    "kubernetes.container_iostream",
];

impl Remap {
    pub fn new(id: impl Into<String>, inputs: Vec<String>, vrl: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs,
            vrl: vrl.into(),
        }
    }
}

impl Element for Remap {
    fn name(&self) -> &str {
        &self.id
    }

    fn template(&self) -> String {
        format!(
            "[transforms.{}]\ntype = \"remap\"\ninputs = {}\nsource = {}",
            self.id,
            array(&self.inputs),
            multiline(&self.vrl)
        )
    }
}

impl Element for Filter {
    fn name(&self) -> &str {
        &self.id
    }

    fn template(&self) -> String {
        format!(
            "[transforms.{}]\ntype = \"filter\"\ninputs = {}\ncondition = {}",
            self.id,
            array(&self.inputs),
            quote(&self.condition)
        )
    }
}

impl Element for Throttle {
    fn name(&self) -> &str {
        &self.id
    }

    fn template(&self) -> String {
        lines([
            format!("[transforms.{}]", self.id),
            "type = \"throttle\"".to_string(),
            format!("inputs = {}", array(&self.inputs)),
            kv("window_secs", Some(THROTTLE_WINDOW_SECS)),
            kv("threshold", Some(self.threshold)),
            kv("key_field", self.key_field.as_deref()),
        ])
    }
}

impl Element for DetectExceptions {
    fn name(&self) -> &str {
        &self.id
    }

    fn template(&self) -> String {
        lines([
            format!("[transforms.{}]", self.id),
            "type = \"detect_exceptions\"".to_string(),
            format!("inputs = {}", array(&self.inputs)),
            format!("languages = {}", array(["All"])),
            format!("group_by = {}", array(EXCEPTION_GROUP_BY)),
            kv("expire_after_secs", Some(2)),
            kv("multiline_flush_interval_ms", Some(1000)),
        ])
    }
}
