//! Routes normalized records into pipelines and through their filters.

use crate::{
    component_id,
    elements::{DetectExceptions, Remap},
    filters,
    framework::Element,
};
use logging_forwarder_k8s_api::{names, FilterSpec, InputSpec, PipelineSpec};
use std::collections::BTreeMap;

/// The elements of one pipeline and the ID its records leave by.
pub(crate) struct Chain {
    pub elements: Vec<Box<dyn Element>>,
    pub output: String,
}

/// The ID pipelines use to refer to an input. Reserved inputs keep their
/// names; user-defined inputs are renamed so they cannot collide with them.
pub(crate) fn input_ref(name: &str) -> String {
    if names::is_reserved_input(name) {
        return name.to_string();
    }
    format!("{}_user_defined", component_id(name))
}

/// Lifts normalized records out of their envelope under the input's
/// reference ID.
pub(crate) fn router(input: &InputSpec, inputs: Vec<String>) -> Remap {
    Remap::new(
        input_ref(&input.name),
        inputs,
        format!(". = ._internal\n.openshift.input = {:?}", input.name),
    )
}

/// The transforms of `pipeline`, in the order records pass through them.
pub(crate) fn chain(
    pipeline: &PipelineSpec,
    filters: &BTreeMap<&str, &FilterSpec>,
) -> Chain {
    let base = format!("pipeline_{}", component_id(&pipeline.name));
    let mut elements: Vec<Box<dyn Element>> = Vec::new();

    let mut vrl = vec![
        "del(.source_type)".to_string(),
        "del(.file)".to_string(),
        "del(.kubernetes.pod_ips)".to_string(),
    ];
    if !pipeline.labels.is_empty() {
        let labels = serde_json::to_string(&pipeline.labels).unwrap_or_else(|_| "{}".to_string());
        vrl.push(format!(".openshift.labels = {labels}"));
    }
    let inputs = pipeline.input_refs.iter().map(|i| input_ref(i)).collect();
    elements.push(Box::new(Remap::new(base.clone(), inputs, vrl.join("\n"))));
    let mut current = base.clone();

    if pipeline.detect_multiline_errors {
        let id = format!("{base}_detect_exceptions");
        elements.push(Box::new(DetectExceptions {
            id: id.clone(),
            inputs: vec![current],
        }));
        current = id;
    }

    if pipeline.parses_json() {
        let id = format!("{base}_json");
        elements.push(Box::new(Remap::new(
            id.clone(),
            vec![current],
            r#"if .log_type == "application" {
  structured, err = parse_json(string(.message) ?? "")
  if err == null {
    .structured = structured
    del(.message)
  }
}"#,
        )));
        current = id;
    }

    for name in &pipeline.filter_refs {
        let Some(filter) = filters.get(name.as_str()) else {
            tracing::warn!(pipeline = %pipeline.name, filter = %name, "Skipping undeclared filter");
            continue;
        };
        let id = format!("{base}_{}", component_id(name));
        if let Some(element) = filters::element(id.clone(), vec![current.clone()], filter) {
            elements.push(element);
            current = id;
        }
    }

    Chain {
        elements,
        output: current,
    }
}
