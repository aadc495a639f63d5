use crate::{fail, Context, Fatal, Validate};
use logging_forwarder_k8s_api::{
    names, output::ElasticsearchStructuredSpec, ClusterLogForwarderStatus, Condition,
    FilterSpec, NamedConditions, OutputSpec, OutputType, PipelineSpec,
};
use std::collections::{BTreeMap, BTreeSet};

/// Checks that every pipeline refers to usable inputs, outputs and filters.
///
/// Runs after the entity passes, so an entity that is declared but not ready
/// counts as unrecognized.
pub(crate) struct Pipelines;

impl Validate for Pipelines {
    fn name(&self) -> &'static str {
        "pipelines"
    }

    fn validate(
        &self,
        cx: &Context<'_>,
        status: &mut ClusterLogForwarderStatus,
    ) -> Result<(), Fatal> {
        let outputs = cx.spec.output_map();
        let filters = cx.spec.filter_map();
        let mut seen = BTreeSet::new();

        for (i, pipeline) in cx.spec.pipelines.iter().enumerate() {
            if pipeline.name.is_empty() {
                fail(
                    &mut status.pipelines,
                    &format!("pipeline_{i}_"),
                    Condition::invalid("pipeline must have a name"),
                );
                continue;
            }
            if !seen.insert(pipeline.name.as_str()) {
                fail(
                    &mut status.pipelines,
                    &format!("pipeline_{i}_"),
                    Condition::invalid(format!("duplicate name {:?}", pipeline.name)),
                );
                continue;
            }
            if pipeline.labels.keys().any(String::is_empty) {
                fail(
                    &mut status.pipelines,
                    &pipeline.name,
                    Condition::invalid("invalid pipeline labels"),
                );
                continue;
            }

            let mut msgs = check_inputs(pipeline, &status.inputs);
            msgs.extend(check_outputs(cx.name, pipeline, &status.outputs));
            msgs.extend(check_filters(pipeline, &status.filters));
            if !msgs.is_empty() {
                fail(
                    &mut status.pipelines,
                    &pipeline.name,
                    Condition::invalid(format!("invalid: {}", msgs.join(", "))),
                );
                continue;
            }

            if let Some(msg) = check_pruned_hostname(pipeline, &outputs, &filters) {
                fail(&mut status.pipelines, &pipeline.name, Condition::invalid(msg));
                continue;
            }
            if let Some(msg) = check_structured(cx, pipeline, &outputs) {
                fail(&mut status.pipelines, &pipeline.name, Condition::invalid(msg));
                continue;
            }

            status.pipelines.set(&pipeline.name, Condition::ready());
        }
        Ok(())
    }
}

/// Reserved inputs are always usable; others must be declared and ready.
fn check_inputs(pipeline: &PipelineSpec, inputs: &NamedConditions) -> Vec<String> {
    let (good, bad): (Vec<_>, Vec<_>) = pipeline
        .input_refs
        .iter()
        .map(String::as_str)
        .partition(|i| names::is_reserved_input(i) || inputs.is_ready(i));
    unrecognized("inputs", good.is_empty(), bad)
}

fn check_outputs(
    forwarder: &str,
    pipeline: &PipelineSpec,
    outputs: &NamedConditions,
) -> Vec<String> {
    let mut msgs = Vec::new();
    let mut good = Vec::new();
    let mut bad = Vec::new();
    for output in pipeline.output_refs.iter().map(String::as_str) {
        if forwarder != names::SINGLETON_NAME && output == names::OUTPUT_DEFAULT {
            msgs.push(
                "custom ClusterLogForwarders cannot forward to the `default` log store".to_string(),
            );
            bad.push(output);
        } else if outputs.is_ready(output) {
            good.push(output);
        } else {
            bad.push(output);
        }
    }
    msgs.extend(unrecognized("outputs", good.is_empty(), bad));
    msgs
}

fn check_filters(pipeline: &PipelineSpec, filters: &NamedConditions) -> Vec<String> {
    let bad = pipeline
        .filter_refs
        .iter()
        .map(String::as_str)
        .filter(|f| !filters.is_ready(f))
        .collect();
    unrecognized("filters", false, bad)
}

fn unrecognized(what: &str, none_valid: bool, bad: Vec<&str>) -> Vec<String> {
    let mut msgs = Vec::new();
    if !bad.is_empty() {
        let bad = bad.into_iter().collect::<BTreeSet<_>>();
        msgs.push(format!("unrecognized {what}: {bad:?}"));
    }
    if none_valid {
        msgs.push(format!("no valid {what}"));
    }
    msgs
}

/// Google Cloud Logging requires each record's hostname.
fn check_pruned_hostname(
    pipeline: &PipelineSpec,
    outputs: &BTreeMap<&str, &OutputSpec>,
    filters: &BTreeMap<&str, &FilterSpec>,
) -> Option<String> {
    let gcl = pipeline
        .output_refs
        .iter()
        .filter_map(|o| outputs.get(o.as_str()))
        .any(|o| o.is_type(OutputType::GoogleCloudLogging));
    if !gcl {
        return None;
    }
    let pruning = pipeline
        .filter_refs
        .iter()
        .filter_map(|f| filters.get(f.as_str()))
        .find(|f| f.prunes(".hostname"))?;
    Some(format!(
        "prune filter {:?} cannot prune `.hostname` from records sent to a googleCloudLogging output",
        pruning.name
    ))
}

/// Structured records are indexed by a key or name that an elasticsearch
/// output, or the forwarder's output defaults, must provide.
fn check_structured(
    cx: &Context<'_>,
    pipeline: &PipelineSpec,
    outputs: &BTreeMap<&str, &OutputSpec>,
) -> Option<String> {
    if !pipeline.parses_json() {
        return None;
    }
    let has_index = |s: &ElasticsearchStructuredSpec| {
        s.structured_type_key.is_some() || s.structured_type_name.is_some()
    };
    let unindexed = pipeline
        .output_refs
        .iter()
        .filter_map(|o| outputs.get(o.as_str()))
        .filter(|o| o.is_type(OutputType::Elasticsearch))
        .find(|o| {
            let own = o
                .type_spec
                .elasticsearch
                .as_ref()
                .map(|es| has_index(&es.structured))
                .unwrap_or(false);
            !own && !cx.spec.default_es_structured().map(has_index).unwrap_or(false)
        })?;
    Some(format!(
        "structuredTypeKey or structuredTypeName must be defined for Elasticsearch output {:?} when JSON parsing is enabled on pipeline {:?}",
        unindexed.name, pipeline.name
    ))
}

/// Fails pipelines whose outputs were failed by a later pass.
pub(crate) fn revalidate_outputs(cx: &Context<'_>, status: &mut ClusterLogForwarderStatus) {
    for pipeline in cx.spec.pipelines.iter().filter(|p| !p.name.is_empty()) {
        if !status.pipelines.is_ready(&pipeline.name) {
            continue;
        }
        let failed = pipeline
            .output_refs
            .iter()
            .map(String::as_str)
            .filter(|o| !status.outputs.is_ready(o))
            .collect::<BTreeSet<_>>();
        if !failed.is_empty() {
            fail(
                &mut status.pipelines,
                &pipeline.name,
                Condition::invalid(format!("invalid: unrecognized outputs: {failed:?}")),
            );
        }
    }
}
