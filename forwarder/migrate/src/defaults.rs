use crate::{Extras, Warning};
use logging_forwarder_k8s_api::{
    logging::{VisualizationSpec, VISUALIZATION_OCP_CONSOLE},
    names,
    output::Elasticsearch,
    ClusterLogForwarderSpec, ClusterLoggingSpec, LogStoreKind, OutputSpec, OutputType,
    PipelineSpec, Routes,
};

/// A lokistack log store is browsed from the console unless told otherwise.
pub(crate) fn visualization(logging: &mut ClusterLoggingSpec) {
    if logging.log_store_kind() == Some(LogStoreKind::LokiStack) && logging.visualization.is_none()
    {
        logging.visualization = Some(VisualizationSpec {
            type_: VISUALIZATION_OCP_CONSOLE.to_string(),
        });
    }
}

/// A forwarder that declares nothing sends application and infrastructure
/// logs to the log store.
pub(crate) fn default_pipeline(spec: &mut ClusterLogForwarderSpec) {
    if !spec.is_empty() || spec.output_defaults.is_some() {
        return;
    }
    tracing::debug!("Forwarding to the default log store");
    spec.pipelines = vec![PipelineSpec::new(
        names::OUTPUT_DEFAULT,
        &[names::INPUT_APPLICATION, names::INPUT_INFRASTRUCTURE],
        &[names::OUTPUT_DEFAULT],
    )];
}

/// Declares the `default` output when a pipeline references it.
///
/// A user-declared `default` is replaced by the managed log store, keeping
/// only its elasticsearch settings.
pub(crate) fn default_output(
    spec: &mut ClusterLogForwarderSpec,
    extras: &mut Extras,
    warnings: &mut Vec<Warning>,
) {
    let routes = Routes::new(&spec.pipelines);
    if !routes.by_output.contains_key(names::OUTPUT_DEFAULT) {
        return;
    }

    let mut default = new_default_output(spec);
    match spec.outputs.iter_mut().find(|o| o.is_default()) {
        Some(declared) => {
            if let Some(es) = declared.type_spec.elasticsearch.as_ref() {
                default.type_spec.elasticsearch = Some(es.clone());
            }
            if *declared != default {
                warnings.push(Warning::migrated(format!(
                    "output {:?} is managed by the log store; only its elasticsearch settings are kept",
                    names::OUTPUT_DEFAULT,
                )));
            }
            *declared = default;
        }
        None => spec.outputs.push(default),
    }
    extras.set(names::MIGRATE_DEFAULT_OUTPUT);
}

fn new_default_output(spec: &ClusterLogForwarderSpec) -> OutputSpec {
    let mut output = OutputSpec::new(
        names::OUTPUT_DEFAULT,
        OutputType::Elasticsearch,
        Some(names::LOG_STORE_URL),
    )
    .with_secret(names::COLLECTOR_SECRET);
    if let Some(structured) = spec.default_es_structured() {
        output.type_spec.elasticsearch = Some(Elasticsearch {
            structured: structured.clone(),
            version: None,
        });
    }
    output
}

pub(crate) fn service_account(spec: &mut ClusterLogForwarderSpec) {
    if spec
        .service_account_name
        .as_deref()
        .map(str::is_empty)
        .unwrap_or(true)
    {
        spec.service_account_name = Some(names::DEFAULT_SERVICE_ACCOUNT.to_string());
    }
}
