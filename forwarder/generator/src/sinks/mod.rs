//! Sink components, one adapter per output type.

mod auth;
mod azure_monitor;
mod cloudwatch;
mod elasticsearch;
mod google_cloud_logging;
mod http;
mod kafka;
mod loki;
mod splunk;
mod syslog;
mod tls;

use crate::{
    component_id,
    elements::Throttle,
    framework::{
        funcs::{array, key, lines},
        Element, Part, Section, StructuredElement,
    },
    Context, GenerateError,
};
use logging_forwarder_core::{Secret, TlsProfile};
use logging_forwarder_k8s_api::{
    names,
    output::{TUNING_BUFFER_MAX_EVENTS, TUNING_BUFFER_WHEN_FULL},
    OutputSpec, OutputType,
};

/// An output being generated, with everything its adapter reads.
pub(crate) struct Sink<'a> {
    pub cx: &'a Context<'a>,
    pub spec: &'a OutputSpec,
    pub id: String,
    pub inputs: Vec<String>,
    pub secret: Option<Secret>,
    pub tls: TlsProfile,
}

/// What an adapter generates: components, and option tables keyed under
/// the sink that tuning may override.
#[derive(Default)]
pub(crate) struct SinkConfig {
    pub elements: Vec<Box<dyn Element>>,
    pub defaults: toml::Table,
}

/// `[sinks.<id>]` with the given keys, followed by any sub-tables.
pub(crate) struct SinkElement {
    pub id: String,
    pub type_: &'static str,
    pub inputs: Vec<String>,
    pub keys: Vec<String>,
    pub tables: Vec<String>,
}

/// Option tables for one sink, merged into the document.
struct SinkOptions {
    id: String,
    options: toml::Table,
}

/// Generates `output`, fed by the `pipelines` that reference it.
pub(crate) fn adapt(
    cx: &Context<'_>,
    output: &OutputSpec,
    pipelines: Vec<String>,
    cluster_tls: &TlsProfile,
) -> Result<Vec<Part>, GenerateError> {
    let type_ = output
        .output_type()
        .ok_or_else(|| GenerateError::UnsupportedOutput {
            output: output.name.clone(),
            type_: output.type_.clone(),
        })?;
    let id = format!("output_{}", component_id(&output.name));

    let mut elements = Vec::<Box<dyn Element>>::new();
    let mut inputs = pipelines;
    if let Some(threshold) = output.max_records_per_second().filter(|n| *n > 0) {
        let throttle = format!("sink_throttle_{}", component_id(&output.name));
        elements.push(Box::new(Throttle {
            id: throttle.clone(),
            inputs,
            threshold,
            key_field: None,
        }));
        inputs = vec![throttle];
    }

    let sink = Sink {
        cx,
        spec: output,
        id,
        inputs,
        secret: fetch_secret(cx, output)?,
        tls: output.tls_profile().unwrap_or_else(|| cluster_tls.clone()),
    };
    let config = match type_ {
        OutputType::AzureMonitor => azure_monitor::new(&sink),
        OutputType::Cloudwatch => cloudwatch::new(&sink)?,
        OutputType::Elasticsearch => elasticsearch::new(&sink),
        OutputType::GoogleCloudLogging => google_cloud_logging::new(&sink),
        OutputType::Http => http::new(&sink),
        OutputType::Kafka => kafka::new(&sink),
        OutputType::Loki => loki::new(&sink),
        OutputType::Splunk => splunk::new(&sink),
        OutputType::Syslog => syslog::new(&sink),
        OutputType::FluentdForward => {
            return Err(GenerateError::UnsupportedOutput {
                output: output.name.clone(),
                type_: output.type_.clone(),
            })
        }
    };
    tracing::debug!(output = %output.name, %type_, id = %sink.id, "Generated sink");
    elements.extend(config.elements);

    let mut parts = vec![Part::from(Section::new(
        format!("Output {:?} ({type_})", output.name),
        elements,
    ))];
    if !config.defaults.is_empty() {
        parts.push(Part::structured(SinkOptions {
            id: sink.id.clone(),
            options: config.defaults,
        }));
    }
    let tuning = tuning(output);
    if !tuning.is_empty() {
        parts.push(Part::structured(SinkOptions {
            id: sink.id.clone(),
            options: tuning,
        }));
    }
    Ok(parts)
}

/// The output's secret. The managed log store's secret may not be visible
/// yet; its well-known keys are assumed.
pub(crate) fn fetch_secret(
    cx: &Context<'_>,
    output: &OutputSpec,
) -> Result<Option<Secret>, GenerateError> {
    let Some(name) = output.secret_name() else {
        return Ok(None);
    };
    match cx.secrets.get(cx.namespace, name) {
        Ok(Some(secret)) => Ok(Some(secret)),
        Ok(None) if is_managed(output) => Ok(None),
        Ok(None) => Err(GenerateError::MissingSecret {
            output: output.name.clone(),
            secret: name.to_string(),
        }),
        Err(error) => Err(GenerateError::Lookup(error)),
    }
}

/// Outputs that point at the cluster's managed log store.
pub(crate) fn is_managed(output: &OutputSpec) -> bool {
    output.is_default() || names::is_default_loki_output(&output.name)
}

/// Tuning options as nested tables, e.g. `buffer.max_events` becomes
/// `buffer = { max_events = .. }`.
fn tuning(output: &OutputSpec) -> toml::Table {
    let mut table = toml::Table::new();
    for (option, value) in output.tuning() {
        let Some((section, name)) = option.split_once('.') else {
            continue;
        };
        let value = match value {
            serde_json::Value::String(s) => toml::Value::String(s.clone()),
            serde_json::Value::Number(n) => match n.as_u64().and_then(|n| i64::try_from(n).ok()) {
                Some(n) => toml::Value::Integer(n),
                None => continue,
            },
            _ => continue,
        };
        let section = table
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let toml::Value::Table(section) = section {
            section.insert(name.to_string(), value);
        }
    }
    let buffered = output
        .tuning()
        .any(|(k, _)| k == TUNING_BUFFER_MAX_EVENTS || k == TUNING_BUFFER_WHEN_FULL);
    if buffered {
        if let Some(toml::Value::Table(buffer)) = table.get_mut("buffer") {
            buffer.insert("type".to_string(), toml::Value::String("memory".to_string()));
        }
    }
    table
}

// === impl Sink ===

impl Sink<'_> {
    pub fn secret_name(&self) -> Option<&str> {
        self.spec.secret_name()
    }

    /// True when the output's secret has a non-empty `key`.
    pub fn has(&self, key: &str) -> bool {
        self.secret
            .as_ref()
            .map(|s| s.has_non_empty(key))
            .unwrap_or(false)
    }

    /// A reference to a secret value, resolved by the collector at startup.
    pub fn secret_ref(&self, key: &str) -> Option<String> {
        let name = self.secret_name()?;
        self.has(key).then(|| crate::secret_ref(name, key))
    }

    pub fn element(&self, type_: &'static str, keys: Vec<String>) -> SinkElement {
        SinkElement {
            id: self.id.clone(),
            type_,
            inputs: self.inputs.clone(),
            keys,
            tables: Vec::new(),
        }
    }
}

impl SinkElement {
    pub fn with_inputs(mut self, inputs: Vec<String>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Adds a `[sinks.<id>.<name>]` table.
    pub fn with_table(mut self, name: &str, keys: Vec<String>) -> Self {
        let keys = lines(keys);
        if !keys.is_empty() {
            self.tables
                .push(format!("[sinks.{}.{}]\n{keys}", self.id, key(name)));
        }
        self
    }
}

impl Element for SinkElement {
    fn name(&self) -> &str {
        &self.id
    }

    fn template(&self) -> String {
        let mut parts = vec![lines(
            [
                format!("[sinks.{}]", self.id),
                format!("type = {:?}", self.type_),
                format!("inputs = {}", array(&self.inputs)),
            ]
            .into_iter()
            .chain(self.keys.iter().cloned()),
        )];
        parts.extend(self.tables.iter().cloned());
        parts.join("\n\n")
    }
}

impl StructuredElement for SinkOptions {
    fn config(&self) -> toml::Table {
        let mut sink = toml::Table::new();
        sink.insert(self.id.clone(), toml::Value::Table(self.options.clone()));
        let mut sinks = toml::Table::new();
        sinks.insert("sinks".to_string(), toml::Value::Table(sink));
        sinks
    }
}
