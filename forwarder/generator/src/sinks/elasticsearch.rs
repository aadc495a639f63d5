use super::{auth, tls, Sink, SinkConfig};
use crate::{
    elements::Remap,
    filters::vrl_path,
    framework::{
        funcs::{indent, kv},
        Element, Section,
    },
};
use logging_forwarder_k8s_api::{names, output::ElasticsearchStructuredSpec};

const SET_INDEX: &str = r#"index = "default"
if (.log_type == "application") {
  index = "app"
}
if (.log_type == "infrastructure") {
  index = "infra"
}
if (.log_type == "audit") {
  index = "audit"
}
.write_index = index + "-write"
._id = encode_base64(uuid_v4())
del(.file)
del(.tag)
del(.source_type)"#;

const CONTAINER_INDEX: &str = r#"if .log_type == "application" && .structured != null && .kubernetes.container_name != null && .kubernetes.annotations != null && length!(.kubernetes.annotations) > 0 {
  key = join!(["containerType.logging.openshift.io", .kubernetes.container_name], separator: "/")
  index, err = get(value: .kubernetes.annotations, path: [key])
  if index != null && err == null {
    .write_index = join!(["app-", index, "-write"])
  }
}"#;

const UNSTRUCTURED: &str = r#"if .structured != null && .write_index == "app-write" {
  .message = encode_json(.structured)
  del(.structured)
}"#;

pub(super) fn new(sink: &Sink<'_>) -> SinkConfig {
    let version = sink.spec.elasticsearch_version();
    let index_id = format!("{}_add_es_index", sink.id);
    let index = Remap::new(index_id.clone(), sink.inputs.clone(), index_vrl(sink));

    let mut keys = vec![
        kv("endpoints", Some(vec![sink.spec.url().unwrap_or(names::LOG_STORE_URL)])),
        r#"bulk.index = "{{ write_index }}""#.to_string(),
        r#"bulk.action = "create""#.to_string(),
        r#"encoding.except_fields = ["write_index"]"#.to_string(),
        r#"id_key = "_id""#.to_string(),
        kv("api_version", Some(format!("v{version}"))),
    ];
    if version >= names::FIRST_ES_VERSION_WITHOUT_TYPE {
        keys.push("suppress_type_name = true".to_string());
    }
    keys.extend(auth::basic(sink));

    let mut elements: Vec<Box<dyn Element>> = vec![
        Box::new(index),
        Box::new(sink.element("elasticsearch", keys).with_inputs(vec![index_id])),
    ];
    if let Some(tls) = tls::for_url(sink, false) {
        elements.push(Box::new(tls));
    }

    let mut request = toml::Table::new();
    request.insert("timeout_secs".to_string(), toml::Value::Integer(2147483648));
    let mut defaults = toml::Table::new();
    defaults.insert("request".to_string(), toml::Value::Table(request));

    SinkConfig {
        elements: vec![Box::new(Section::new(
            format!("Elasticsearch version {version}"),
            elements,
        ))],
        defaults,
    }
}

/// Chooses the write index of each record. Structured application records
/// may be redirected to an index named by a field or a fixed type name.
///
/// Outputs without structured settings of their own use the forwarder's
/// elasticsearch output defaults.
fn index_vrl(sink: &Sink<'_>) -> String {
    let mut steps = vec![SET_INDEX.to_string()];
    let structured = sink
        .spec
        .type_spec
        .elasticsearch
        .as_ref()
        .map(|es| &es.structured)
        .filter(|s| !s.is_empty())
        .or_else(|| sink.cx.spec.default_es_structured())
        .filter(|s| !s.is_empty());
    if let Some(structured) = structured {
        if let Some(step) = structured_index(structured) {
            steps.push(step);
        }
        if structured.enable_structured_container_logs {
            steps.push(CONTAINER_INDEX.to_string());
        }
        steps.push(UNSTRUCTURED.to_string());
    }
    steps.join("\n")
}

fn structured_index(es: &ElasticsearchStructuredSpec) -> Option<String> {
    let key = es.structured_type_key.as_deref().filter(|k| !k.is_empty());
    let name = es.structured_type_name.as_deref().filter(|n| !n.is_empty());
    let lookup = |key: &str| {
        format!(
            "val = {}\nif val != null {{\n  .write_index, err = \"app-\" + val + \"-write\"\n}}",
            vrl_path(key)
        )
    };
    let step = match (key, name) {
        (None, None) => return None,
        (Some(key), None) => lookup(key),
        (None, Some(name)) => format!(".write_index = \"app-{name}-write\""),
        (Some(key), Some(name)) => format!(
            "{} else {{\n  .write_index = \"app-{name}-write\"\n}}",
            lookup(key)
        ),
    };
    Some(format!(
        "if .log_type == \"application\" && .structured != null {{\n{}\n}}",
        indent(2, &step)
    ))
}
