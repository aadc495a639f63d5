use super::{auth, is_managed, tls, Sink, SinkConfig};
use crate::{elements::Remap, framework::funcs::kv, secret_ref};
use logging_forwarder_core::secret::BEARER_TOKEN;
use std::collections::BTreeSet;

const DEFAULT_LABEL_KEYS: [&str; 4] = [
    "log_type",
    "kubernetes.namespace_name",
    "kubernetes.pod_name",
    "kubernetes.container_name",
];

const HOST_LABEL: &str = "kubernetes.host";

/// Container labels that must exist for every record, so that records from
/// other sources can still be labelled.
const CONTAINER_LABELS: [&str; 3] = [
    "kubernetes.namespace_name",
    "kubernetes.pod_name",
    "kubernetes.container_name",
];

pub(super) fn new(sink: &Sink<'_>) -> SinkConfig {
    let loki = sink.spec.type_spec.loki.as_ref();
    let remap_id = format!("{}_remap_label", sink.id);
    let remap = Remap::new(
        remap_id.clone(),
        sink.inputs.clone(),
        CONTAINER_LABELS
            .iter()
            .map(|l| format!("if !exists(.{l}) {{\n  .{l} = \"\"\n}}"))
            .collect::<Vec<_>>()
            .join("\n"),
    );

    let mut keys = vec![
        kv("endpoint", sink.spec.url()),
        r#"out_of_order_action = "accept""#.to_string(),
        "healthcheck.enabled = false".to_string(),
        kv(
            "tenant_id",
            loki.and_then(|l| l.tenant_key.as_deref())
                .filter(|k| !k.is_empty())
                .map(|k| format!("{{{{{k}}}}}")),
        ),
    ];

    let managed = is_managed(sink.spec);
    if managed {
        let token = format!("{}-token", sink.cx.service_account());
        keys.extend(auth::bearer_token(secret_ref(&token, BEARER_TOKEN)));
    } else {
        keys.extend(auth::basic_or_bearer(sink));
    }

    let label_keys = loki
        .map(|l| l.label_keys.as_slice())
        .filter(|k| !k.is_empty());
    let element = sink
        .element("loki", keys)
        .with_inputs(vec![remap_id])
        .with_table("encoding", vec![r#"codec = "json""#.to_string()])
        .with_table("labels", labels(label_keys));

    let mut config = SinkConfig::default();
    config.elements.push(Box::new(remap));
    config.elements.push(Box::new(element));
    let tls = if managed {
        Some(tls::service_ca(sink))
    } else {
        tls::for_url(sink, false)
    };
    if let Some(tls) = tls {
        config.elements.push(Box::new(tls));
    }
    config
}

/// `name = "{{ field }}"` for every label key, in key order. The node name
/// label is always present.
fn labels(keys: Option<&[String]>) -> Vec<String> {
    let mut keys = match keys {
        Some(keys) => keys.iter().map(String::as_str).collect::<BTreeSet<_>>(),
        None => DEFAULT_LABEL_KEYS.into_iter().collect(),
    };
    keys.insert(HOST_LABEL);
    keys.into_iter()
        .map(|k| {
            let name = k.replace(['.', '/', '\\', '-'], "_");
            let value = if k == HOST_LABEL {
                "${VECTOR_SELF_NODE_NAME}".to_string()
            } else {
                label_value(k)
            };
            kv(&name, Some(value))
        })
        .collect()
}

/// A template referencing `key`. Kubernetes label names are flattened the
/// way the collector flattens them.
fn label_value(key: &str) -> String {
    for prefix in ["kubernetes.labels.", "kubernetes.namespace_labels."] {
        if let Some(label) = key.strip_prefix(prefix) {
            let label = label.replace(['/', '.'], "_");
            return format!("{{{{{prefix}\"{label}\"}}}}");
        }
    }
    format!("{{{{{key}}}}}")
}
