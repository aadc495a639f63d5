use super::{tls, Sink, SinkConfig};
use crate::{
    elements::Remap,
    framework::funcs::{kv, quote},
    secret_path, GenerateError,
};
use logging_forwarder_core::secret::{AWS_ACCESS_KEY_ID, AWS_CREDENTIALS, AWS_SECRET_ACCESS_KEY};

pub(super) fn new(sink: &Sink<'_>) -> Result<SinkConfig, GenerateError> {
    let cloudwatch = sink.spec.type_spec.cloudwatch.as_ref();
    let prefix = match cloudwatch
        .and_then(|c| c.group_prefix.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        Some(prefix) => prefix.to_string(),
        None => sink.cx.resources.cluster_infrastructure_name()?,
    };
    let group_by = cloudwatch.map(|c| c.group_by.as_str()).unwrap_or_default();

    let group_id = format!("{}_normalize_group_and_streams", sink.id);
    let group = Remap::new(group_id.clone(), sink.inputs.clone(), group_vrl(&prefix, group_by));

    let mut keys = vec![
        kv("region", cloudwatch.map(|c| c.region.clone())),
        r#"compression = "none""#.to_string(),
        r#"group_name = "{{ group_name }}""#.to_string(),
        r#"stream_name = "{{ stream_name }}""#.to_string(),
    ];
    keys.extend(auth(sink));
    keys.extend([
        r#"encoding.codec = "json""#.to_string(),
        "healthcheck.enabled = false".to_string(),
        kv("endpoint", sink.spec.url()),
    ]);

    let mut config = SinkConfig::default();
    config.elements.push(Box::new(group));
    config.elements.push(Box::new(
        sink.element("aws_cloudwatch_logs", keys)
            .with_inputs(vec![group_id]),
    ));
    if let Some(tls) = tls::for_url(sink, false) {
        config.elements.push(Box::new(tls));
    }
    Ok(config)
}

/// A credentials file, a role to assume, or static access keys. Roles are
/// assumed with the web identity token the collector pod is given.
fn auth(sink: &Sink<'_>) -> Vec<String> {
    let Some(secret) = sink.secret.as_ref() else {
        return Vec::new();
    };
    if let Some(name) = sink.secret_name() {
        if secret.has_non_empty(AWS_CREDENTIALS) {
            return vec![kv(
                "auth.credentials_file",
                Some(secret_path(name, AWS_CREDENTIALS)),
            )];
        }
    }
    if let Some(arn) = secret.aws_role_arn() {
        return vec![kv("auth.assume_role", Some(arn))];
    }
    [
        ("auth.access_key_id", AWS_ACCESS_KEY_ID),
        ("auth.secret_access_key", AWS_SECRET_ACCESS_KEY),
    ]
    .into_iter()
    .map(|(k, key)| kv(k, sink.secret_ref(key)))
    .collect()
}

/// Computes each record's group and stream. Application groups are named by
/// the `groupBy` field; infrastructure and audit groups are fixed.
fn group_vrl(prefix: &str, group_by: &str) -> String {
    let field = match group_by {
        "namespaceName" => ".kubernetes.namespace_name",
        "namespaceUUID" => ".kubernetes.namespace_id",
        _ => ".log_type",
    };
    let app = quote(&format!("{prefix}."));
    let audit = quote(&format!("{prefix}.audit"));
    let infra = quote(&format!("{prefix}.infrastructure"));
    format!(
        r#".group_name = "default"
.stream_name = "default"
if (.kubernetes.pod_name != null) {{
  .stream_name = (.kubernetes.namespace_name + "_" + .kubernetes.pod_name + "_" + .kubernetes.container_name) ?? .stream_name
}}
if (.log_type == "application") {{
  .group_name = ({app} + {field}) ?? "application"
}}
if (.log_type == "audit") {{
  .group_name = {audit}
  .stream_name = ("${{VECTOR_SELF_NODE_NAME}}" + .tag) ?? .stream_name
}}
if (.log_type == "infrastructure") {{
  .group_name = {infra}
  .stream_name = (.hostname + "." + .stream_name) ?? .stream_name
}}
if (.tag == ".journal.system") {{
  .stream_name = (.hostname + .tag) ?? .stream_name
}}
del(.tag)
del(.source_type)"#
    )
}
