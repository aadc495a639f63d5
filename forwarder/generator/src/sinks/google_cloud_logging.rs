use super::{tls, Sink, SinkConfig};
use crate::{framework::funcs::kv, secret_path};
use logging_forwarder_core::secret::GOOGLE_CREDENTIALS;

const DEFAULT_LOG_ID: &str = "{{ log_type }}";

pub(super) fn new(sink: &Sink<'_>) -> SinkConfig {
    let gcl = sink.spec.type_spec.google_cloud_logging.clone().unwrap_or_default();
    let non_empty = |v: Option<String>| v.filter(|v| !v.is_empty());

    let keys = vec![
        kv("billing_account_id", non_empty(gcl.billing_account_id)),
        kv("organization_id", non_empty(gcl.organization_id)),
        kv("folder_id", non_empty(gcl.folder_id)),
        kv("project_id", non_empty(gcl.project_id)),
        kv(
            "credentials_path",
            sink.has(GOOGLE_CREDENTIALS)
                .then(|| sink.secret_name().map(|s| secret_path(s, GOOGLE_CREDENTIALS)))
                .flatten(),
        ),
        kv(
            "log_id",
            Some(non_empty(gcl.log_id).unwrap_or_else(|| DEFAULT_LOG_ID.to_string())),
        ),
        r#"severity_key = "level""#.to_string(),
    ];
    let element = sink.element("gcp_stackdriver_logs", keys).with_table(
        "resource",
        vec![
            r#"type = "k8s_node""#.to_string(),
            r#"node_name = "{{hostname}}""#.to_string(),
        ],
    );

    let mut config = SinkConfig::default();
    config.elements.push(Box::new(element));
    if let Some(tls) = tls::for_url(sink, false) {
        config.elements.push(Box::new(tls));
    }
    config
}
