//! Output labels: filters that shape records for the destination, then the
//! store that ships them.

use super::{buffer_spec, ingress, label_name, store_id, Directive, DATA_DIR};
use crate::{secret_path, sinks, Context, GenerateError};
use logging_forwarder_core::{
    secret::{
        AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, BEARER_TOKEN, CA_BUNDLE, PASSPHRASE, PASSWORD,
        SHARED_KEY, SPLUNK_HEC_TOKEN, TLS_CERT, TLS_KEY, USERNAME,
    },
    Secret, Tenant, TlsProfile,
};
use logging_forwarder_k8s_api::{
    logging::FluentdBufferSpec, names, output::ElasticsearchStructuredSpec, url, OutputSpec,
    OutputType,
};

const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const NODE_NAME: &str = r##""#{ENV['NODE_NAME']}""##;

const LOKI_LABEL_KEYS: [&str; 4] = [
    "log_type",
    "kubernetes.namespace_name",
    "kubernetes.pod_name",
    "kubernetes.container_name",
];

const LOG_SOURCE: &str = r##"${source = ['namespace_name', 'container_name', 'pod_name'].map { |k| [k, record.dig('kubernetes', k)] }.reject { |_, v| v.nil? }.map { |k, v| "#{k}=#{v}" }.join(', '); source.empty? ? record['message'] : source + ', message=' + record['message'].to_s}"##;

/// An output being generated, with its secret and resolved TLS profile.
struct Store<'a> {
    cx: &'a Context<'a>,
    spec: &'a OutputSpec,
    id: String,
    secret: Option<Secret>,
    tls: TlsProfile,
}

/// The label of `output`.
pub(super) fn label(
    cx: &Context<'_>,
    output: &OutputSpec,
    cluster_tls: &TlsProfile,
) -> Result<Directive, GenerateError> {
    let unsupported = || GenerateError::UnsupportedOutput {
        output: output.name.clone(),
        type_: output.type_.clone(),
    };
    let type_ = output.output_type().ok_or_else(unsupported)?;
    let store = Store {
        cx,
        spec: output,
        id: store_id(&output.name),
        secret: sinks::fetch_secret(cx, output)?,
        tls: output.tls_profile().unwrap_or_else(|| cluster_tls.clone()),
    };
    let children = match type_ {
        OutputType::Elasticsearch => elasticsearch(&store),
        OutputType::FluentdForward => vec![forward(&store)],
        OutputType::Syslog => syslog(&store),
        OutputType::Kafka => vec![kafka(&store)],
        OutputType::Cloudwatch => cloudwatch(&store)?,
        OutputType::Loki => loki(&store),
        OutputType::Http => vec![http(&store)],
        OutputType::Splunk => vec![splunk(&store)],
        OutputType::AzureMonitor | OutputType::GoogleCloudLogging => return Err(unsupported()),
    };
    tracing::debug!(output = %output.name, %type_, id = %store.id, "Generated fluentd store");
    Ok(Directive::with_arg("label", label_name(&output.name)).children(children))
}

/// The buffer every store writes through. `ClusterLogging` tuning overrides
/// the defaults.
fn buffer(store: &Store<'_>, chunk_keys: Option<&str>, flush_interval: &str) -> Directive {
    let spec = buffer_spec(store.cx);
    let tuned = |get: fn(&FluentdBufferSpec) -> &Option<String>| {
        spec.and_then(|s| get(s).as_deref()).filter(|v| !v.is_empty())
    };
    let directive = match chunk_keys {
        Some(keys) => Directive::with_arg("buffer", keys),
        None => Directive::new("buffer"),
    };
    directive
        .param("@type", "file")
        .param("path", format!("'{DATA_DIR}/{}'", store.id))
        .param("flush_mode", tuned(|s| &s.flush_mode).unwrap_or("interval"))
        .param("flush_interval", tuned(|s| &s.flush_interval).unwrap_or(flush_interval))
        .param("flush_thread_count", 2)
        .param("retry_type", tuned(|s| &s.retry_type).unwrap_or("exponential_backoff"))
        .param("retry_wait", "1s")
        .param("retry_max_interval", "60s")
        .param("retry_timeout", "60m")
        .param(
            "queued_chunks_limit_size",
            r##""#{ENV['BUFFER_QUEUE_LIMIT'] || '32'}""##,
        )
        .param(
            "total_limit_size",
            tuned(|s| &s.total_limit_size)
                .unwrap_or(r##""#{ENV['TOTAL_LIMIT_SIZE_PER_BUFFER'] || '8589934592'}""##),
        )
        .param(
            "chunk_limit_size",
            tuned(|s| &s.chunk_limit_size)
                .unwrap_or(r##""#{ENV['BUFFER_SIZE_LIMIT'] || '8m'}""##),
        )
        .param("overflow_action", tuned(|s| &s.overflow_action).unwrap_or("block"))
        .param("disable_chunk_backup", true)
}

fn elasticsearch(store: &Store<'_>) -> Vec<Directive> {
    let structured = store
        .spec
        .type_spec
        .elasticsearch
        .as_ref()
        .map(|es| &es.structured)
        .filter(|s| s.structured_type_key.is_some() || s.structured_type_name.is_some())
        .or_else(|| store.cx.spec.default_es_structured());

    let index = |tags: &str, index: &str| {
        Directive::new("elasticsearch_index_name")
            .param("enabled", "'true'")
            .param("tag", format!("\"{tags}\""))
            .param("name_type", "static")
            .param("static_index_name", index)
    };
    // Application records are matched last, by whatever tag remains.
    let app_index = match structured {
        Some(s) => structured_index(s),
        None => index("**", "app-write"),
    };
    let mut children = vec![Directive::typed("filter", Some("**"), "viaq_data_model")
        .param("enable_openshift_model", false)
        .param("enable_prune_empty_fields", false)
        .param("rename_time", false)
        .param("undefined_dot_replace_char", "UNUSED")
        .param("elasticsearch_index_prefix_field", "'viaq_index_name'")
        .child(index(ingress::tags(Tenant::Infrastructure), "infra-write"))
        .child(index(ingress::tags(Tenant::Audit), "audit-write"))
        .child(app_index)];
    if structured.is_none() {
        children.push(
            Directive::typed("filter", Some("**"), "viaq_data_model")
                .param("remove_keys", "structured"),
        );
    }

    // Failed records are re-emitted under the retry tag and shipped by the
    // first store.
    let retry = format!("retry_{}", store.id);
    children.push(elasticsearch_store(store, &retry, &retry, None));
    children.push(elasticsearch_store(store, "**", &store.id, Some(&retry)));
    children
}

/// Application records are indexed by their structured type when they
/// carry one.
fn structured_index(structured: &ElasticsearchStructuredSpec) -> Directive {
    Directive::new("elasticsearch_index_name")
        .param("enabled", "'true'")
        .param("tag", "\"**\"")
        .param("name_type", "structured")
        .param("static_index_name", "app-write")
        .param_opt("structured_type_key", structured.structured_type_key.as_deref())
        .param_opt("structured_type_name", structured.structured_type_name.as_deref())
}

fn elasticsearch_store(
    store: &Store<'_>,
    tags: &str,
    id: &str,
    retry_tag: Option<&str>,
) -> Directive {
    let endpoint = url::parse_absolute(store.spec.url().unwrap_or(names::LOG_STORE_URL)).ok();
    let version = store.spec.elasticsearch_version();
    Directive::typed("match", Some(tags), "elasticsearch")
        .param("@id", id)
        .param_opt("host", endpoint.as_ref().and_then(|u| u.host().map(String::from)))
        .param_opt("port", endpoint.as_ref().and_then(|u| u.port_u16()))
        .param("verify_es_version_at_startup", false)
        .param_opt(
            "scheme",
            endpoint.as_ref().and_then(|u| u.scheme_str().map(String::from)),
        )
        .param_opt("ssl_version", ssl_version(&store.tls))
        .param_opt("ssl_verify", store.spec.insecure_skip_verify().then_some(false))
        .param_opt("user", store.value(USERNAME))
        .param_opt("password", store.value(PASSWORD))
        .param_opt("client_key", store.file(TLS_KEY))
        .param_opt("client_cert", store.file(TLS_CERT))
        .param_opt("ca_file", store.file(CA_BUNDLE))
        .param("target_index_key", "viaq_index_name")
        .param("id_key", "viaq_msg_id")
        .param("remove_keys", "viaq_index_name")
        .param_opt(
            "type_name",
            (version < names::FIRST_ES_VERSION_WITHOUT_TYPE).then_some("_doc"),
        )
        .param_opt(
            "suppress_type_name",
            (version >= names::FIRST_ES_VERSION_WITHOUT_TYPE).then_some("'true'"),
        )
        .param("http_backend", "typhoeus")
        .param("write_operation", "create")
        .param("reload_connections", "'true'")
        .param("reload_after", "'200'")
        .param(
            "sniffer_class_name",
            "'Fluent::Plugin::ElasticsearchSimpleSniffer'",
        )
        .param("reload_on_failure", false)
        .param("request_timeout", 2147483648u64)
        .param_opt("retry_tag", retry_tag)
        .child(buffer(store, None, "1s"))
}

fn forward(store: &Store<'_>) -> Directive {
    let endpoint = store.endpoint();
    let secure = url::is_secure(store.spec.url());
    let mut security = Directive::new("security").param("self_hostname", NODE_NAME);
    if let Some(key) = store.value(SHARED_KEY) {
        security = security.param("shared_key", key);
    }
    let server = Directive::new("server")
        .param_opt("host", endpoint.as_ref().map(|(h, _)| h.clone()))
        .param_opt("port", endpoint.as_ref().and_then(|(_, p)| *p));
    Directive::typed("match", Some("**"), "forward")
        .param("@id", &store.id)
        .param("heartbeat_type", "none")
        .param("keepalive", true)
        .param_opt("transport", secure.then_some("tls"))
        .param_opt(
            "tls_verify_hostname",
            secure.then_some(!store.spec.insecure_skip_verify()),
        )
        .param_opt(
            "tls_insecure_mode",
            store.spec.insecure_skip_verify().then_some(true),
        )
        .param_opt(
            "tls_version",
            ssl_version(&store.tls)
                .filter(|_| secure)
                .map(|v| format!("'{v}'")),
        )
        .param_opt("tls_client_private_key_path", store.file(TLS_KEY))
        .param_opt("tls_client_private_key_passphrase", store.value(PASSPHRASE))
        .param_opt("tls_client_cert_path", store.file(TLS_CERT))
        .param_opt("tls_cert_path", store.file(CA_BUNDLE))
        .child(security)
        .child(buffer(store, None, "5s"))
        .child(server)
}

fn syslog(store: &Store<'_>) -> Vec<Directive> {
    let syslog = store.spec.type_spec.syslog.clone().unwrap_or_default();
    let endpoint = store.endpoint();
    let scheme = store
        .spec
        .url()
        .and_then(url::scheme)
        .unwrap_or_else(|| "tcp".to_string());
    let protocol = if scheme.starts_with("udp") { "udp" } else { "tcp" };
    let secure = url::is_tls_scheme(&scheme);

    let mut children = vec![Directive::typed("filter", Some("**"), "parse_json_field")
        .param("json_fields", "message")
        .param("merge_json_log", false)
        .param("replace_json_log", true)];
    if syslog.add_log_source {
        children.push(
            Directive::typed("filter", Some("**"), "record_modifier")
                .record([("message", LOG_SOURCE)]),
        );
    }

    let rfc = syslog
        .rfc
        .as_deref()
        .unwrap_or("RFC5424")
        .to_ascii_lowercase();
    let payload_key = syslog.payload_key.as_deref().unwrap_or("message");
    children.push(
        Directive::typed("match", Some("**"), "remote_syslog")
            .param("@id", &store.id)
            .param_opt("host", endpoint.as_ref().map(|(h, _)| h.clone()))
            .param_opt("port", endpoint.as_ref().and_then(|(_, p)| *p))
            .param("rfc", rfc)
            .param("facility", syslog.facility.as_deref().unwrap_or("user"))
            .param("severity", syslog.severity.as_deref().unwrap_or("informational"))
            .param_opt("appname", syslog.app_name.as_deref())
            .param_opt("msgid", syslog.msg_id.as_deref())
            .param_opt("procid", syslog.proc_id.as_deref())
            .param_opt("program", syslog.tag.as_deref())
            .param("protocol", protocol)
            .param("packet_size", 4096)
            .param("hostname", NODE_NAME)
            .param_opt("tls", secure.then_some(true))
            .param_opt("ca_file", store.file(CA_BUNDLE).filter(|_| secure))
            .param_opt(
                "verify_mode",
                secure.then_some(if store.spec.insecure_skip_verify() { 0 } else { 1 }),
            )
            .param("timeout", 60)
            .param("timeout_exception", true)
            .param("keep_alive", true)
            .param("keep_alive_idle", 75)
            .param("keep_alive_cnt", 9)
            .param("keep_alive_intvl", 7200)
            .child(
                Directive::typed("format", None, "single_value")
                    .param("message_key", payload_key),
            )
            .child(buffer(store, None, "1s")),
    );
    children
}

fn kafka(store: &Store<'_>) -> Directive {
    let kafka = store.spec.type_spec.kafka.as_ref();
    let endpoint = store.spec.url().and_then(|u| url::parse_absolute(u).ok());
    let mut brokers = kafka.map(|k| k.brokers.clone()).unwrap_or_default();
    if brokers.is_empty() {
        if let Some(authority) = endpoint.as_ref().and_then(|u| u.authority()) {
            brokers.push(authority.to_string());
        }
    }
    let brokers = brokers
        .iter()
        .map(|b| b.split_once("://").map_or(b.as_str(), |(_, b)| b))
        .collect::<Vec<_>>()
        .join(",");
    let topic = kafka
        .and_then(|k| k.topic.clone())
        .or_else(|| {
            endpoint
                .as_ref()
                .map(|u| u.path().trim_matches('/').to_string())
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "topic".to_string());
    let sasl = store.has(USERNAME) && store.has(PASSWORD);
    Directive::typed("match", Some("**"), "kafka2")
        .param("@id", &store.id)
        .param("brokers", brokers)
        .param("default_topic", topic)
        .param("use_event_time", true)
        .param_opt("username", store.value(USERNAME))
        .param_opt("password", store.value(PASSWORD))
        .param_opt("sasl_over_ssl", sasl.then_some(url::is_secure(store.spec.url())))
        .param_opt("ssl_ca_cert", store.file(CA_BUNDLE))
        .param_opt("ssl_client_cert", store.file(TLS_CERT))
        .param_opt("ssl_client_cert_key", store.file(TLS_KEY))
        .param_opt(
            "ssl_verify_hostname",
            store.spec.insecure_skip_verify().then_some(false),
        )
        .child(Directive::typed("format", None, "json"))
        .child(buffer(store, Some("_topic"), "1s"))
}

/// Group and stream names are computed per tenant before records are
/// shipped.
fn cloudwatch(store: &Store<'_>) -> Result<Vec<Directive>, GenerateError> {
    let cloudwatch = store.spec.type_spec.cloudwatch.as_ref();
    let prefix = match cloudwatch
        .and_then(|c| c.group_prefix.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        Some(prefix) => prefix.to_string(),
        None => store.cx.resources.cluster_infrastructure_name()?,
    };
    let app_group = match cloudwatch.map(|c| c.group_by.as_str()) {
        Some("namespaceName") => {
            format!("{prefix}.${{record['kubernetes']['namespace_name']}}")
        }
        Some("namespaceUUID") => format!("{prefix}.${{record['kubernetes']['namespace_id']}}"),
        _ => format!("{prefix}.application"),
    };
    let groups = [
        (Tenant::Application, app_group, "${tag}"),
        (
            Tenant::Infrastructure,
            format!("{prefix}.infrastructure"),
            "${record['hostname']}.${tag}",
        ),
        (
            Tenant::Audit,
            format!("{prefix}.audit"),
            "${record['hostname']}.${tag}",
        ),
    ];
    let mut children = groups
        .into_iter()
        .map(|(tenant, group, stream)| {
            Directive::typed("filter", Some(ingress::tags(tenant)), "record_modifier")
                .record([("cw_group_name", group.as_str()), ("cw_stream_name", stream)])
        })
        .collect::<Vec<_>>();

    let mut cloudwatch_logs = Directive::typed("match", Some("**"), "cloudwatch_logs")
        .param("@id", &store.id)
        .param("auto_create_stream", true)
        .param_opt("region", cloudwatch.map(|c| c.region.as_str()))
        .param("log_group_name_key", "cw_group_name")
        .param("log_stream_name_key", "cw_stream_name")
        .param("remove_log_stream_name_key", true)
        .param("remove_log_group_name_key", true)
        .param("concurrency", 2)
        .param("include_time_key", true)
        .param("log_rejected_request", true)
        .param_opt("endpoint", store.spec.url())
        .param_opt(
            "ssl_verify_peer",
            store.spec.insecure_skip_verify().then_some(false),
        );
    match store.secret.as_ref().and_then(Secret::aws_role_arn) {
        Some(arn) => {
            cloudwatch_logs = cloudwatch_logs.child(
                Directive::new("web_identity_credentials")
                    .param("role_arn", format!("\"{arn}\""))
                    .param(
                        "web_identity_token_file",
                        format!("\"{SERVICE_ACCOUNT_TOKEN}\""),
                    )
                    .param("role_session_name", "\"cluster-logging\""),
            );
        }
        None => {
            cloudwatch_logs = cloudwatch_logs
                .param_opt("aws_key_id", store.value(AWS_ACCESS_KEY_ID))
                .param_opt("aws_sec_key", store.value(AWS_SECRET_ACCESS_KEY));
        }
    }
    children.push(cloudwatch_logs.child(buffer(store, None, "1s")));
    Ok(children)
}

/// Labels are copied to top-level fields so the store can refer to them.
fn loki(store: &Store<'_>) -> Vec<Directive> {
    let loki = store.spec.type_spec.loki.as_ref();
    let mut keys = loki
        .map(|l| l.label_keys.clone())
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| LOKI_LABEL_KEYS.iter().map(|k| k.to_string()).collect());
    keys.sort();
    keys.dedup();
    let field = |key: &str| format!("_{}", key.replace('.', "_"));

    let mut record = keys
        .iter()
        .map(|key| {
            let path = key
                .split('.')
                .map(|p| format!("{p:?}"))
                .collect::<Vec<_>>()
                .join(",");
            (field(key), format!("${{record.dig({path})}}"))
        })
        .collect::<Vec<_>>();
    record.push(("_kubernetes_host".to_string(), NODE_NAME.to_string()));
    let tenant = loki
        .and_then(|l| l.tenant_key.as_deref())
        .filter(|k| !k.is_empty());
    if let Some(key) = tenant {
        let path = key
            .split('.')
            .map(|p| format!("{p:?}"))
            .collect::<Vec<_>>()
            .join(",");
        record.push(("_tenant".to_string(), format!("${{record.dig({path})}}")));
    }

    let labels = keys
        .iter()
        .map(|key| (key.replace('.', "_"), field(key)))
        .chain([("kubernetes_host".to_string(), "_kubernetes_host".to_string())])
        .fold(Directive::new("label"), |label, (name, field)| {
            label.param(&name, field)
        });

    let managed = sinks::is_managed(store.spec);
    let mut loki = Directive::typed("match", Some("**"), "loki")
        .param("@id", &store.id)
        .param("line_format", "json")
        .param_opt("url", store.spec.url())
        .param_opt("tenant", tenant.map(|_| "${_tenant}"))
        .param_opt("min_version", ingress::tls_version(&store.tls.min_version))
        .param_opt(
            "insecure_tls",
            store.spec.insecure_skip_verify().then_some(true),
        )
        .param_opt("ca_cert", store.file(CA_BUNDLE))
        .param_opt("cert", store.file(TLS_CERT))
        .param_opt("key", store.file(TLS_KEY));
    loki = if managed {
        loki.param("bearer_token_file", SERVICE_ACCOUNT_TOKEN)
    } else if store.has(BEARER_TOKEN) {
        loki.param_opt("bearer_token_file", store.file(BEARER_TOKEN))
    } else {
        loki.param_opt("username", store.value(USERNAME))
            .param_opt("password", store.value(PASSWORD))
    };
    vec![
        Directive::typed("filter", Some("**"), "record_modifier").record(record),
        loki.child(labels)
            .child(buffer(store, tenant.map(|_| "_tenant"), "1s")),
    ]
}

fn http(store: &Store<'_>) -> Directive {
    let spec = store.spec.type_spec.http.clone().unwrap_or_default();
    let (content_type, headers): (Vec<_>, Vec<_>) = spec
        .headers
        .iter()
        .partition(|(k, _)| k.eq_ignore_ascii_case("content-type"));
    let content_type = content_type
        .first()
        .map(|(_, v)| v.as_str())
        .unwrap_or("application/x-ndjson");
    let headers = headers
        .into_iter()
        .collect::<std::collections::BTreeMap<_, _>>();
    let headers = (!headers.is_empty())
        .then(|| serde_json::to_string(&headers).ok())
        .flatten();
    let auth = (store.has(USERNAME) && store.has(PASSWORD)).then(|| {
        Directive::new("auth")
            .param("method", "basic")
            .param_opt("username", store.value(USERNAME))
            .param_opt("password", store.value(PASSWORD))
    });
    let method = spec.method.as_deref().unwrap_or("POST").to_ascii_lowercase();
    let mut http = Directive::typed("match", Some("**"), "http")
        .param("@id", &store.id)
        .param_opt("endpoint", store.spec.url())
        .param("http_method", method)
        .param("content_type", content_type)
        .param_opt("headers", headers)
        .param_opt("read_timeout", spec.timeout)
        .param_opt("tls_ca_cert_path", store.file(CA_BUNDLE))
        .param_opt("tls_client_cert_path", store.file(TLS_CERT))
        .param_opt("tls_private_key_path", store.file(TLS_KEY))
        .param_opt("tls_version", ssl_version(&store.tls).map(|v| format!(":{v}")))
        .param_opt(
            "tls_verify_mode",
            store.spec.insecure_skip_verify().then_some("none"),
        )
        .child(Directive::typed("format", None, "json"))
        .child(buffer(store, None, "1s"));
    if let Some(auth) = auth {
        http = http.child(auth);
    }
    http
}

fn splunk(store: &Store<'_>) -> Directive {
    let splunk = store.spec.type_spec.splunk.as_ref();
    let endpoint = store.spec.url().and_then(|u| url::parse_absolute(u).ok());
    Directive::typed("match", Some("**"), "splunk_hec")
        .param("@id", &store.id)
        .param_opt(
            "protocol",
            endpoint.as_ref().and_then(|u| u.scheme_str().map(String::from)),
        )
        .param_opt(
            "hec_host",
            endpoint.as_ref().and_then(|u| u.host().map(String::from)),
        )
        .param_opt("hec_port", endpoint.as_ref().and_then(|u| u.port_u16()))
        .param_opt("hec_token", store.value(SPLUNK_HEC_TOKEN))
        .param_opt("index", splunk.and_then(|s| s.index_name.as_deref()))
        .param_opt("index_key", splunk.and_then(|s| s.index_key.as_deref()))
        .param_opt("ca_file", store.file(CA_BUNDLE))
        .param_opt("client_cert", store.file(TLS_CERT))
        .param_opt("client_key", store.file(TLS_KEY))
        .param_opt(
            "insecure_ssl",
            store.spec.insecure_skip_verify().then_some(true),
        )
        .child(Directive::typed("format", None, "json"))
        .child(buffer(store, None, "1s"))
}

/// Ruby's name for a minimum TLS version, e.g. `TLSv1_2`.
fn ssl_version(tls: &TlsProfile) -> Option<String> {
    ingress::tls_version(&tls.min_version).map(|v| v.replacen("TLS", "TLSv", 1))
}

// === impl Store ===

impl Store<'_> {
    fn has(&self, key: &str) -> bool {
        self.secret
            .as_ref()
            .map(|s| s.has_non_empty(key))
            .unwrap_or(false)
    }

    /// The quoted path of a mounted secret file.
    fn file(&self, key: &str) -> Option<String> {
        let name = self.spec.secret_name()?;
        self.has(key).then(|| format!("'{}'", secret_path(name, key)))
    }

    /// An expression the collector evaluates at startup to the value of a
    /// mounted secret file.
    fn value(&self, key: &str) -> Option<String> {
        let name = self.spec.secret_name()?;
        let path = secret_path(name, key);
        self.has(key).then(|| {
            format!(
                "\"#{{File.exist?('{path}') ? open('{path}','r') do |f|f.read.chomp end : ''}}\""
            )
        })
    }

    /// Host and port of the output URL.
    fn endpoint(&self) -> Option<(String, Option<u16>)> {
        let uri = url::parse_absolute(self.spec.url()?).ok()?;
        Some((uri.host()?.to_string(), uri.port_u16()))
    }
}
