use super::{tls, Sink, SinkConfig};
use crate::framework::funcs::kv;
use logging_forwarder_core::secret::{PASSWORD, USERNAME};
use logging_forwarder_k8s_api::url;

const DEFAULT_TOPIC: &str = "topic";

pub(super) fn new(sink: &Sink<'_>) -> SinkConfig {
    let brokers = brokers(sink);
    let mut keys = vec![
        kv("bootstrap_servers", Some(hosts(&brokers))),
        kv("topic", Some(topic(sink))),
        "healthcheck.enabled = false".to_string(),
        r#"encoding.codec = "json""#.to_string(),
        r#"encoding.timestamp_format = "rfc3339""#.to_string(),
    ];
    if let (Some(user), Some(password)) = (sink.secret_ref(USERNAME), sink.secret_ref(PASSWORD)) {
        keys.extend([
            "sasl.enabled = true".to_string(),
            r#"sasl.mechanism = "PLAIN""#.to_string(),
            kv("sasl.username", Some(user)),
            kv("sasl.password", Some(password)),
        ]);
    }

    let mut config = SinkConfig::default();
    config.elements.push(Box::new(sink.element("kafka", keys)));
    let secure = brokers.iter().all(|b| url::is_secure(Some(b)));
    if let Some(tls) = tls::new(sink, secure, true) {
        config.elements.push(Box::new(tls));
    }
    config
}

/// Broker URLs: the output URL followed by any additional brokers.
fn brokers<'a>(sink: &Sink<'a>) -> Vec<&'a str> {
    let extra = sink
        .spec
        .type_spec
        .kafka
        .as_ref()
        .map(|k| k.brokers.as_slice())
        .unwrap_or_default();
    sink.spec
        .url()
        .into_iter()
        .chain(extra.iter().map(String::as_str))
        .collect()
}

/// The `host:port` of each broker, comma separated.
fn hosts(brokers: &[&str]) -> String {
    brokers
        .iter()
        .filter_map(|b| {
            let uri = url::parse_absolute(b).ok()?;
            uri.authority().map(|a| a.to_string())
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// The configured topic, else the URL path, else a fixed default.
fn topic(sink: &Sink<'_>) -> String {
    if let Some(topic) = sink
        .spec
        .type_spec
        .kafka
        .as_ref()
        .and_then(|k| k.topic.as_deref())
        .filter(|t| !t.is_empty())
    {
        return topic.to_string();
    }
    sink.spec
        .url()
        .and_then(|u| url::parse_absolute(u).ok())
        .map(|u| u.path().trim_start_matches('/').to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TOPIC.to_string())
}
