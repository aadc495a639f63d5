use super::{auth, tls, Sink, SinkConfig};
use crate::framework::funcs::kv;

const DEFAULT_METHOD: &str = "post";
const DEFAULT_TIMEOUT_SECS: u32 = 10;

pub(super) fn new(sink: &Sink<'_>) -> SinkConfig {
    let http = sink.spec.type_spec.http.clone().unwrap_or_default();
    let method = http
        .method
        .filter(|m| !m.is_empty())
        .map(|m| m.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_METHOD.to_string());

    let mut keys = vec![
        kv("uri", sink.spec.url()),
        kv("method", Some(method)),
        r#"encoding.codec = "json""#.to_string(),
        r#"framing.method = "newline_delimited""#.to_string(),
    ];
    keys.extend(auth::basic_or_bearer(sink));

    let mut config = SinkConfig::default();
    config.elements.push(Box::new(sink.element("http", keys)));
    if let Some(tls) = tls::for_url(sink, false) {
        config.elements.push(Box::new(tls));
    }

    let mut request = toml::Table::new();
    let timeout = http.timeout.filter(|t| *t > 0).unwrap_or(DEFAULT_TIMEOUT_SECS);
    request.insert("timeout_secs".to_string(), toml::Value::Integer(timeout.into()));
    if !http.headers.is_empty() {
        let headers = http
            .headers
            .into_iter()
            .map(|(k, v)| (k, toml::Value::String(v)))
            .collect();
        request.insert("headers".to_string(), toml::Value::Table(headers));
    }
    config
        .defaults
        .insert("request".to_string(), toml::Value::Table(request));
    config
}
