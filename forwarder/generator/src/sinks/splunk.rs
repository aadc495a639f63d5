use super::{tls, Sink, SinkConfig};
use crate::framework::funcs::kv;
use logging_forwarder_core::secret::SPLUNK_HEC_TOKEN;

pub(super) fn new(sink: &Sink<'_>) -> SinkConfig {
    let keys = vec![
        kv("endpoint", sink.spec.url()),
        kv("default_token", sink.secret_ref(SPLUNK_HEC_TOKEN)),
        kv("index", index(sink)),
        r#"encoding.codec = "json""#.to_string(),
        r#"timestamp_key = "@timestamp""#.to_string(),
    ];
    let mut config = SinkConfig::default();
    config.elements.push(Box::new(sink.element("splunk_hec_logs", keys)));
    if let Some(tls) = tls::for_url(sink, false) {
        config.elements.push(Box::new(tls));
    }
    config
}

/// A template naming the record field that holds the index, or a fixed
/// index name.
fn index(sink: &Sink<'_>) -> Option<String> {
    let splunk = sink.spec.type_spec.splunk.as_ref()?;
    if let Some(key) = splunk.index_key.as_deref().filter(|k| !k.is_empty()) {
        return Some(format!("{{{{ {} }}}}", key.trim_start_matches('.')));
    }
    splunk.index_name.clone().filter(|n| !n.is_empty())
}
