use super::{tls, Sink, SinkConfig};
use crate::framework::funcs::kv;
use logging_forwarder_core::secret::SHARED_KEY;

pub(super) fn new(sink: &Sink<'_>) -> SinkConfig {
    let azure = sink.spec.type_spec.azure_monitor.clone().unwrap_or_default();
    let keys = vec![
        kv("customer_id", Some(azure.customer_id)),
        kv("log_type", Some(azure.log_type)),
        kv(
            "azure_resource_id",
            azure.azure_resource_id.filter(|r| !r.is_empty()),
        ),
        kv("host", azure.host.filter(|h| !h.is_empty())),
        kv("shared_key", sink.secret_ref(SHARED_KEY)),
    ];
    let mut config = SinkConfig::default();
    config
        .elements
        .push(Box::new(sink.element("azure_monitor_logs", keys)));
    if let Some(tls) = tls::for_url(sink, false) {
        config.elements.push(Box::new(tls));
    }
    config
}
