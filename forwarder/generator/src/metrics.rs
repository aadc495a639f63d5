//! The collector's own metrics, exported for scraping.

use crate::{
    elements::Remap,
    framework::{
        funcs::{compose_one, kv, lines},
        Element,
    },
};
use logging_forwarder_core::TlsProfile;

const SOURCE_ID: &str = "internal_metrics";
const NODENAME_ID: &str = "add_nodename_to_metric";
const EXPORTER_ID: &str = "prometheus_output";

pub(crate) const EXPORTER_ADDRESS: &str = "0.0.0.0:24231";
pub(crate) const CERT_FILE: &str = "/etc/collector/metrics/tls.crt";
pub(crate) const KEY_FILE: &str = "/etc/collector/metrics/tls.key";

/// Internal metrics tagged with the node name, served over TLS.
pub(crate) struct Metrics {
    tls: TlsProfile,
}

impl Metrics {
    pub fn new(tls: TlsProfile) -> Self {
        Self { tls }
    }
}

impl Element for Metrics {
    fn name(&self) -> &str {
        EXPORTER_ID
    }

    fn template(&self) -> String {
        let source = format!(
            "[sources.{SOURCE_ID}]\ntype = \"internal_metrics\"\nscrape_interval_secs = 2"
        );
        let nodename = Remap::new(
            NODENAME_ID,
            vec![SOURCE_ID.to_string()],
            r#".tags.hostname = get_env_var!("VECTOR_SELF_NODE_NAME")"#,
        );
        let exporter = lines([
            format!("[sinks.{EXPORTER_ID}]"),
            "type = \"prometheus_exporter\"".to_string(),
            format!("inputs = [{NODENAME_ID:?}]"),
            kv("address", Some(EXPORTER_ADDRESS)),
            "default_namespace = \"collector\"".to_string(),
        ]);
        let tls = lines([
            format!("[sinks.{EXPORTER_ID}.tls]"),
            "enabled = true".to_string(),
            kv("key_file", Some(KEY_FILE)),
            kv("crt_file", Some(CERT_FILE)),
            kv(
                "min_tls_version",
                Some(self.tls.min_version.as_str()).filter(|v| !v.is_empty()),
            ),
            kv(
                "ciphersuites",
                Some(self.tls.ciphers_joined(",")).filter(|c| !c.is_empty()),
            ),
        ]);
        [source, compose_one(&nodename), exporter, tls].join("\n\n")
    }
}
