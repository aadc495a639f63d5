use super::{is_managed, Sink};
use crate::{
    framework::funcs::{kv, lines},
    framework::Element,
    secret_path,
};
use logging_forwarder_core::secret::{CA_BUNDLE, PASSPHRASE, TLS_CERT, TLS_KEY};
use logging_forwarder_k8s_api::url;

const SERVICE_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/service-ca.crt";

/// `[sinks.<id>.tls]`.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct SinkTls {
    id: String,
    enabled: bool,
    min_version: Option<String>,
    ciphers: Option<String>,
    insecure: bool,
    key_file: Option<String>,
    crt_file: Option<String>,
    ca_file: Option<String>,
    key_pass: Option<String>,
}

/// The TLS settings of `sink`, or `None` when its transport is plaintext or
/// nothing needs to be set. Socket-style sinks must also be told to enable
/// TLS.
pub(crate) fn new(sink: &Sink<'_>, secure: bool, needs_enabled: bool) -> Option<SinkTls> {
    if !secure {
        return None;
    }
    let managed = is_managed(sink.spec);
    let file = |key: &str| sink.secret_name().map(|s| secret_path(s, key));

    let mut tls = SinkTls {
        id: sink.id.clone(),
        enabled: needs_enabled,
        insecure: sink.spec.insecure_skip_verify(),
        ..Default::default()
    };
    if managed || (sink.has(TLS_CERT) && sink.has(TLS_KEY)) {
        tls.crt_file = file(TLS_CERT);
        tls.key_file = file(TLS_KEY);
    }
    if managed || sink.has(CA_BUNDLE) {
        tls.ca_file = file(CA_BUNDLE);
    }
    tls.key_pass = sink.secret_ref(PASSPHRASE);
    if !sink.tls.min_version.is_empty() {
        tls.min_version = Some(sink.tls.min_version.clone());
    }
    if !sink.tls.ciphers.is_empty() {
        tls.ciphers = Some(sink.tls.ciphers_joined(","));
    }

    let configured = tls.insecure
        || tls.crt_file.is_some()
        || tls.ca_file.is_some()
        || tls.key_pass.is_some()
        || tls.min_version.is_some()
        || tls.ciphers.is_some();
    configured.then_some(tls)
}

/// TLS for an in-cluster endpoint signed by the service CA.
pub(crate) fn service_ca(sink: &Sink<'_>) -> SinkTls {
    SinkTls {
        id: sink.id.clone(),
        ca_file: Some(SERVICE_CA.to_string()),
        min_version: Some(sink.tls.min_version.clone()).filter(|v| !v.is_empty()),
        ciphers: Some(sink.tls.ciphers_joined(",")).filter(|c| !c.is_empty()),
        ..Default::default()
    }
}

/// TLS for a sink whose transport is decided by its URL.
pub(crate) fn for_url(sink: &Sink<'_>, needs_enabled: bool) -> Option<SinkTls> {
    new(sink, url::is_secure(sink.spec.url()), needs_enabled)
}

impl Element for SinkTls {
    fn name(&self) -> &str {
        "sink_tls"
    }

    fn template(&self) -> String {
        let mut out = vec![format!("[sinks.{}.tls]", self.id)];
        if self.enabled {
            out.push("enabled = true".to_string());
        }
        out.push(kv("min_tls_version", self.min_version.clone()));
        out.push(kv("ciphersuites", self.ciphers.clone()));
        if self.insecure {
            out.push("verify_certificate = false".to_string());
            out.push("verify_hostname = false".to_string());
        }
        if self.crt_file.is_some() && self.key_file.is_some() {
            out.push(kv("key_file", self.key_file.clone()));
            out.push(kv("crt_file", self.crt_file.clone()));
        }
        out.push(kv("ca_file", self.ca_file.clone()));
        out.push(kv("key_pass", self.key_pass.clone()));
        lines(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{context, Fixture};
    use logging_forwarder_core::{Secret, TlsProfile};
    use logging_forwarder_k8s_api::{OutputSpec, OutputType};
    use pretty_assertions::assert_eq;

    fn sink<'a>(
        cx: &'a crate::Context<'a>,
        spec: &'a OutputSpec,
        secret: Option<Secret>,
        tls: TlsProfile,
    ) -> Sink<'a> {
        Sink {
            cx,
            spec,
            id: "output_out".into(),
            inputs: vec![],
            secret,
            tls,
        }
    }

    #[test]
    fn plaintext_urls_have_no_tls() {
        let fixture = Fixture::default();
        let cx = context(&fixture);
        let spec = OutputSpec::new("out", OutputType::Http, Some("http://h")).with_secret("s");
        let secret = Secret::new("s").with(TLS_CERT, "c").with(TLS_KEY, "k");
        let http = sink(&cx, &spec, Some(secret), TlsProfile::intermediate());
        assert_eq!(for_url(&http, false), None);
    }

    #[test]
    fn empty_settings_are_omitted() {
        let fixture = Fixture::default();
        let cx = context(&fixture);
        let spec = OutputSpec::new("out", OutputType::Http, Some("https://h"));
        assert_eq!(for_url(&sink(&cx, &spec, None, TlsProfile::default()), false), None);
    }

    #[test]
    fn client_certificates_and_profile() {
        let fixture = Fixture::default();
        let cx = context(&fixture);
        let spec = OutputSpec::new("out", OutputType::Kafka, Some("tls://b:9093")).with_secret("s");
        let secret = Secret::new("s")
            .with(TLS_CERT, "c")
            .with(TLS_KEY, "k")
            .with(PASSPHRASE, "p");
        let tls = for_url(
            &sink(&cx, &spec, Some(secret), TlsProfile::new("VersionTLS12", ["A", "B"])),
            true,
        )
        .expect("tls is configured");
        assert_eq!(
            tls.template(),
            r#"[sinks.output_out.tls]
enabled = true
min_tls_version = "VersionTLS12"
ciphersuites = "A,B"
key_file = "/var/run/ocp-collector/secrets/s/tls.key"
crt_file = "/var/run/ocp-collector/secrets/s/tls.crt"
key_pass = "SECRET[kubernetes_secret.s/passphrase]""#
        );
    }

    #[test]
    fn managed_store_always_gets_certificates() {
        let fixture = Fixture::default();
        let cx = context(&fixture);
        let spec = OutputSpec::new("default", OutputType::Elasticsearch, Some("https://es:9200"))
            .with_secret("collector");
        let tls = for_url(&sink(&cx, &spec, None, TlsProfile::default()), false)
            .expect("tls is configured");
        assert_eq!(
            tls.ca_file.as_deref(),
            Some("/var/run/ocp-collector/secrets/collector/ca-bundle.crt")
        );
        assert!(tls.crt_file.is_some());
    }
}
