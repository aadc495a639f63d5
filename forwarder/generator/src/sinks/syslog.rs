use super::{tls, Sink, SinkConfig};
use crate::framework::funcs::kv;
use logging_forwarder_k8s_api::url;

const DEFAULT_RFC: &str = "rfc5424";
const DEFAULT_FACILITY: &str = "user";
const DEFAULT_SEVERITY: &str = "informational";

pub(super) fn new(sink: &Sink<'_>) -> SinkConfig {
    let syslog = sink.spec.type_spec.syslog.clone().unwrap_or_default();
    let (mode, address) = endpoint(sink.spec.url());
    let non_empty = |v: Option<String>| v.filter(|v| !v.trim().is_empty());

    let encoding = vec![
        r#"codec = "syslog""#.to_string(),
        kv(
            "rfc",
            Some(
                non_empty(syslog.rfc)
                    .map(|r| r.to_ascii_lowercase())
                    .unwrap_or_else(|| DEFAULT_RFC.to_string()),
            ),
        ),
        kv(
            "facility",
            Some(non_empty(syslog.facility).unwrap_or_else(|| DEFAULT_FACILITY.to_string())),
        ),
        kv(
            "severity",
            Some(non_empty(syslog.severity).unwrap_or_else(|| DEFAULT_SEVERITY.to_string())),
        ),
        kv("app_name", non_empty(syslog.app_name)),
        kv("msg_id", non_empty(syslog.msg_id)),
        kv("proc_id", non_empty(syslog.proc_id)),
        kv("tag", non_empty(syslog.tag)),
        kv("trim_prefix", non_empty(syslog.trim_prefix)),
        kv("payload_key", non_empty(syslog.payload_key)),
        kv("add_log_source", syslog.add_log_source.then_some(true)),
    ];
    let element = sink
        .element(
            "socket",
            vec![kv("address", address), kv("mode", Some(mode))],
        )
        .with_table("encoding", encoding);

    let mut config = SinkConfig::default();
    config.elements.push(Box::new(element));
    if let Some(tls) = tls::for_url(sink, true) {
        config.elements.push(Box::new(tls));
    }
    config
}

/// The socket mode and address of a syslog URL. TLS runs over TCP.
fn endpoint(url: Option<&str>) -> (&'static str, Option<String>) {
    let Some(uri) = url.and_then(|u| url::parse_absolute(u).ok()) else {
        return ("tcp", None);
    };
    let mode = match uri.scheme_str().map(str::to_ascii_lowercase).as_deref() {
        Some("udp") | Some("udps") => "udp",
        _ => "tcp",
    };
    (mode, uri.authority().map(|a| a.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::tcp("tcp://syslog:514", "tcp")]
    #[case::tls("tls://syslog:6514", "tcp")]
    #[case::udp("udp://syslog:514", "udp")]
    fn modes(#[case] url: &str, #[case] mode: &str) {
        let (m, address) = endpoint(Some(url));
        assert_eq!(m, mode);
        assert!(address.unwrap().starts_with("syslog:"));
    }
}
