//! Source components, one adapter per kind of input.

use crate::{
    component_id,
    elements::{Remap, Throttle},
    framework::{
        funcs::{array, kv, lines},
        Element,
    },
    normalize::{self, SourceKind},
    secret_path, Context,
};
use logging_forwarder_core::{secret, ServiceRequirement, TlsProfile};
use logging_forwarder_k8s_api::{
    input::{
        AUDIT_SOURCE_AUDITD, AUDIT_SOURCE_KUBE, AUDIT_SOURCE_OPENSHIFT, AUDIT_SOURCE_OVN,
        INFRA_SOURCE_CONTAINER, INFRA_SOURCE_NODE, SYSLOG_PROTOCOL_TCP,
    },
    names, Application, InputSpec, ReceiverSpec, ReceiverType,
};

pub(crate) const POD_LOGS: &str = "/var/log/pods";
const INFRA_NAMESPACE_GLOBS: [&str; 3] = ["default", "openshift*", "kube*"];
const ROTATED_FILES: [&str; 3] = ["*.gz", "*.log.*", "*.tmp"];

/// Pods of the managed log store and its gateway.
const LOG_STORE_PODS: [(&str, &str); 6] = [
    ("logfilesmetricexporter-*", "*"),
    ("elasticsearch-*", "*"),
    ("kibana-*", "*"),
    ("*", "loki*"),
    ("*", "gateway"),
    ("*", "opa"),
];

pub(crate) const AUDITD_LOGS: &[&str] = &["/var/log/audit/audit.log"];
pub(crate) const KUBE_API_LOGS: &[&str] = &["/var/log/kube-apiserver/audit.log"];
pub(crate) const OPENSHIFT_API_LOGS: &[&str] = &[
    "/var/log/oauth-apiserver/audit.log",
    "/var/log/openshift-apiserver/audit.log",
    "/var/log/oauth-server/audit.log",
];
pub(crate) const OVN_LOGS: &[&str] = &["/var/log/ovn/acl-audit-log.log"];

const MAX_LINE_BYTES: i64 = 3 * 1024 * 1024;
const AUDIT_MAX_READ_BYTES: i64 = 256 * 1024;

/// The elements generated for one input and the IDs its records leave by.
pub(crate) struct Adapted {
    pub elements: Vec<Box<dyn Element>>,
    pub outputs: Vec<String>,
    pub service: Option<ServiceRequirement>,
}

struct KubernetesLogs {
    id: String,
    include: Vec<String>,
    exclude: Vec<String>,
    label_selector: Option<String>,
}

struct Journald {
    id: String,
}

struct FileTailer {
    id: String,
    paths: &'static [&'static str],
}

struct HttpServer {
    id: String,
    port: i32,
    tls: ListenerTls,
}

struct SyslogServer {
    id: String,
    port: i32,
    mode: String,
    tls: Option<ListenerTls>,
}

/// Serving certificate settings for a listening source.
struct ListenerTls {
    id: String,
    cert: String,
    key: String,
    profile: TlsProfile,
}

/// Generates the sources of `input`.
pub(crate) fn adapt(cx: &Context<'_>, input: &InputSpec, tls: &TlsProfile) -> Adapted {
    let base = format!("input_{}", component_id(&input.name));
    let mut adapted = Adapted {
        elements: Vec::new(),
        outputs: Vec::new(),
        service: None,
    };

    if let Some(app) = &input.application {
        let source = KubernetesLogs::application(cx, &base, app);
        let meta = adapted.add_source(&base, SourceKind::Container, source);
        match input.max_records_per_second().filter(|n| *n > 0) {
            Some(threshold) => {
                let id = format!("{base}_throttle");
                adapted.elements.push(Box::new(Throttle {
                    id: id.clone(),
                    inputs: vec![meta],
                    threshold,
                    key_field: Some("{{ _internal.file }}".to_string()),
                }));
                adapted.outputs.push(id);
            }
            None => adapted.outputs.push(meta),
        }
    }

    for source in input.infrastructure_sources() {
        let meta = match source {
            INFRA_SOURCE_CONTAINER => {
                let source = KubernetesLogs::infrastructure(cx, &base);
                adapted.add_source(&base, SourceKind::Container, source)
            }
            INFRA_SOURCE_NODE => {
                let id = format!("{base}_{}", SourceKind::Journal.suffix());
                adapted.add_source(&base, SourceKind::Journal, Journald { id })
            }
            _ => continue,
        };
        adapted.outputs.push(meta);
    }

    for source in input.audit_sources() {
        let (kind, paths) = match source {
            AUDIT_SOURCE_AUDITD => (SourceKind::Auditd, AUDITD_LOGS),
            AUDIT_SOURCE_KUBE => (SourceKind::KubeApi, KUBE_API_LOGS),
            AUDIT_SOURCE_OPENSHIFT => (SourceKind::OpenshiftApi, OPENSHIFT_API_LOGS),
            AUDIT_SOURCE_OVN => (SourceKind::Ovn, OVN_LOGS),
            _ => continue,
        };
        let id = format!("{base}_{}", kind.suffix());
        let meta = adapted.add_source(&base, kind, FileTailer { id, paths });
        adapted.outputs.push(meta);
    }

    if let Some(receiver) = &input.receiver {
        adapted.add_receiver(cx, &base, input, receiver, tls);
    }

    adapted
}

// === impl Adapted ===

impl Adapted {
    /// Adds a source and its normalizer, returning the normalizer's ID.
    fn add_source(
        &mut self,
        base: &str,
        kind: SourceKind,
        source: impl Element + 'static,
    ) -> String {
        let meta = format!("{base}_{}_meta", kind.suffix());
        let inputs = vec![source.name().to_string()];
        self.elements.push(Box::new(source));
        self.elements
            .push(Box::new(Remap::new(meta.clone(), inputs, normalize::vrl(kind))));
        meta
    }

    fn add_receiver(
        &mut self,
        cx: &Context<'_>,
        base: &str,
        input: &InputSpec,
        receiver: &ReceiverSpec,
        tls: &TlsProfile,
    ) {
        let Some(port) = receiver.port() else {
            return;
        };
        let serving = |id: &str| {
            let (cert, key) = match receiver.tls.as_ref().and_then(|t| t.secret_name.as_deref()) {
                Some(name) => (
                    secret_path(name, secret::TLS_CERT),
                    secret_path(name, secret::TLS_KEY),
                ),
                None => (
                    format!("/etc/collector/receiver/{id}/{}", secret::TLS_CERT),
                    format!("/etc/collector/receiver/{id}/{}", secret::TLS_KEY),
                ),
            };
            ListenerTls {
                id: id.to_string(),
                cert,
                key,
                profile: tls.clone(),
            }
        };

        let meta = match receiver.receiver_type() {
            Some(ReceiverType::Http) => {
                let kind = SourceKind::HttpReceiver;
                let id = format!("{base}_{}", kind.suffix());
                let items = format!("{id}_items");
                self.elements.push(Box::new(HttpServer {
                    id: id.clone(),
                    port,
                    tls: serving(&id),
                }));
                self.elements.push(Box::new(Remap::new(
                    items.clone(),
                    vec![id],
                    "if exists(.items) {\n  . = .items\n}",
                )));
                let meta = format!("{base}_{}_meta", kind.suffix());
                self.elements.push(Box::new(Remap::new(
                    meta.clone(),
                    vec![items],
                    normalize::vrl(kind),
                )));
                meta
            }
            Some(ReceiverType::Syslog) => {
                let kind = SourceKind::SyslogReceiver;
                let id = format!("{base}_{}", kind.suffix());
                let mode = receiver.syslog_protocol().to_string();
                let tls = (mode == SYSLOG_PROTOCOL_TCP).then(|| serving(&id));
                self.add_source(base, kind, SyslogServer { id, port, mode, tls })
            }
            None => return,
        };
        self.outputs.push(meta);

        if let Ok(port) = u16::try_from(port) {
            self.service = Some(ServiceRequirement {
                name: format!("{}-{}", cx.name, input.name),
                port,
                target_port: port,
            });
        }
    }
}

// === impl KubernetesLogs ===

impl KubernetesLogs {
    fn application(cx: &Context<'_>, base: &str, app: &Application) -> Self {
        let mut includes = app
            .includes
            .iter()
            .map(|i| {
                (
                    i.namespace.as_deref().unwrap_or("*"),
                    i.container.as_deref().unwrap_or("*"),
                )
            })
            .collect::<Vec<_>>();
        if includes.is_empty() {
            includes = app.namespaces.iter().map(|ns| (ns.as_str(), "*")).collect();
        }

        let mut exclude = INFRA_NAMESPACE_GLOBS
            .iter()
            .filter(|infra| !includes.iter().any(|(ns, _)| glob_matches(infra, ns)))
            .map(|ns| pod_glob(ns, "*", "*.log"))
            .collect::<Vec<_>>();
        exclude.extend(excluded_pod_logs(cx));
        exclude.extend(app.excludes.iter().map(|e| {
            pod_glob(
                e.namespace.as_deref().unwrap_or("*"),
                e.container.as_deref().unwrap_or("*"),
                "*.log",
            )
        }));

        let include = if includes.is_empty() {
            vec![pod_glob("*", "*", "*.log")]
        } else {
            includes
                .iter()
                .map(|(ns, c)| pod_glob(ns, c, "*.log"))
                .collect()
        };

        let label_selector = app
            .selector
            .as_ref()
            .filter(|s| !s.match_labels.is_empty())
            .map(|s| {
                s.match_labels
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(",")
            });

        Self {
            id: format!("{base}_{}", SourceKind::Container.suffix()),
            include,
            exclude,
            label_selector,
        }
    }

    fn infrastructure(cx: &Context<'_>, base: &str) -> Self {
        Self {
            id: format!("{base}_{}", SourceKind::Container.suffix()),
            include: INFRA_NAMESPACE_GLOBS
                .iter()
                .map(|ns| pod_glob(ns, "*", "*.log"))
                .collect(),
            exclude: excluded_pod_logs(cx),
            label_selector: None,
        }
    }
}

/// Pod log files never collected: the collector's own pods, the log store
/// and rotated files.
pub(crate) fn excluded_pod_logs(cx: &Context<'_>) -> Vec<String> {
    let mut exclude = vec![format!(
        "{POD_LOGS}/{}_{}-*/*/*.log",
        cx.namespace, cx.name
    )];
    exclude.extend(LOG_STORE_PODS.iter().map(|(pod, container)| {
        format!(
            "{POD_LOGS}/{}_{pod}/{container}/*.log",
            names::LEGACY_NAMESPACE
        )
    }));
    exclude.extend(
        ROTATED_FILES
            .iter()
            .map(|ext| format!("{POD_LOGS}/*/*/{ext}")),
    );
    exclude
}

impl Element for KubernetesLogs {
    fn name(&self) -> &str {
        &self.id
    }

    fn template(&self) -> String {
        lines([
            format!("[sources.{}]", self.id),
            "type = \"kubernetes_logs\"".to_string(),
            format!("include_paths_glob_patterns = {}", array(&self.include)),
            format!("exclude_paths_glob_patterns = {}", array(&self.exclude)),
            kv("extra_label_selector", self.label_selector.as_deref()),
            "pod_annotation_fields.pod_labels = \"kubernetes.labels\"".to_string(),
            "pod_annotation_fields.pod_namespace = \"kubernetes.namespace_name\"".to_string(),
            "pod_annotation_fields.pod_annotations = \"kubernetes.annotations\"".to_string(),
            "pod_annotation_fields.pod_uid = \"kubernetes.pod_id\"".to_string(),
            "pod_annotation_fields.pod_node_name = \"hostname\"".to_string(),
            "namespace_annotation_fields.namespace_uid = \"kubernetes.namespace_id\"".to_string(),
            kv("rotate_wait_secs", Some(5)),
            kv("glob_minimum_cooldown_ms", Some(15000)),
            kv("max_line_bytes", Some(MAX_LINE_BYTES)),
            kv("max_read_bytes", Some(MAX_LINE_BYTES)),
            kv("use_apiserver_cache", Some(true)),
        ])
    }
}

impl Element for Journald {
    fn name(&self) -> &str {
        &self.id
    }

    fn template(&self) -> String {
        format!(
            "[sources.{}]\ntype = \"journald\"\njournal_directory = \"/var/log/journal\"",
            self.id
        )
    }
}

impl Element for FileTailer {
    fn name(&self) -> &str {
        &self.id
    }

    fn template(&self) -> String {
        lines([
            format!("[sources.{}]", self.id),
            "type = \"file\"".to_string(),
            format!("include = {}", array(self.paths)),
            kv("host_key", Some("hostname")),
            kv("glob_minimum_cooldown_ms", Some(15000)),
            kv("ignore_older_secs", Some(3600)),
            kv("max_line_bytes", Some(MAX_LINE_BYTES)),
            kv("max_read_bytes", Some(AUDIT_MAX_READ_BYTES)),
            kv("rotate_wait_secs", Some(5)),
        ])
    }
}

impl Element for HttpServer {
    fn name(&self) -> &str {
        &self.id
    }

    fn template(&self) -> String {
        let source = lines([
            format!("[sources.{}]", self.id),
            "type = \"http_server\"".to_string(),
            kv("address", Some(format!("[::]:{}", self.port))),
            "decoding.codec = \"json\"".to_string(),
        ]);
        format!("{source}\n\n{}", self.tls.template())
    }
}

impl Element for SyslogServer {
    fn name(&self) -> &str {
        &self.id
    }

    fn template(&self) -> String {
        let source = lines([
            format!("[sources.{}]", self.id),
            "type = \"syslog\"".to_string(),
            kv("address", Some(format!("[::]:{}", self.port))),
            kv("mode", Some(self.mode.as_str())),
        ]);
        match &self.tls {
            Some(tls) => format!("{source}\n\n{}", tls.template()),
            None => source,
        }
    }
}

impl ListenerTls {
    fn template(&self) -> String {
        let min_version = Some(self.profile.min_version.as_str()).filter(|v| !v.is_empty());
        let ciphers = Some(self.profile.ciphers_joined(",")).filter(|c| !c.is_empty());
        lines([
            format!("[sources.{}.tls]", self.id),
            kv("enabled", Some(true)),
            kv("key_file", Some(self.key.as_str())),
            kv("crt_file", Some(self.cert.as_str())),
            kv("min_tls_version", min_version),
            kv("ciphersuites", ciphers),
        ])
    }
}

fn pod_glob(namespace: &str, container: &str, file: &str) -> String {
    format!("{POD_LOGS}/{namespace}_*/{container}/{file}")
}

/// Matches `s` against a pattern whose only wildcard is `*`.
fn glob_matches(pattern: &str, s: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == s,
        Some((prefix, rest)) => {
            let Some(tail) = s.strip_prefix(prefix) else {
                return false;
            };
            if rest.is_empty() {
                return true;
            }
            (0..=tail.len())
                .filter(|i| tail.is_char_boundary(*i))
                .any(|i| glob_matches(rest, &tail[i..]))
        }
    }
}
