//! The remap every collected record passes through before routing.
//!
//! Normalization works inside an `_internal` envelope so that the raw fields
//! of a source never collide with the fields the collector adds. The router
//! lifts the envelope once the record is fully described.

use logging_forwarder_core::Tenant;

/// What produced a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SourceKind {
    Container,
    Journal,
    Auditd,
    KubeApi,
    OpenshiftApi,
    Ovn,
    HttpReceiver,
    SyslogReceiver,
}

/// Infrastructure namespaces; everything else is an application namespace.
pub(crate) const INFRA_NAMESPACES: &str = r"^default$|^openshift(-.+)?$|^kube(-.+)?$";

const FIX_LEVEL: &str = r#"if !exists(._internal.level) {
  message = string(._internal.message) ?? ""
  ._internal.level = "default"
  if match(message, r'Warning|WARN|^W[0-9]+|level=warn|Value:warn|"level":"warn"|<warn>') {
    ._internal.level = "warn"
  } else if match(message, r'Error|ERROR|^E[0-9]+|level=error|Value:error|"level":"error"|<error>') {
    ._internal.level = "error"
  } else if match(message, r'Critical|CRITICAL|^C[0-9]+|level=critical|Value:critical|"level":"critical"|<critical>') {
    ._internal.level = "critical"
  } else if match(message, r'Debug|DEBUG|^D[0-9]+|level=debug|Value:debug|"level":"debug"|<debug>') {
    ._internal.level = "debug"
  } else if match(message, r'Notice|NOTICE|^N[0-9]+|level=notice|Value:notice|"level":"notice"|<notice>') {
    ._internal.level = "notice"
  } else if match(message, r'Alert|ALERT|^A[0-9]+|level=alert|Value:alert|"level":"alert"|<alert>') {
    ._internal.level = "alert"
  } else if match(message, r'Emergency|EMERGENCY|^EM[0-9]+|level=emergency|Value:emergency|"level":"emergency"|<emergency>') {
    ._internal.level = "emergency"
  } else if match(message, r'Info|INFO|^I[0-9]+|level=info|Value:info|"level":"info"|<info>') {
    ._internal.level = "info"
  }
}"#;

const JOURNAL_LEVEL: &str = r#"priority = to_int(._internal.PRIORITY) ?? 6
levels = ["emerg", "alert", "crit", "err", "warning", "notice", "info", "debug"]
._internal.level = get(levels, [priority]) ?? "unknown"
._internal.message = ._internal.MESSAGE
del(._internal.MESSAGE)"#;

const PARSE_HOST_AUDIT: &str = r#"match1 = parse_regex(string(._internal.message) ?? "", r'type=(?P<type>[^ ]+)') ?? {}
envelop = {"type": match1.type}
match2, err = parse_regex(string(._internal.message) ?? "", r'msg=audit\((?P<ts_record>[^ ]+)\):')
if err == null {
  sp = split(match2.ts_record, ":")
  if length(sp) == 2 {
    ts = parse_timestamp(sp[0], "%s.%3f") ?? now()
    envelop |= {"record_id": sp[1]}
    ._internal."audit.linux" = envelop
    ._internal."@timestamp" = format_timestamp!(ts, "%+")
  }
}
._internal.level = "default""#;

const FLATTEN_AUDIT: &str = r#"parsed, err = parse_json(string(._internal.message) ?? "")
if err == null && is_object(parsed) {
  ._internal.structured = parsed
  ._internal = merge(._internal, object!(parsed))
  del(._internal.message)
  del(._internal.structured)
}"#;

const RECEIVED_AUDIT: &str = r#"if exists(._internal.requestReceivedTimestamp) {
  ._internal."@timestamp" = ._internal.requestReceivedTimestamp
}
._internal.k8s_audit_level = ._internal.level
._internal.level = "default""#;

const SYSLOG_RECEIVED: &str = r#"if exists(._internal.severity) {
  ._internal.level = ._internal.severity
}
if exists(._internal.timestamp) {
  ._internal."@timestamp" = ._internal.timestamp
}"#;

// === impl SourceKind ===

impl SourceKind {
    /// The suffix of the component IDs generated for this kind.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Journal => "journal",
            Self::Auditd => "auditd",
            Self::KubeApi => "kubeapi",
            Self::OpenshiftApi => "openshiftapi",
            Self::Ovn => "ovn",
            Self::HttpReceiver => "http",
            Self::SyslogReceiver => "syslog",
        }
    }

    /// The value of the record's `log_source` field.
    pub fn log_source(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Journal => "node",
            Self::Auditd => "auditd",
            Self::KubeApi | Self::HttpReceiver => "kubeAPI",
            Self::OpenshiftApi => "openshiftAPI",
            Self::Ovn => "ovn",
            Self::SyslogReceiver => "syslog",
        }
    }

    /// The tenant of every record from this kind, or `None` when it depends
    /// on the record's namespace.
    pub fn tenant(&self) -> Option<Tenant> {
        match self {
            Self::Container => None,
            Self::Journal | Self::SyslogReceiver => Some(Tenant::Infrastructure),
            Self::Auditd
            | Self::KubeApi
            | Self::OpenshiftApi
            | Self::Ovn
            | Self::HttpReceiver => Some(Tenant::Audit),
        }
    }
}

/// The normalization program for records of `kind`.
pub(crate) fn vrl(kind: SourceKind) -> String {
    let mut steps = vec![r#". = {"_internal": .}"#.to_string()];

    if kind == SourceKind::Container {
        steps.push(
            "if exists(._internal.stream) {\n  ._internal.kubernetes.container_iostream = del(._internal.stream)\n}"
                .to_string(),
        );
    }

    steps.push(format!(
        "._internal.log_source = {:?}",
        kind.log_source()
    ));
    match kind.tenant() {
        Some(tenant) => steps.push(format!("._internal.log_type = {:?}", tenant.as_str())),
        None => steps.push(format!(
            "namespace = string(._internal.kubernetes.namespace_name) ?? \"\"\nif match(namespace, r'{INFRA_NAMESPACES}') {{\n  ._internal.log_type = \"infrastructure\"\n}} else {{\n  ._internal.log_type = \"application\"\n}}"
        )),
    }

    steps.push(r#"._internal.hostname = get_env_var("VECTOR_SELF_NODE_NAME") ?? """#.to_string());
    steps.push(r#"._internal.openshift.cluster_id = get_env_var("OPENSHIFT_CLUSTER_ID") ?? """#.to_string());
    steps.push(
        r#"._internal.openshift.sequence = to_unix_timestamp(now(), unit: "nanoseconds")"#
            .to_string(),
    );

    let level = match kind {
        SourceKind::Container | SourceKind::Ovn => FIX_LEVEL.to_string(),
        SourceKind::Journal => JOURNAL_LEVEL.to_string(),
        SourceKind::Auditd => PARSE_HOST_AUDIT.to_string(),
        SourceKind::KubeApi | SourceKind::OpenshiftApi => {
            let level_field = if kind == SourceKind::KubeApi {
                "k8s_audit_level"
            } else {
                "openshift_audit_level"
            };
            format!(
                "{FLATTEN_AUDIT}\n._internal.{level_field} = ._internal.level\n._internal.level = \"default\""
            )
        }
        SourceKind::HttpReceiver => RECEIVED_AUDIT.to_string(),
        SourceKind::SyslogReceiver => format!("{SYSLOG_RECEIVED}\n{FIX_LEVEL}"),
    };
    steps.push(level);

    steps.join("\n")
}
