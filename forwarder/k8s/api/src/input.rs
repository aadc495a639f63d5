use crate::names;
use logging_forwarder_core::Tenant;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

pub const INFRA_SOURCE_CONTAINER: &str = "container";
pub const INFRA_SOURCE_NODE: &str = "node";
pub const INFRA_SOURCES: [&str; 2] = [INFRA_SOURCE_CONTAINER, INFRA_SOURCE_NODE];

pub const AUDIT_SOURCE_KUBE: &str = "kubeAPI";
pub const AUDIT_SOURCE_OPENSHIFT: &str = "openshiftAPI";
pub const AUDIT_SOURCE_AUDITD: &str = "auditd";
pub const AUDIT_SOURCE_OVN: &str = "ovn";
pub const AUDIT_SOURCES: [&str; 4] = [
    AUDIT_SOURCE_KUBE,
    AUDIT_SOURCE_OPENSHIFT,
    AUDIT_SOURCE_AUDITD,
    AUDIT_SOURCE_OVN,
];

pub const HTTP_FORMAT_KUBE_API_AUDIT: &str = "kubeAPIAudit";
pub const SYSLOG_PROTOCOL_TCP: &str = "tcp";
pub const SYSLOG_PROTOCOL_UDP: &str = "udp";

/// A named log source.
///
/// Exactly one of the descriptors is expected to be set; the validator
/// rejects inputs that set none or several.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InputSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<Application>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<Infrastructure>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<Audit>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<ReceiverSpec>,
}

/// Container logs from application namespaces.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Namespaces to collect from. Superseded by `includes`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<NamespaceContainerSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<NamespaceContainerSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,

    /// Limit applied to each container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_limit: Option<LimitSpec>,

    /// Limit applied to the group of containers matched by this input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_limit: Option<LimitSpec>,
}

/// A namespace/container glob pair. Either side may be omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceContainerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LimitSpec {
    pub max_records_per_second: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Infrastructure {
    /// Any of `container` and `node`. Empty selects both.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    /// Any of `kubeAPI`, `openshiftAPI`, `auditd` and `ovn`. Empty selects all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

/// A listener the collector opens to receive logs pushed to it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpReceiver>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog: Option<SyslogReceiver>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<ReceiverTlsSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpReceiver {
    pub port: i32,
    #[serde(default)]
    pub format: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyslogReceiver {
    pub port: i32,
    /// `tcp` or `udp`. Defaults to `tcp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Serving certificate material for a receiver. Without it the receiver uses
/// the service-serving certificate minted for the collector.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverTlsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiverType {
    Http,
    Syslog,
}

// === impl InputSpec ===

impl InputSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn application(name: impl Into<String>, application: Application) -> Self {
        Self {
            application: Some(application),
            ..Self::new(name)
        }
    }

    pub fn infrastructure(name: impl Into<String>, sources: &[&str]) -> Self {
        Self {
            infrastructure: Some(Infrastructure {
                sources: sources.iter().map(|s| s.to_string()).collect(),
            }),
            ..Self::new(name)
        }
    }

    pub fn audit(name: impl Into<String>, sources: &[&str]) -> Self {
        Self {
            audit: Some(Audit {
                sources: sources.iter().map(|s| s.to_string()).collect(),
            }),
            ..Self::new(name)
        }
    }

    pub fn receiver(name: impl Into<String>, receiver: ReceiverSpec) -> Self {
        Self {
            receiver: Some(receiver),
            ..Self::new(name)
        }
    }

    /// The canonical descriptor of a reserved input.
    pub fn reserved(name: &str) -> Option<Self> {
        match name {
            names::INPUT_APPLICATION => Some(Self::application(name, Application::default())),
            names::INPUT_INFRASTRUCTURE => Some(Self::infrastructure(name, &INFRA_SOURCES)),
            names::INPUT_AUDIT => Some(Self::audit(name, &AUDIT_SOURCES)),
            _ => None,
        }
    }

    /// The number of populated descriptors.
    pub fn descriptor_count(&self) -> usize {
        [
            self.application.is_some(),
            self.infrastructure.is_some(),
            self.audit.is_some(),
            self.receiver.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    pub fn has_policy(&self) -> bool {
        self.application
            .as_ref()
            .map(|a| a.container_limit.is_some() || a.group_limit.is_some())
            .unwrap_or(false)
    }

    /// The configured application rate limit. The per-container limit wins
    /// over the group limit; the group limit is treated as a per-container
    /// limit.
    pub fn max_records_per_second(&self) -> Option<i64> {
        let app = self.application.as_ref()?;
        app.container_limit
            .as_ref()
            .or(app.group_limit.as_ref())
            .map(|l| l.max_records_per_second)
    }

    /// The tenants whose logs this input reads.
    pub fn tenants(&self) -> Vec<Tenant> {
        let mut tenants = Vec::new();
        if self.application.is_some() {
            tenants.push(Tenant::Application);
        }
        if self.infrastructure.is_some() {
            tenants.push(Tenant::Infrastructure);
        }
        if self.audit.is_some() {
            tenants.push(Tenant::Audit);
        }
        if let Some(receiver) = &self.receiver {
            match receiver.receiver_type() {
                Some(ReceiverType::Http) => tenants.push(Tenant::Audit),
                Some(ReceiverType::Syslog) => tenants.push(Tenant::Infrastructure),
                None => {}
            }
        }
        tenants
    }

    /// The infrastructure sources this input selects, defaulting to all.
    pub fn infrastructure_sources(&self) -> Vec<&str> {
        match &self.infrastructure {
            Some(infra) if !infra.sources.is_empty() => {
                infra.sources.iter().map(String::as_str).collect()
            }
            Some(_) => INFRA_SOURCES.to_vec(),
            None => Vec::new(),
        }
    }

    /// The audit sources this input selects, defaulting to all.
    pub fn audit_sources(&self) -> Vec<&str> {
        match &self.audit {
            Some(audit) if !audit.sources.is_empty() => {
                audit.sources.iter().map(String::as_str).collect()
            }
            Some(_) => AUDIT_SOURCES.to_vec(),
            None => Vec::new(),
        }
    }
}

// === impl ReceiverSpec ===

impl ReceiverSpec {
    pub fn http(port: i32, format: &str) -> Self {
        Self {
            type_: Some("http".to_string()),
            http: Some(HttpReceiver {
                port,
                format: format.to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn syslog(port: i32, protocol: &str) -> Self {
        Self {
            type_: Some("syslog".to_string()),
            syslog: Some(SyslogReceiver {
                port,
                protocol: Some(protocol.to_string()),
            }),
            ..Default::default()
        }
    }

    /// The receiver type named by `type`, or implied by the only populated
    /// descriptor when `type` is omitted.
    pub fn receiver_type(&self) -> Option<ReceiverType> {
        match self.type_.as_deref() {
            Some("http") => Some(ReceiverType::Http),
            Some("syslog") => Some(ReceiverType::Syslog),
            Some(_) => None,
            None => match (&self.http, &self.syslog) {
                (Some(_), None) => Some(ReceiverType::Http),
                (None, Some(_)) => Some(ReceiverType::Syslog),
                _ => None,
            },
        }
    }

    pub fn port(&self) -> Option<i32> {
        match self.receiver_type()? {
            ReceiverType::Http => self.http.as_ref().map(|h| h.port),
            ReceiverType::Syslog => self.syslog.as_ref().map(|s| s.port),
        }
    }

    pub fn syslog_protocol(&self) -> &str {
        self.syslog
            .as_ref()
            .and_then(|s| s.protocol.as_deref())
            .unwrap_or(SYSLOG_PROTOCOL_TCP)
    }
}

impl fmt::Display for ReceiverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => "http".fmt(f),
            Self::Syslog => "syslog".fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn container_limit_wins_over_group_limit() {
        let input = InputSpec::application(
            "app",
            Application {
                container_limit: Some(LimitSpec {
                    max_records_per_second: 10,
                }),
                group_limit: Some(LimitSpec {
                    max_records_per_second: 20,
                }),
                ..Default::default()
            },
        );
        assert!(input.has_policy());
        assert_eq!(input.max_records_per_second(), Some(10));
    }

    #[test]
    fn group_limit_is_a_container_limit() {
        let input = InputSpec::application(
            "app",
            Application {
                group_limit: Some(LimitSpec {
                    max_records_per_second: 20,
                }),
                ..Default::default()
            },
        );
        assert_eq!(input.max_records_per_second(), Some(20));
    }

    #[test]
    fn receiver_type_falls_back_to_descriptor() {
        let mut receiver = ReceiverSpec::syslog(10514, "udp");
        receiver.type_ = None;
        assert_eq!(receiver.receiver_type(), Some(ReceiverType::Syslog));
        assert_eq!(receiver.port(), Some(10514));
        assert_eq!(receiver.syslog_protocol(), "udp");

        let input = InputSpec::receiver("rcv", receiver);
        assert_eq!(input.tenants(), vec![Tenant::Infrastructure]);
    }

    #[test]
    fn reserved_inputs_select_all_sources() {
        let infra = InputSpec::reserved("infrastructure").unwrap();
        assert_eq!(infra.infrastructure_sources(), vec!["container", "node"]);
        let audit = InputSpec::reserved("audit").unwrap();
        assert_eq!(audit.audit_sources().len(), 4);
        assert!(InputSpec::reserved("custom").is_none());
    }

    #[test]
    fn deserializes_camel_case() {
        let input: InputSpec = serde_yaml::from_str(
            r#"
name: my-app
application:
  includes:
  - namespace: test-*
    container: web
  containerLimit:
    maxRecordsPerSecond: 100
"#,
        )
        .unwrap();
        assert_eq!(input.descriptor_count(), 1);
        assert_eq!(input.max_records_per_second(), Some(100));
        let app = input.application.unwrap();
        assert_eq!(app.includes[0].namespace.as_deref(), Some("test-*"));
    }
}
