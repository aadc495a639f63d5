use crate::names;
use logging_forwarder_core::TlsProfile;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

pub const TUNING_BUFFER_MAX_EVENTS: &str = "buffer.max_events";
pub const TUNING_BUFFER_WHEN_FULL: &str = "buffer.when_full";

/// Tuning options an output may set. Every option but
/// [`TUNING_BUFFER_WHEN_FULL`] takes a non-negative integer.
pub const TUNING_OPTIONS: [&str; 8] = [
    TUNING_BUFFER_MAX_EVENTS,
    TUNING_BUFFER_WHEN_FULL,
    "request.concurrency",
    "request.rate_limit_duration_secs",
    "request.rate_limit_num",
    "request.retry_attempts",
    "request.retry_initial_backoff_secs",
    "request.retry_max_duration_secs",
];

pub const WHEN_FULL_POLICIES: [&str; 2] = ["block", "drop_newest"];

/// A named sink.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    pub name: String,

    /// One of the [`OutputType`] names.
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(flatten)]
    pub type_spec: OutputTypeSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutputTlsSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<OutputSecretSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<crate::LimitSpec>,

    /// Delivery tuning, keyed by dotted collector option names such as
    /// `buffer.max_events`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuning: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutputType {
    AzureMonitor,
    Cloudwatch,
    Elasticsearch,
    FluentdForward,
    GoogleCloudLogging,
    Http,
    Kafka,
    Loki,
    Splunk,
    Syslog,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized output type: {0:?}")]
pub struct UnknownOutputType(pub String);

/// Type-specific output settings. At most the descriptor matching the output
/// type is read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputTypeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog: Option<Syslog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fluentd_forward: Option<FluentdForward>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch: Option<Elasticsearch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kafka: Option<Kafka>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudwatch: Option<Cloudwatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loki: Option<Loki>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_cloud_logging: Option<GoogleCloudLogging>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splunk: Option<Splunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<Http>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_monitor: Option<AzureMonitor>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Syslog {
    /// `RFC3164` or `RFC5424`. Defaults to `RFC5424`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rfc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_key: Option<String>,
    #[serde(default)]
    pub add_log_source: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "procID")]
    pub proc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "msgID")]
    pub msg_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct FluentdForward {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Elasticsearch {
    #[serde(flatten)]
    pub structured: ElasticsearchStructuredSpec,

    /// Major version of the target cluster. Defaults to 6.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

/// Selects the index for records carrying a parsed `structured` payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchStructuredSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_type_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_type_name: Option<String>,
    #[serde(default)]
    pub enable_structured_container_logs: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Kafka {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub brokers: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cloudwatch {
    pub region: String,
    /// `logType`, `namespaceName` or `namespaceUUID`.
    pub group_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_prefix: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Loki {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_keys: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCloudLogging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Splunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Http {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMonitor {
    pub customer_id: String,
    pub log_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputTlsSpec {
    #[serde(default)]
    pub insecure_skip_verify: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_profile: Option<TlsSecurityProfile>,
}

/// A named TLS profile, or a custom version and cipher list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsSecurityProfile {
    /// `Old`, `Intermediate`, `Modern` or `Custom`.
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomTlsProfile>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomTlsProfile {
    #[serde(default)]
    pub ciphers: Vec<String>,
    #[serde(rename = "minTLSVersion")]
    pub min_tls_version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputSecretSpec {
    pub name: String,
}

// === impl OutputType ===

impl OutputType {
    pub const ALL: [OutputType; 10] = [
        OutputType::AzureMonitor,
        OutputType::Cloudwatch,
        OutputType::Elasticsearch,
        OutputType::FluentdForward,
        OutputType::GoogleCloudLogging,
        OutputType::Http,
        OutputType::Kafka,
        OutputType::Loki,
        OutputType::Splunk,
        OutputType::Syslog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AzureMonitor => "azureMonitor",
            Self::Cloudwatch => "cloudwatch",
            Self::Elasticsearch => "elasticsearch",
            Self::FluentdForward => "fluentdForward",
            Self::GoogleCloudLogging => "googleCloudLogging",
            Self::Http => "http",
            Self::Kafka => "kafka",
            Self::Loki => "loki",
            Self::Splunk => "splunk",
            Self::Syslog => "syslog",
        }
    }

    /// Output types whose endpoint is implied by other settings.
    pub fn url_required(&self) -> bool {
        !matches!(self, Self::Cloudwatch | Self::GoogleCloudLogging | Self::AzureMonitor)
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl FromStr for OutputType {
    type Err = UnknownOutputType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownOutputType(s.to_string()))
    }
}

// === impl OutputSpec ===

impl OutputSpec {
    pub fn new(name: impl Into<String>, type_: OutputType, url: Option<&str>) -> Self {
        Self {
            name: name.into(),
            type_: type_.to_string(),
            url: url.map(Into::into),
            ..Default::default()
        }
    }

    pub fn with_secret(mut self, name: impl Into<String>) -> Self {
        self.secret = Some(OutputSecretSpec { name: name.into() });
        self
    }

    pub fn output_type(&self) -> Option<OutputType> {
        self.type_.parse().ok()
    }

    pub fn is_type(&self, t: OutputType) -> bool {
        self.output_type() == Some(t)
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn secret_name(&self) -> Option<&str> {
        self.secret.as_ref().map(|s| s.name.as_str())
    }

    pub fn has_policy(&self) -> bool {
        self.limit.is_some()
    }

    pub fn max_records_per_second(&self) -> Option<i64> {
        self.limit.as_ref().map(|l| l.max_records_per_second)
    }

    /// Tuning options in key order.
    pub fn tuning(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.tuning
            .iter()
            .flat_map(|t| t.iter().map(|(k, v)| (k.as_str(), v)))
    }

    pub fn is_default(&self) -> bool {
        self.name == names::OUTPUT_DEFAULT
    }

    pub fn insecure_skip_verify(&self) -> bool {
        self.tls
            .as_ref()
            .map(|t| t.insecure_skip_verify)
            .unwrap_or(false)
    }

    /// True when the TLS block sets anything.
    pub fn has_tls_settings(&self) -> bool {
        self.tls
            .as_ref()
            .map(|t| t.insecure_skip_verify || t.security_profile.is_some())
            .unwrap_or(false)
    }

    /// The elasticsearch major version, defaulting to 6.
    pub fn elasticsearch_version(&self) -> u32 {
        self.type_spec
            .elasticsearch
            .as_ref()
            .and_then(|es| es.version)
            .filter(|v| *v > 0)
            .unwrap_or(names::DEFAULT_ES_VERSION)
    }

    /// The output's own security profile, if it names one that resolves.
    pub fn tls_profile(&self) -> Option<TlsProfile> {
        self.tls
            .as_ref()
            .and_then(|t| t.security_profile.as_ref())
            .and_then(TlsSecurityProfile::resolve)
    }
}

// === impl TlsSecurityProfile ===

impl TlsSecurityProfile {
    pub fn resolve(&self) -> Option<TlsProfile> {
        if self.type_ == "Custom" {
            return self
                .custom
                .as_ref()
                .map(|c| TlsProfile::new(c.min_tls_version.clone(), c.ciphers.clone()));
        }
        TlsProfile::named(&self.type_)
    }
}

impl ElasticsearchStructuredSpec {
    pub fn is_empty(&self) -> bool {
        self.structured_type_key.is_none()
            && self.structured_type_name.is_none()
            && !self.enable_structured_container_logs
    }
}
