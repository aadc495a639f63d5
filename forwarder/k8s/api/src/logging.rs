use crate::status::Conditions;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const LOG_STORE_ELASTICSEARCH: &str = "elasticsearch";
pub const LOG_STORE_LOKISTACK: &str = "lokistack";
pub const VISUALIZATION_KIBANA: &str = "kibana";
pub const VISUALIZATION_OCP_CONSOLE: &str = "ocp-console";

/// The cluster's managed logging stack: log store, collector and
/// visualization.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "logging.openshift.io",
    version = "v1",
    kind = "ClusterLogging",
    status = "ClusterLoggingStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLoggingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_store: Option<LogStoreSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionSpec>,

    /// Deprecated; superseded by `collection.fluentd`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarder: Option<ForwarderSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<VisualizationSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLoggingStatus {
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogStoreSpec {
    /// `elasticsearch` or `lokistack`.
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lokistack: Option<LokiStackStoreSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LokiStackStoreSpec {
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogStoreKind {
    Elasticsearch,
    LokiStack,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSpec {
    /// `vector` or `fluentd`.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub type_: String,

    /// Deprecated; superseded by `type` and `fluentd`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<LogCollectionSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fluentd: Option<FluentdForwarderSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogCollectionSpec {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fluentd: Option<FluentdForwarderSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForwarderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fluentd: Option<FluentdForwarderSpec>,
}

/// Fluentd buffer and file-reader tuning.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FluentdForwarderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_file: Option<FluentdInFileSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer: Option<FluentdBufferSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FluentdInFileSpec {
    pub read_lines_limit: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FluentdBufferSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_limit_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_limit_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflow_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationSpec {
    /// `kibana` or `ocp-console`.
    #[serde(rename = "type")]
    pub type_: String,
}

// === impl LogStoreKind ===

impl LogStoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elasticsearch => LOG_STORE_ELASTICSEARCH,
            Self::LokiStack => LOG_STORE_LOKISTACK,
        }
    }
}

impl fmt::Display for LogStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

// === impl ClusterLoggingSpec ===

impl ClusterLoggingSpec {
    pub fn log_store_kind(&self) -> Option<LogStoreKind> {
        match self.log_store.as_ref()?.type_.as_str() {
            LOG_STORE_ELASTICSEARCH => Some(LogStoreKind::Elasticsearch),
            LOG_STORE_LOKISTACK => Some(LogStoreKind::LokiStack),
            _ => None,
        }
    }

    /// The lokistack name when the log store is a lokistack.
    pub fn lokistack_name(&self) -> Option<&str> {
        let store = self.log_store.as_ref()?;
        if store.type_ != LOG_STORE_LOKISTACK {
            return None;
        }
        store
            .lokistack
            .as_ref()
            .map(|l| l.name.as_str())
            .filter(|n| !n.is_empty())
    }

    /// Fluentd tuning. Migration folds the deprecated locations into
    /// `collection.fluentd`.
    pub fn fluentd_tuning(&self) -> Option<&FluentdForwarderSpec> {
        self.collection.as_ref()?.fluentd.as_ref()
    }

    /// The collector type, preferring `collection.type` over the deprecated
    /// `collection.logs.type`.
    pub fn collector_type(&self) -> Option<&str> {
        let collection = self.collection.as_ref()?;
        if !collection.type_.is_empty() {
            return Some(collection.type_.as_str());
        }
        collection
            .logs
            .as_ref()
            .map(|l| l.type_.as_str())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lokistack_store() {
        let spec: ClusterLoggingSpec = serde_yaml::from_str(
            r#"
logStore:
  type: lokistack
  lokistack:
    name: lokistack-testing
collection:
  logs:
    type: fluentd
"#,
        )
        .unwrap();
        assert_eq!(spec.log_store_kind(), Some(LogStoreKind::LokiStack));
        assert_eq!(spec.lokistack_name(), Some("lokistack-testing"));
        assert_eq!(spec.collector_type(), Some("fluentd"));
    }

    #[test]
    fn fluentd_tuning_is_read_from_collection() {
        let spec: ClusterLoggingSpec = serde_yaml::from_str(
            r#"
collection:
  type: fluentd
  fluentd:
    buffer:
      chunkLimitSize: 1m
    inFile:
      readLinesLimit: 500
"#,
        )
        .unwrap();
        let tuning = spec.fluentd_tuning().expect("tuning is set");
        assert_eq!(
            tuning.buffer.as_ref().and_then(|b| b.chunk_limit_size.as_deref()),
            Some("1m")
        );
        assert_eq!(tuning.in_file.as_ref().map(|f| f.read_lines_limit), Some(500));
        assert_eq!(ClusterLoggingSpec::default().fluentd_tuning(), None);
    }

    #[test]
    fn elasticsearch_store_has_no_lokistack() {
        let spec = ClusterLoggingSpec {
            log_store: Some(LogStoreSpec {
                type_: LOG_STORE_ELASTICSEARCH.to_string(),
                lokistack: Some(LokiStackStoreSpec {
                    name: "ignored".to_string(),
                }),
            }),
            ..Default::default()
        };
        assert_eq!(spec.log_store_kind(), Some(LogStoreKind::Elasticsearch));
        assert_eq!(spec.lokistack_name(), None);
        assert_eq!(spec.collector_type(), None);
    }
}
