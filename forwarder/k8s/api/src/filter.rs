use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A named transform applied by the pipelines that reference it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub name: String,

    /// One of `kubeAPIAudit`, `drop` or `prune`.
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(
        rename = "kubeAPIAudit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub kube_api_audit: Option<KubeApiAudit>,

    /// Records matching any test are dropped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop: Vec<DropTest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prune: Option<PruneFilterSpec>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterType {
    KubeApiAudit,
    Drop,
    Prune,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized filter type: {0:?}")]
pub struct UnknownFilterType(pub String);

/// A conjunction of conditions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DropTest {
    #[serde(rename = "test", default)]
    pub conditions: Vec<DropCondition>,
}

/// Tests the value at a dotted field path against a regular expression.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DropCondition {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_matches: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PruneFilterSpec {
    /// Fields removed from each record.
    #[serde(rename = "in", default, skip_serializing_if = "Vec::is_empty")]
    pub in_: Vec<String>,

    /// Fields kept; everything else is removed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_in: Vec<String>,
}

/// An audit policy applied to kube-apiserver audit events.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubeApiAudit {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<PolicyRule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub omit_stages: Vec<String>,

    /// Events with these response codes are dropped. Defaults to
    /// 404, 409, 422 and 429.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omit_response_codes: Option<Vec<i32>>,
}

/// A kube-apiserver audit policy rule. Name fields accept `*` wildcards.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    /// `None`, `Metadata`, `Request` or `RequestResponse`.
    pub level: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verbs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<GroupResources>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    #[serde(
        rename = "nonResourceURLs",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub non_resource_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub omit_stages: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupResources {
    #[serde(default)]
    pub group: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,
}

// === impl FilterType ===

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KubeApiAudit => "kubeAPIAudit",
            Self::Drop => "drop",
            Self::Prune => "prune",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl FromStr for FilterType {
    type Err = UnknownFilterType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kubeAPIAudit" => Ok(Self::KubeApiAudit),
            "drop" => Ok(Self::Drop),
            "prune" => Ok(Self::Prune),
            s => Err(UnknownFilterType(s.to_string())),
        }
    }
}

// === impl FilterSpec ===

impl FilterSpec {
    pub fn filter_type(&self) -> Option<FilterType> {
        self.type_.parse().ok()
    }

    pub fn drop(name: impl Into<String>, tests: Vec<DropTest>) -> Self {
        Self {
            name: name.into(),
            type_: FilterType::Drop.to_string(),
            drop: tests,
            ..Default::default()
        }
    }

    pub fn prune(name: impl Into<String>, in_: &[&str], not_in: &[&str]) -> Self {
        Self {
            name: name.into(),
            type_: FilterType::Prune.to_string(),
            prune: Some(PruneFilterSpec {
                in_: in_.iter().map(|s| s.to_string()).collect(),
                not_in: not_in.iter().map(|s| s.to_string()).collect(),
            }),
            ..Default::default()
        }
    }

    /// True when this prune filter would remove `field` from records.
    pub fn prunes(&self, field: &str) -> bool {
        let Some(prune) = self.prune.as_ref() else {
            return false;
        };
        if prune.in_.iter().any(|f| f == field) {
            return true;
        }
        !prune.not_in.is_empty() && !prune.not_in.iter().any(|f| f == field)
    }
}

impl DropCondition {
    pub fn matches(field: &str, regex: &str) -> Self {
        Self {
            field: field.to_string(),
            matches: Some(regex.to_string()),
            not_matches: None,
        }
    }

    pub fn not_matches(field: &str, regex: &str) -> Self {
        Self {
            field: field.to_string(),
            matches: None,
            not_matches: Some(regex.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn prune_semantics() {
        let blacklist = FilterSpec::prune("p", &[".hostname"], &[]);
        assert!(blacklist.prunes(".hostname"));
        assert!(!blacklist.prunes(".message"));

        let whitelist = FilterSpec::prune("p", &[], &[".log_type", ".message"]);
        assert!(whitelist.prunes(".hostname"));
        assert!(!whitelist.prunes(".message"));

        assert!(!FilterSpec::drop("d", vec![]).prunes(".hostname"));
    }

    #[test]
    fn deserializes_drop_tests() {
        let filter: FilterSpec = serde_yaml::from_str(
            r#"
name: d
type: drop
drop:
- test:
  - field: .kubernetes.namespace_name
    matches: busybox
  - field: .level
    notMatches: d.+
- test:
  - field: .log_type
    matches: application
"#,
        )
        .unwrap();
        assert_eq!(filter.filter_type(), Some(FilterType::Drop));
        assert_eq!(filter.drop.len(), 2);
        assert_eq!(
            filter.drop[0].conditions[1],
            DropCondition::not_matches(".level", "d.+")
        );
    }

    #[test]
    fn kube_api_audit_field_names() {
        let filter: FilterSpec = serde_yaml::from_str(
            r#"
name: audit-policy
type: kubeAPIAudit
kubeAPIAudit:
  omitStages: [RequestReceived]
  rules:
  - level: Metadata
    nonResourceURLs: ["/healthz*"]
"#,
        )
        .unwrap();
        let policy = filter.kube_api_audit.unwrap();
        assert_eq!(policy.omit_stages, vec!["RequestReceived"]);
        assert_eq!(policy.rules[0].non_resource_urls, vec!["/healthz*"]);
    }
}
