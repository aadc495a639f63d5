use crate::{fail, Context, Fatal, Validate};
use logging_forwarder_k8s_api::{
    ClusterLogForwarderStatus, Condition, DropTest, FilterSpec, FilterType, KubeApiAudit,
    PruneFilterSpec,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Fields every record must keep.
const REQUIRED_FIELDS: [&str; 2] = [".log_type", ".message"];

const AUDIT_LEVELS: [&str; 4] = ["None", "Metadata", "Request", "RequestResponse"];
const AUDIT_STAGES: [&str; 4] = [
    "RequestReceived",
    "ResponseStarted",
    "ResponseComplete",
    "Panic",
];

// Segments are bare words or fully quoted, e.g. `.kubernetes."app.io/name"`.
static FIELD_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\.[a-zA-Z0-9_-]+|\."[^"]+")(\.[a-zA-Z0-9_-]+|\."[^"]+")*$"#)
        .expect("field path regex must compile")
});

/// Checks each declared filter on its own.
pub(crate) struct Filters;

impl Validate for Filters {
    fn name(&self) -> &'static str {
        "filters"
    }

    fn validate(
        &self,
        cx: &Context<'_>,
        status: &mut ClusterLogForwarderStatus,
    ) -> Result<(), Fatal> {
        let mut seen = BTreeSet::new();

        for (i, filter) in cx.spec.filters.iter().enumerate() {
            if filter.name.is_empty() {
                fail(
                    &mut status.filters,
                    &format!("filter_{i}_"),
                    Condition::invalid("filter must have a name"),
                );
                continue;
            }
            if !seen.insert(filter.name.as_str()) {
                fail(
                    &mut status.filters,
                    &filter.name,
                    Condition::invalid(format!("duplicate name: {:?}", filter.name)),
                );
                continue;
            }

            let errors = check(filter);
            if errors.is_empty() {
                status.filters.set(&filter.name, Condition::ready());
            } else {
                fail(
                    &mut status.filters,
                    &filter.name,
                    Condition::invalid(errors.join("; ")),
                );
            }
        }
        Ok(())
    }
}

fn check(filter: &FilterSpec) -> Vec<String> {
    match filter.filter_type() {
        None => vec![format!(
            "filter {:?}: unknown filter type {:?}",
            filter.name, filter.type_
        )],
        Some(FilterType::Drop) => check_drop(&filter.drop),
        Some(FilterType::Prune) => filter.prune.as_ref().map(check_prune).unwrap_or_default(),
        Some(FilterType::KubeApiAudit) => filter
            .kube_api_audit
            .as_ref()
            .map(check_kube_api_audit)
            .unwrap_or_default(),
    }
}

/// Errors are prefixed with the position of the test they belong to.
fn check_drop(tests: &[DropTest]) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, test) in tests.iter().enumerate() {
        for cond in &test.conditions {
            if let Err(error) = check_field_path(&cond.field) {
                errors.push(format!("test[{i}]: {error}"));
            }
            let matches = cond.matches.as_deref().filter(|m| !m.is_empty());
            let not_matches = cond.not_matches.as_deref().filter(|m| !m.is_empty());
            if matches.is_some() && not_matches.is_some() {
                errors.push(format!(
                    "test[{i}]: only one of matches or notMatches can be defined at once"
                ));
            }
            if let Some(re) = matches.or(not_matches) {
                if Regex::new(re).is_err() {
                    errors.push(format!(
                        "test[{i}]: matches/notMatches must be a valid regular expression."
                    ));
                }
            }
        }
    }
    errors
}

fn check_prune(prune: &PruneFilterSpec) -> Vec<String> {
    let mut errors = prune
        .in_
        .iter()
        .chain(&prune.not_in)
        .filter_map(|f| check_field_path(f).err())
        .collect::<Vec<_>>();

    let removed = prune
        .in_
        .iter()
        .filter(|f| REQUIRED_FIELDS.contains(&f.as_str()))
        .collect::<Vec<_>>();
    if !removed.is_empty() {
        errors.push(format!(
            "{removed:?} is/are required fields and must be removed from the `in` list."
        ));
    }

    if !prune.not_in.is_empty() {
        let missing = REQUIRED_FIELDS
            .iter()
            .filter(|f| !prune.not_in.iter().any(|n| n == *f))
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            errors.push(format!(
                "{missing:?} is/are required fields and must be included in the `notIn` list."
            ));
        }
    }
    errors
}

fn check_kube_api_audit(audit: &KubeApiAudit) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, rule) in audit.rules.iter().enumerate() {
        if !AUDIT_LEVELS.contains(&rule.level.as_str()) {
            errors.push(format!("rules[{i}]: invalid level {:?}", rule.level));
        }
        for stage in rule.omit_stages.iter().filter(|s| !AUDIT_STAGES.contains(&s.as_str())) {
            errors.push(format!("rules[{i}]: invalid stage {stage:?}"));
        }
    }
    for stage in audit
        .omit_stages
        .iter()
        .filter(|s| !AUDIT_STAGES.contains(&s.as_str()))
    {
        errors.push(format!("invalid stage {stage:?}"));
    }
    errors
}

pub(crate) fn check_field_path(path: &str) -> Result<(), String> {
    if !path.starts_with('.') {
        return Err(format!("{path:?} must start with a '.'"));
    }
    if !FIELD_PATH.is_match(path) {
        return Err(format!(
            "{path:?} must be a valid dot delimited path expression (.kubernetes.container_name or .kubernetes.\"test-foo\")"
        ));
    }
    Ok(())
}
