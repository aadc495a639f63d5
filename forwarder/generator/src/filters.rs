//! Transforms generated for user-defined filters.

use crate::{
    elements::{Filter, Remap},
    framework::Element,
};
use logging_forwarder_k8s_api::{
    filter::PolicyRule, DropTest, FilterSpec, FilterType, KubeApiAudit, PruneFilterSpec,
};

/// Response codes omitted when a kube API audit filter does not set them.
const DEFAULT_OMIT_RESPONSE_CODES: [i32; 4] = [404, 409, 422, 429];

/// The transform for `filter`, reading from `inputs`.
pub(crate) fn element(
    id: String,
    inputs: Vec<String>,
    filter: &FilterSpec,
) -> Option<Box<dyn Element>> {
    match filter.filter_type()? {
        FilterType::Drop => Some(Box::new(Filter {
            id,
            inputs,
            condition: format!("!({})", drop_expr(&filter.drop)),
        })),
        FilterType::Prune => {
            let prune = filter.prune.as_ref()?;
            Some(Box::new(Remap::new(id, inputs, prune_vrl(prune))))
        }
        FilterType::KubeApiAudit => {
            let audit = filter.kube_api_audit.clone().unwrap_or_default();
            Some(Box::new(Remap::new(id, inputs, kube_api_audit_vrl(&audit))))
        }
    }
}

/// An expression that is true for records any test matches. Tests are
/// disjoined in order; the conditions of a test are conjoined.
pub(crate) fn drop_expr(tests: &[DropTest]) -> String {
    let tests = tests
        .iter()
        .filter(|t| !t.conditions.is_empty())
        .map(|test| {
            let conditions = test
                .conditions
                .iter()
                .filter_map(|c| {
                    let path = vrl_path(&c.field);
                    let value = format!("to_string({path}) ?? \"\"");
                    if let Some(re) = c.matches.as_deref().filter(|m| !m.is_empty()) {
                        return Some(format!("match({value}, {})", regex_literal(re)));
                    }
                    let re = c.not_matches.as_deref().filter(|m| !m.is_empty())?;
                    Some(format!("!match({value}, {})", regex_literal(re)))
                })
                .collect::<Vec<_>>();
            format!("({})", conditions.join(" && "))
        })
        .collect::<Vec<_>>();
    if tests.is_empty() {
        return "false".to_string();
    }
    tests.join(" || ")
}

/// Removes the `in` fields, or keeps only the `notIn` fields.
pub(crate) fn prune_vrl(prune: &PruneFilterSpec) -> String {
    let mut vrl = prune
        .in_
        .iter()
        .map(|f| format!("del({})", vrl_path(f)))
        .collect::<Vec<_>>();
    if !prune.not_in.is_empty() {
        let keep = prune
            .not_in
            .iter()
            .map(|f| segments(f))
            .collect::<Vec<_>>();
        let keep = serde_json::to_string(&keep).unwrap_or_else(|_| "[]".to_string());
        vrl.push(format!(
            r#"notIn = {keep}
new_object = {{}}
for_each(notIn) -> |_index, pathSeg| {{
  val = get(., pathSeg) ?? null
  if !is_null(val) {{
    new_object = set(new_object, pathSeg, val) ?? new_object
  }}
}}
. = new_object"#
        ));
    }
    vrl.join("\n")
}

/// Applies a kube-apiserver style audit policy to audit events. Events that
/// are not kube API audit events pass through untouched.
pub(crate) fn kube_api_audit_vrl(audit: &KubeApiAudit) -> String {
    let codes = audit
        .omit_response_codes
        .clone()
        .unwrap_or_else(|| DEFAULT_OMIT_RESPONSE_CODES.to_vec());
    let mut vrl = vec![
        r#"if is_string(.auditID) && is_string(.stage) {"#.to_string(),
        format!(
            "  if includes({}, .stage) {{\n    abort\n  }}",
            string_array(&audit.omit_stages)
        ),
        format!(
            "  if includes({}, .responseStatus.code) {{\n    abort\n  }}",
            serde_json::to_string(&codes).unwrap_or_else(|_| "[]".to_string())
        ),
        r#"  username = string(.user.username) ?? """#.to_string(),
        r#"  groups = array(.user.groups) ?? []"#.to_string(),
        r#"  verb = string(.verb) ?? """#.to_string(),
        r#"  namespace = string(.objectRef.namespace) ?? """#.to_string(),
        r#"  group = string(.objectRef.apiGroup) ?? """#.to_string(),
        r#"  resource = string(.objectRef.resource) ?? """#.to_string(),
        r#"  if exists(.objectRef.subresource) {
    resource = resource + "/" + (string(.objectRef.subresource) ?? "")
  }"#
        .to_string(),
        r#"  name = string(.objectRef.name) ?? """#.to_string(),
        r#"  uri = string(.requestURI) ?? """#.to_string(),
    ];

    let rules = audit
        .rules
        .iter()
        .map(|rule| {
            let mut action = Vec::new();
            if !rule.omit_stages.is_empty() {
                action.push(format!(
                    "if includes({}, .stage) {{\n  abort\n}}",
                    string_array(&rule.omit_stages)
                ));
            }
            action.push(
                match rule.level.as_str() {
                    "None" => "abort",
                    "Metadata" => "del(.requestObject)\ndel(.responseObject)",
                    "Request" => "del(.responseObject)",
                    _ => "",
                }
                .to_string(),
            );
            action.push(format!(".k8s_audit_level = {:?}", rule.level));
            (rule_condition(rule), action.join("\n"))
        })
        .collect::<Vec<_>>();

    if !rules.is_empty() {
        let chain = rules
            .iter()
            .enumerate()
            .map(|(i, (condition, action))| {
                let keyword = if i == 0 { "if" } else { "} else if" };
                format!("{keyword} {condition} {{\n{}", indent(action))
            })
            .collect::<Vec<_>>()
            .join("\n");
        vrl.push(indent(&format!("{chain}\n}}")));
    }
    vrl.push("}".to_string());
    vrl.join("\n")
}

fn rule_condition(rule: &PolicyRule) -> String {
    let mut terms = Vec::new();
    if !rule.users.is_empty() {
        terms.push(any_name("username", &rule.users));
    }
    if !rule.user_groups.is_empty() {
        terms.push(format!(
            "length(filter(groups) -> |_index, g| {{ {} }}) > 0",
            any_name("(string(g) ?? \"\")", &rule.user_groups)
        ));
    }
    if !rule.verbs.is_empty() {
        terms.push(any_name("verb", &rule.verbs));
    }
    if !rule.namespaces.is_empty() {
        terms.push(any_name("namespace", &rule.namespaces));
    }
    if !rule.resources.is_empty() {
        let resources = rule
            .resources
            .iter()
            .map(|gr| {
                let mut t = vec![format!("group == {:?}", gr.group)];
                if !gr.resources.is_empty() {
                    t.push(any_name("resource", &gr.resources));
                }
                if !gr.resource_names.is_empty() {
                    t.push(any_name("name", &gr.resource_names));
                }
                format!("({})", t.join(" && "))
            })
            .collect::<Vec<_>>();
        terms.push(format!("({})", resources.join(" || ")));
    }
    if !rule.non_resource_urls.is_empty() {
        terms.push(any_name("uri", &rule.non_resource_urls));
    }
    if terms.is_empty() {
        return "true".to_string();
    }
    terms.join(" && ")
}

/// True when `value` equals any of `names`, where `*` matches any run of
/// characters.
fn any_name(value: &str, names: &[String]) -> String {
    let terms = names
        .iter()
        .map(|n| {
            if n.contains('*') {
                let re = n
                    .split('*')
                    .map(regex_escape)
                    .collect::<Vec<_>>()
                    .join(".*");
                format!("match({value}, {})", regex_literal(&format!("^{re}$")))
            } else {
                format!("{value} == {n:?}")
            }
        })
        .collect::<Vec<_>>();
    format!("({})", terms.join(" || "))
}

fn string_array(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn indent(s: &str) -> String {
    crate::framework::funcs::indent(2, s)
}

fn regex_escape(s: &str) -> String {
    s.chars()
        .flat_map(|c| {
            let special = "\\.+?()[]{}|^$".contains(c);
            special.then_some('\\').into_iter().chain(std::iter::once(c))
        })
        .collect()
}

/// A raw regex literal; only the quote needs escaping.
fn regex_literal(re: &str) -> String {
    format!("r'{}'", re.replace('\'', "\\'"))
}

/// Splits a dotted path into segments, honoring quoted segments such as
/// `.kubernetes.labels."app.kubernetes.io/name"`.
pub(crate) fn segments(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in path.trim_start_matches('.').chars() {
        match c {
            '"' => quoted = !quoted,
            '.' if !quoted => segments.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    segments.push(current);
    segments
}

/// A VRL path, quoting segments that are not plain identifiers.
pub(crate) fn vrl_path(path: &str) -> String {
    segments(path)
        .iter()
        .map(|s| {
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                format!(".{s}")
            } else {
                format!(".{s:?}")
            }
        })
        .collect()
}
