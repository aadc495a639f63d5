//! Routing from tenant labels into pipeline labels, and from pipeline labels
//! into output labels.

use super::{boxed, label_name, tenant_label, Directive};
use crate::framework::{Part, Section};
use logging_forwarder_core::Tenant;
use logging_forwarder_k8s_api::{ClusterLogForwarderSpec, InputSpec, PipelineSpec};
use std::borrow::Cow;

/// One label per collected tenant, each routing its records into the labels
/// of the pipelines that read it.
pub(super) fn tenants(
    spec: &ClusterLogForwarderSpec,
    inputs: &[Cow<'_, InputSpec>],
) -> Vec<Part> {
    let mut parts = Vec::new();
    for tenant in [Tenant::Application, Tenant::Infrastructure, Tenant::Audit] {
        let readers = spec
            .pipelines
            .iter()
            .filter_map(|p| {
                let read = inputs
                    .iter()
                    .filter(|i| p.input_refs.contains(&i.name) && reads(i, tenant))
                    .map(|i| &**i)
                    .collect::<Vec<_>>();
                (!read.is_empty()).then_some((p, read))
            })
            .collect::<Vec<_>>();
        if readers.is_empty() {
            continue;
        }

        let comment = format!("Routing {} logs to pipelines", tenant.as_str());
        let mut label = Directive::with_arg("label", tenant_label(tenant)).child(
            Directive::typed("filter", Some("**"), "record_modifier")
                .record([("log_type", tenant.as_str())]),
        );
        if tenant != Tenant::Application {
            let pipelines = readers
                .iter()
                .map(|(p, _)| label_name(&p.name))
                .collect::<Vec<_>>();
            label = label.child(fan_out(&pipelines));
            parts.push(Part::from(Section::new(comment, vec![boxed(label)])));
            continue;
        }

        // Pipelines with an unrestricted input read every application record
        // and need no routing.
        let mut all = Vec::new();
        let mut routes = Vec::new();
        for (pipeline, read) in &readers {
            let pipeline_label = label_name(&pipeline.name);
            if read.iter().any(|i| is_unrestricted(i)) {
                all.push(pipeline_label);
                continue;
            }
            routes.extend(read.iter().map(|i| route(&pipeline_label, i)));
        }
        if routes.is_empty() {
            label = label.child(fan_out(&all));
            parts.push(Part::from(Section::new(comment, vec![boxed(label)])));
            continue;
        }

        let all_label = format!("{}_ALL", tenant_label(tenant));
        if !all.is_empty() {
            routes.push(
                Directive::new("route")
                    .param("@label", &all_label)
                    .child(Directive::new("match")),
            );
        }
        label =
            label.child(Directive::typed("match", Some("**"), "label_router").children(routes));
        let mut elements = vec![boxed(label)];
        if !all.is_empty() {
            elements.push(boxed(Directive::with_arg("label", all_label).child(fan_out(&all))));
        }
        parts.push(Part::from(Section::new(comment, elements)));
    }
    parts
}

/// The label of `pipeline`: it attaches the pipeline's labels, folds
/// multiline errors, parses JSON messages when asked and copies records to
/// each output.
pub(super) fn pipeline(pipeline: &PipelineSpec) -> Part {
    let mut label = Directive::with_arg("label", label_name(&pipeline.name));
    if !pipeline.labels.is_empty() {
        let labels =
            serde_json::to_string(&pipeline.labels).unwrap_or_else(|_| "{}".to_string());
        label = label.child(
            Directive::typed("filter", Some("**"), "record_transformer").child(
                Directive::new("record")
                    .param("openshift", format!("{{ \"labels\": {labels} }}")),
            ),
        );
    }
    if pipeline.detect_multiline_errors {
        label = label.child(
            Directive::typed("match", Some("kubernetes.**"), "detect_exceptions")
                .param("remove_tag_prefix", "'kubernetes'")
                .param("message", "message")
                .param("force_line_breaks", true)
                .param("multiline_flush_interval", ".2"),
        );
    }
    if pipeline.parse.as_deref() == Some("json") {
        label = label.child(
            Directive::typed("filter", Some("**"), "parser")
                .param("key_name", "message")
                .param("reserve_data", "yes")
                .param("hash_value_field", "structured")
                .child(Directive::typed("parse", None, "json").param("json_parser", "oj")),
        );
    }
    let outputs = pipeline
        .output_refs
        .iter()
        .map(|o| label_name(o))
        .collect::<Vec<_>>();
    label = label.child(fan_out(&outputs));
    Part::from(Section::new(
        format!("Copying pipeline {} to outputs", pipeline.name),
        vec![boxed(label)],
    ))
}

/// Relabels every record to `labels`, deep copying when there are several.
fn fan_out(labels: &[String]) -> Directive {
    match labels {
        [label] => Directive::typed("match", Some("**"), "relabel").param("@label", label),
        labels => Directive::typed("match", Some("**"), "copy")
            .param("copy_mode", "deep")
            .children(labels.iter().map(|label| {
                Directive::typed("store", None, "relabel").param("@label", label)
            })),
    }
}

fn reads(input: &InputSpec, tenant: Tenant) -> bool {
    if input.receiver.is_some() {
        return false;
    }
    match tenant {
        Tenant::Application => input.application.is_some(),
        Tenant::Infrastructure => !input.infrastructure_sources().is_empty(),
        Tenant::Audit => !input.audit_sources().is_empty(),
    }
}

fn is_unrestricted(input: &InputSpec) -> bool {
    input
        .application
        .as_ref()
        .map_or(true, |a| a.namespaces.is_empty() && a.selector.is_none())
}

/// A `label_router` route sending records from the namespaces and with the
/// labels `input` selects to `label`.
fn route(label: &str, input: &InputSpec) -> Directive {
    let app = input.application.as_ref();
    let namespaces = app
        .map(|a| a.namespaces.join(", "))
        .filter(|n| !n.is_empty());
    let labels = app
        .and_then(|a| a.selector.as_ref())
        .map(|s| {
            s.match_labels
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|l| !l.is_empty());
    Directive::new("route").param("@label", label).child(
        Directive::new("match")
            .param_opt("namespaces", namespaces)
            .param_opt("labels", labels),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use logging_forwarder_k8s_api::{
        input::{LabelSelector, INFRA_SOURCE_NODE},
        Application,
    };
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    fn render(parts: &[Part]) -> String {
        parts
            .iter()
            .map(|p| match p {
                Part::Template(t) => t.template(),
                Part::Structured(_) => unreachable!("routes are templates"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn namespaced(name: &str, namespaces: &[&str]) -> InputSpec {
        InputSpec::application(
            name,
            Application {
                namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        )
    }

    fn spec(pipelines: Vec<PipelineSpec>) -> ClusterLogForwarderSpec {
        ClusterLogForwarderSpec {
            pipelines,
            ..Default::default()
        }
    }

    #[test]
    fn restricted_applications_are_routed_by_namespace() {
        let mut selected = namespaced("selected", &["ns-a", "ns-b"]);
        if let Some(app) = selected.application.as_mut() {
            app.selector = Some(LabelSelector {
                match_labels: btreemap! { "team".to_string() => "blue".to_string() },
            });
        }
        let inputs = [
            Cow::Owned(selected),
            Cow::Owned(InputSpec::reserved("application").expect("application is reserved")),
        ];
        let spec = spec(vec![
            PipelineSpec::new("narrow", &["selected"], &["es"]),
            PipelineSpec::new("wide", &["application"], &["es"]),
        ]);
        let routes = render(&tenants(&spec, &inputs));
        assert!(routes.contains("@type label_router"), "{routes}");
        assert!(routes.contains(
            "<route>\n      @label @NARROW\n      <match>\n        namespaces ns-a, ns-b\n        labels team: blue\n      </match>\n    </route>"
        ));
        assert!(routes.contains("<route>\n      @label @_APPLICATION_ALL\n      <match>\n      </match>"));
        assert!(routes.contains("<label @_APPLICATION_ALL>\n  <match **>\n    @type relabel\n    @label @WIDE"));
    }

    #[test]
    fn unrestricted_applications_skip_the_router() {
        let inputs = [Cow::Owned(InputSpec::reserved("application").expect("reserved"))];
        let spec = spec(vec![
            PipelineSpec::new("one", &["application"], &["es"]),
            PipelineSpec::new("two", &["application"], &["kafka"]),
        ]);
        let routes = render(&tenants(&spec, &inputs));
        assert!(!routes.contains("label_router"), "{routes}");
        assert!(routes.contains("log_type application"));
        assert!(routes.contains(
            "@type copy\n    copy_mode deep\n    <store>\n      @type relabel\n      @label @ONE\n    </store>"
        ));
    }

    #[test]
    fn only_read_tenants_get_a_label() {
        let inputs = [Cow::Owned(InputSpec::infrastructure("nodes", &[INFRA_SOURCE_NODE]))];
        let spec = spec(vec![PipelineSpec::new("infra", &["nodes"], &["es"])]);
        let parts = tenants(&spec, &inputs);
        assert_eq!(parts.len(), 1);
        let routes = render(&parts);
        assert!(routes.contains("<label @_INFRASTRUCTURE>"));
        assert!(routes.contains("@type relabel\n    @label @INFRA"));
    }

    #[test]
    fn pipelines_label_parse_and_fold_errors() {
        let mut spec = PipelineSpec::new("apps", &["application"], &["es", "kafka"]);
        spec.labels = btreemap! { "env".to_string() => "prod".to_string() };
        spec.parse = Some("json".to_string());
        spec.detect_multiline_errors = true;
        let label = render(&[pipeline(&spec)]);
        assert!(label.contains("openshift { \"labels\": {\"env\":\"prod\"} }"), "{label}");
        assert!(label.contains("@type detect_exceptions"));
        assert!(label.contains("hash_value_field structured"));
        let detect = label.find("detect_exceptions").expect("errors are folded");
        let parse = label.find("@type parser").expect("messages are parsed");
        assert!(detect < parse);
        assert!(label.contains("@label @ES\n"));
        assert!(label.contains("@label @KAFKA\n"));
    }

    #[test]
    fn single_outputs_are_relabeled() {
        let label = render(&[pipeline(&PipelineSpec::new("p", &["audit"], &["es"]))]);
        assert!(!label.contains("@type copy"), "{label}");
        assert!(label.contains("<match **>\n    @type relabel\n    @label @ES\n  </match>"));
    }
}
