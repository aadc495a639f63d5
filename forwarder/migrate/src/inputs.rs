use crate::Extras;
use logging_forwarder_k8s_api::{names, ClusterLogForwarderSpec, InputSpec, ReceiverType};

/// Names anonymous pipelines `pipeline_<index>`.
pub(crate) fn name_pipelines(spec: &mut ClusterLogForwarderSpec) {
    for (i, p) in spec.pipelines.iter_mut().enumerate() {
        if p.name.is_empty() {
            p.name = format!("pipeline_{i}");
        }
    }
}

/// Sets a receiver's type from its only populated descriptor.
pub(crate) fn infer_receiver_types(spec: &mut ClusterLogForwarderSpec) {
    for receiver in spec.inputs.iter_mut().filter_map(|i| i.receiver.as_mut()) {
        if receiver.type_.is_none() {
            receiver.type_ = receiver.receiver_type().map(|t: ReceiverType| t.to_string());
        }
    }
}

/// Declares the reserved inputs that pipelines reference and flags them as
/// owned by migration.
///
/// A reserved input the user declared with anything but the canonical
/// descriptor stays as written and unflagged, so validation rejects it.
pub(crate) fn stub_reserved(spec: &mut ClusterLogForwarderSpec, extras: &mut Extras) {
    for name in names::RESERVED_INPUTS {
        if !spec.pipelines.iter().any(|p| p.references_input(name)) {
            continue;
        }
        let Some(stub) = InputSpec::reserved(name) else {
            continue;
        };
        match spec.inputs.iter().find(|i| i.name == name) {
            Some(declared) if *declared == stub => {}
            Some(_) => continue,
            None => spec.inputs.push(stub),
        }
        extras.set(names::migrate_input_flag(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logging_forwarder_k8s_api::{PipelineSpec, ReceiverSpec};
    use pretty_assertions::assert_eq;

    #[test]
    fn stubs_referenced_reserved_inputs() {
        let mut spec = ClusterLogForwarderSpec {
            pipelines: vec![PipelineSpec::new("p", &["infrastructure"], &["es"])],
            ..Default::default()
        };
        let mut extras = Extras::default();
        stub_reserved(&mut spec, &mut extras);
        assert_eq!(
            spec.inputs,
            vec![InputSpec::infrastructure("infrastructure", &["container", "node"])]
        );
        assert_eq!(extras.iter().collect::<Vec<_>>(), vec!["migrateInputInfrastructure"]);

        // A second pass recognises its own stub.
        let mut again = Extras::default();
        stub_reserved(&mut spec, &mut again);
        assert_eq!(spec.inputs.len(), 1);
        assert_eq!(again, extras);
    }

    #[test]
    fn user_redeclared_reserved_input_is_not_flagged() {
        let mut spec = ClusterLogForwarderSpec {
            inputs: vec![InputSpec::audit("application", &["auditd"])],
            pipelines: vec![PipelineSpec::new("p", &["application"], &["es"])],
            ..Default::default()
        };
        let mut extras = Extras::default();
        stub_reserved(&mut spec, &mut extras);
        assert_eq!(spec.inputs.len(), 1);
        assert!(extras.is_empty());
    }

    #[test]
    fn infers_receiver_type() {
        let mut receiver = ReceiverSpec::http(8443, "kubeAPIAudit");
        receiver.type_ = None;
        let mut spec = ClusterLogForwarderSpec {
            inputs: vec![InputSpec::receiver("rcv", receiver)],
            ..Default::default()
        };
        infer_receiver_types(&mut spec);
        let receiver = spec.inputs[0].receiver.as_ref().unwrap();
        assert_eq!(receiver.type_.as_deref(), Some("http"));
    }

    #[test]
    fn names_anonymous_pipelines_by_position() {
        let mut spec = ClusterLogForwarderSpec {
            pipelines: vec![
                PipelineSpec::new("", &["audit"], &["es"]),
                PipelineSpec::new("named", &["audit"], &["es"]),
                PipelineSpec::new("", &["audit"], &["es"]),
            ],
            ..Default::default()
        };
        name_pipelines(&mut spec);
        let names = spec.pipelines.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["pipeline_0", "named", "pipeline_2"]);
    }
}
