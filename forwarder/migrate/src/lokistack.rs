use crate::Warning;
use logging_forwarder_k8s_api::{
    names, ClusterLogForwarderSpec, InputSpec, OutputSpec, OutputType, PipelineSpec, Tenant,
};
use std::collections::BTreeMap;

/// The gateway endpoint of `lokistack` for one tenant.
pub(crate) fn gateway_url(lokistack: &str, namespace: &str, tenant: Tenant) -> String {
    format!("https://{lokistack}-gateway-http.{namespace}.svc:8080/api/logs/v1/{tenant}")
}

/// Splits each pipeline that sends to `default` into one pipeline per input,
/// routing each to the lokistack output of that input's tenant.
///
/// The first split pipeline keeps the original name; the others are suffixed
/// with their input's position. Other output refs are carried unchanged.
pub(crate) fn split(
    spec: &mut ClusterLogForwarderSpec,
    lokistack: &str,
    namespace: &str,
    warnings: &mut Vec<Warning>,
) {
    let mut tenant_outputs = BTreeMap::new();
    let mut pipelines = Vec::with_capacity(spec.pipelines.len());

    for p in std::mem::take(&mut spec.pipelines) {
        if !p.references_output(names::OUTPUT_DEFAULT) {
            pipelines.push(p);
            continue;
        }

        warnings.push(Warning::migrated(format!(
            "pipeline {:?} was split by tenant to forward to lokistack {:?}",
            p.name, lokistack,
        )));
        for (i, input) in p.input_refs.iter().enumerate() {
            let tenant = input_tenant(&spec.inputs, input);
            let mut split = PipelineSpec {
                input_refs: vec![input.clone()],
                ..p.clone()
            };
            if i > 0 {
                split.name = format!("{}-{}", p.name, i);
            }
            if let Some(tenant) = tenant {
                let output = names::default_loki_output(tenant);
                for o in split
                    .output_refs
                    .iter_mut()
                    .filter(|o| o.as_str() == names::OUTPUT_DEFAULT)
                {
                    *o = output.clone();
                }
                tenant_outputs.entry(output).or_insert(tenant);
            } else {
                tracing::debug!(pipeline = %p.name, %input, "Input has no tenant; leaving default output");
            }
            pipelines.push(split);
        }
    }
    spec.pipelines = pipelines;

    for (name, tenant) in tenant_outputs {
        if spec.outputs.iter().any(|o| o.name == name) {
            continue;
        }
        spec.outputs.push(OutputSpec::new(
            name,
            OutputType::Loki,
            Some(gateway_url(lokistack, namespace, tenant).as_str()),
        ));
    }
}

/// The tenant of a reserved input, or of a declared input by its descriptor.
fn input_tenant(inputs: &[InputSpec], name: &str) -> Option<Tenant> {
    if let Ok(tenant) = name.parse::<Tenant>() {
        return Some(tenant);
    }
    inputs
        .iter()
        .find(|i| i.name == name)
        .and_then(|i| i.tenants().into_iter().next())
}
