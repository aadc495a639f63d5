use crate::{fail, Context, Fatal, Validate};
use logging_forwarder_core::CollectorKind;
use logging_forwarder_k8s_api::{
    ClusterLogForwarderStatus, Condition, InputSpec, OutputSpec, OutputType,
};

const FLUENTD_OUTPUTS: [OutputType; 8] = [
    OutputType::Elasticsearch,
    OutputType::FluentdForward,
    OutputType::Syslog,
    OutputType::Kafka,
    OutputType::Cloudwatch,
    OutputType::Loki,
    OutputType::Http,
    OutputType::Splunk,
];

/// Each collector implements a subset of the output types. Fluentd also
/// lacks container selection, rate limits, output tuning and filters.
pub(crate) struct Compatibility;

pub(crate) fn supports(collector: CollectorKind, output: OutputType) -> bool {
    match collector {
        CollectorKind::Vector => output != OutputType::FluentdForward,
        CollectorKind::Fluentd => FLUENTD_OUTPUTS.contains(&output),
    }
}

impl Validate for Compatibility {
    fn name(&self) -> &'static str {
        "collector"
    }

    fn validate(
        &self,
        cx: &Context<'_>,
        status: &mut ClusterLogForwarderStatus,
    ) -> Result<(), Fatal> {
        for output in &cx.spec.outputs {
            // Unknown types are reported with the output.
            let Some(type_) = output.output_type() else {
                continue;
            };
            if !supports(cx.collector, type_) {
                fail(
                    &mut status.outputs,
                    &output.name,
                    Condition::invalid(format!(
                        "output {:?}: type {:?} is not supported by the {} collector",
                        output.name, output.type_, cx.collector,
                    )),
                );
            }
        }
        if cx.collector == CollectorKind::Fluentd {
            fluentd(cx, status);
        }
        Ok(())
    }
}

fn fluentd(cx: &Context<'_>, status: &mut ClusterLogForwarderStatus) {
    for input in &cx.spec.inputs {
        if let Some(feature) = fluentd_unsupported_input(input) {
            fail(
                &mut status.inputs,
                &input.name,
                Condition::invalid(format!(
                    "input {:?}: {feature} are not supported by the fluentd collector",
                    input.name
                )),
            );
        }
    }
    for output in &cx.spec.outputs {
        if let Some(feature) = fluentd_unsupported_output(output) {
            fail(
                &mut status.outputs,
                &output.name,
                Condition::invalid(format!(
                    "output {:?}: {feature} are not supported by the fluentd collector",
                    output.name
                )),
            );
        }
    }
    for filter in &cx.spec.filters {
        fail(
            &mut status.filters,
            &filter.name,
            Condition::invalid(format!(
                "filter {:?}: filters are not supported by the fluentd collector",
                filter.name
            )),
        );
    }
}

fn fluentd_unsupported_input(input: &InputSpec) -> Option<&'static str> {
    let app = input.application.as_ref()?;
    if !app.includes.is_empty() || !app.excludes.is_empty() {
        return Some("container includes and excludes");
    }
    if app.container_limit.is_some() || app.group_limit.is_some() {
        return Some("rate limits");
    }
    None
}

fn fluentd_unsupported_output(output: &OutputSpec) -> Option<&'static str> {
    if output.limit.is_some() {
        return Some("rate limits");
    }
    if output.tuning().next().is_some() {
        return Some("tuning options");
    }
    None
}
