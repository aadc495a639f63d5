use crate::{fail, lookup_secret, Context, Fatal, Validate};
use logging_forwarder_core::{secret, CollectorKind};
use logging_forwarder_k8s_api::{
    input::{
        AUDIT_SOURCES, HTTP_FORMAT_KUBE_API_AUDIT, INFRA_SOURCES, SYSLOG_PROTOCOL_TCP,
        SYSLOG_PROTOCOL_UDP,
    },
    names, ClusterLogForwarderStatus, Condition, InputSpec, ReceiverSpec, ReceiverType,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{collections::BTreeSet, ops::RangeInclusive};

/// Ports below 1024 are privileged and the collector runs unprivileged.
const RECEIVER_PORTS: RangeInclusive<i32> = 1024..=65535;

static GLOB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9*_-]*$").expect("glob regex must compile"));

/// Checks each declared input on its own.
pub(crate) struct Inputs;

impl Validate for Inputs {
    fn name(&self) -> &'static str {
        "inputs"
    }

    fn validate(
        &self,
        cx: &Context<'_>,
        status: &mut ClusterLogForwarderStatus,
    ) -> Result<(), Fatal> {
        let mut seen = BTreeSet::new();
        let mut ports = BTreeSet::new();

        for (i, input) in cx.spec.inputs.iter().enumerate() {
            if input.name.is_empty() {
                fail(
                    &mut status.inputs,
                    &format!("input_{i}_"),
                    Condition::invalid("input must have a name"),
                );
                continue;
            }
            if names::is_reserved_input(&input.name)
                && !cx.extras.has(&names::migrate_input_flag(&input.name))
            {
                fail(
                    &mut status.inputs,
                    &input.name,
                    Condition::invalid(format!("input name {:?} is reserved", input.name)),
                );
                continue;
            }
            if !seen.insert(input.name.as_str()) {
                fail(
                    &mut status.inputs,
                    &input.name,
                    Condition::invalid(format!("duplicate name: {:?}", input.name)),
                );
                continue;
            }

            match check(cx, input, &mut ports)? {
                Ok(()) => {
                    status.inputs.set(&input.name, Condition::ready());
                }
                Err(condition) => fail(&mut status.inputs, &input.name, condition),
            }
        }
        Ok(())
    }
}

/// Returns the first problem with `input`, or a fatal lookup failure.
fn check(
    cx: &Context<'_>,
    input: &InputSpec,
    ports: &mut BTreeSet<i32>,
) -> Result<Result<(), Condition>, Fatal> {
    if input.descriptor_count() != 1 {
        return Ok(Err(Condition::invalid(
            "inputspec must define one and only one of: application, infrastructure, audit or receiver",
        )));
    }

    if let Some(app) = &input.application {
        if app.container_limit.is_some() && app.group_limit.is_some() {
            return Ok(Err(Condition::invalid(
                "inputspec must define only one of container or group limit",
            )));
        }
        if input.max_records_per_second().map(|n| n < 0).unwrap_or(false) {
            return Ok(Err(Condition::invalid(
                "inputspec cannot have a negative limit threshold",
            )));
        }
        let globs = app
            .namespaces
            .iter()
            .map(String::as_str)
            .chain(app.includes.iter().chain(&app.excludes).flat_map(|nc| {
                nc.namespace
                    .as_deref()
                    .into_iter()
                    .chain(nc.container.as_deref())
            }));
        for glob in globs {
            if !GLOB.is_match(glob) {
                return Ok(Err(Condition::invalid(format!(
                    "invalid glob for namespace or container: {glob:?}"
                ))));
            }
        }
    }

    if let Some(infra) = &input.infrastructure {
        if !infra.sources.iter().all(|s| INFRA_SOURCES.contains(&s.as_str())) {
            return Ok(Err(Condition::invalid(format!(
                "infrastructure inputs must define at least one valid source: {}",
                INFRA_SOURCES.join(","),
            ))));
        }
    }

    if let Some(audit) = &input.audit {
        if !audit.sources.iter().all(|s| AUDIT_SOURCES.contains(&s.as_str())) {
            let mut valid = AUDIT_SOURCES.to_vec();
            valid.sort_unstable();
            return Ok(Err(Condition::invalid(format!(
                "audit inputs must define at least one valid source: {}",
                valid.join(","),
            ))));
        }
    }

    if let Some(receiver) = &input.receiver {
        if let Err(condition) = check_receiver(cx, receiver, ports)? {
            return Ok(Err(condition));
        }
    }

    Ok(Ok(()))
}

fn check_receiver(
    cx: &Context<'_>,
    receiver: &ReceiverSpec,
    ports: &mut BTreeSet<i32>,
) -> Result<Result<(), Condition>, Fatal> {
    if cx.collector != CollectorKind::Vector {
        return Ok(Err(Condition::invalid(
            "ReceiverSpecs are only supported for the vector log collector",
        )));
    }

    let Some(type_) = receiver.receiver_type() else {
        return Ok(Err(Condition::invalid(
            "invalid Type specified for receiver",
        )));
    };

    match type_ {
        ReceiverType::Http => {
            if receiver.syslog.is_some() {
                return Ok(Err(Condition::invalid(
                    "mismatched Type specified for receiver, specified HTTP and have Syslog",
                )));
            }
            let Some(http) = &receiver.http else {
                return Ok(Err(Condition::invalid(
                    "invalid port specified for HTTP receiver",
                )));
            };
            if !RECEIVER_PORTS.contains(&http.port) {
                return Ok(Err(Condition::invalid(
                    "invalid port specified for HTTP receiver",
                )));
            }
            if http.format != HTTP_FORMAT_KUBE_API_AUDIT {
                return Ok(Err(Condition::invalid(
                    "invalid format specified for HTTP receiver",
                )));
            }
        }
        ReceiverType::Syslog => {
            if receiver.http.is_some() {
                return Ok(Err(Condition::invalid(
                    "mismatched Type specified for receiver, specified Syslog and have HTTP",
                )));
            }
            let Some(syslog) = &receiver.syslog else {
                return Ok(Err(Condition::invalid(
                    "invalid port specified for Syslog receiver",
                )));
            };
            if !RECEIVER_PORTS.contains(&syslog.port) {
                return Ok(Err(Condition::invalid(
                    "invalid port specified for Syslog receiver",
                )));
            }
            let protocol = receiver.syslog_protocol();
            if protocol != SYSLOG_PROTOCOL_TCP && protocol != SYSLOG_PROTOCOL_UDP {
                return Ok(Err(Condition::invalid(format!(
                    "invalid protocol specified for Syslog receiver: {protocol:?}"
                ))));
            }
        }
    }

    if let Some(port) = receiver.port() {
        if !ports.insert(port) {
            return Ok(Err(Condition::invalid(format!(
                "duplicate port {port} specified for receiver"
            ))));
        }
    }

    if let Some(name) = receiver.tls.as_ref().and_then(|t| t.secret_name.as_deref()) {
        match lookup_secret(cx, name)? {
            None => {
                return Ok(Err(Condition::missing_resource(format!(
                    "secret {name:?} not found"
                ))))
            }
            Some(s) if !s.has_keys(&[secret::TLS_CERT, secret::TLS_KEY]) => {
                return Ok(Err(Condition::missing_resource(format!(
                    "secret {name:?} must contain {:?} and {:?}",
                    secret::TLS_CERT,
                    secret::TLS_KEY,
                ))))
            }
            Some(_) => {}
        }
    }

    Ok(Ok(()))
}
