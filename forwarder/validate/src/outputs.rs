use crate::{fail, lookup_secret, Context, Fatal, Validate};
use logging_forwarder_core::{secret, LookupError, Secret};
use logging_forwarder_k8s_api::{
    names,
    output::{TUNING_BUFFER_WHEN_FULL, TUNING_OPTIONS, WHEN_FULL_POLICIES},
    url, ClusterLogForwarderStatus, Condition, OutputSpec, OutputType, Reason,
};
use std::collections::BTreeSet;

/// Checks each declared output on its own.
pub(crate) struct Outputs;

impl Validate for Outputs {
    fn name(&self) -> &'static str {
        "outputs"
    }

    fn validate(
        &self,
        cx: &Context<'_>,
        status: &mut ClusterLogForwarderStatus,
    ) -> Result<(), Fatal> {
        let mut seen = BTreeSet::new();

        for (i, output) in cx.spec.outputs.iter().enumerate() {
            if output.name.is_empty() {
                fail(
                    &mut status.outputs,
                    &format!("output_{i}_"),
                    Condition::invalid("output must have a name"),
                );
                continue;
            }
            if output.is_default() && !cx.extras.has(names::MIGRATE_DEFAULT_OUTPUT) {
                fail(
                    &mut status.outputs,
                    &output.name,
                    Condition::invalid(format!("output name {:?} is reserved", output.name)),
                );
                continue;
            }
            if !seen.insert(output.name.as_str()) {
                fail(
                    &mut status.outputs,
                    &output.name,
                    Condition::invalid(format!("duplicate name: {:?}", output.name)),
                );
                continue;
            }

            match check(cx, output)? {
                Ok(()) => {
                    status.outputs.set(&output.name, Condition::ready());
                }
                Err(condition) => fail(&mut status.outputs, &output.name, condition),
            }
        }
        Ok(())
    }
}

/// Returns the first problem with `output`, or a fatal lookup failure.
fn check(cx: &Context<'_>, output: &OutputSpec) -> Result<Result<(), Condition>, Fatal> {
    let Some(type_) = output.output_type() else {
        return Ok(Err(Condition::invalid(format!(
            "output {:?}: unknown output type {:?}",
            output.name, output.type_
        ))));
    };

    if let Err(condition) = check_url(output, type_) {
        return Ok(Err(condition));
    }
    if let Err(condition) = check_secret(cx, output, type_)? {
        return Ok(Err(condition));
    }
    if let Err(condition) = check_type_spec(output, type_) {
        return Ok(Err(condition));
    }
    if output.max_records_per_second().map(|n| n < 0).unwrap_or(false) {
        return Ok(Err(Condition::invalid(format!(
            "output {:?}: Output cannot have negative limit threshold",
            output.name
        ))));
    }
    if let Err(condition) = check_tuning(output) {
        return Ok(Err(condition));
    }

    if !cx
        .spec
        .pipelines
        .iter()
        .any(|p| p.references_output(&output.name))
    {
        return Ok(Err(Condition::not_ready(
            Reason::Unused,
            format!(
                "output {:?}: Output not referenced by any pipeline",
                output.name
            ),
        )));
    }

    if let Some(cw) = output.type_spec.cloudwatch.as_ref() {
        if cw.group_prefix.as_deref().unwrap_or_default().is_empty() {
            match cx.resources.cluster_infrastructure_name() {
                Ok(_) => {}
                Err(error @ LookupError::Timeout) => {
                    return Ok(Err(Condition::missing_resource(format!(
                        "outputprefix is not set and it can't be fetched from the cluster. Error: {error}"
                    ))))
                }
                Err(error @ LookupError::Unavailable(_)) => {
                    return Err(Fatal::Transient(format!(
                        "unable to read the cluster infrastructure name: {error}"
                    )))
                }
            }
        }
    }

    Ok(Ok(()))
}

fn check_url(output: &OutputSpec, type_: OutputType) -> Result<(), Condition> {
    if type_ == OutputType::Kafka {
        let brokers = output
            .url()
            .into_iter()
            .chain(
                output
                    .type_spec
                    .kafka
                    .iter()
                    .flat_map(|k| k.brokers.iter().map(String::as_str)),
            )
            .collect::<Vec<_>>();
        if brokers.is_empty() {
            return Err(Condition::invalid("no broker URLs specified"));
        }
        for broker in brokers {
            if let Err(error) = url::parse_absolute(broker) {
                return Err(Condition::invalid(format!("invalid URL: {error}")));
            }
        }
        return Ok(());
    }

    let Some(u) = output.url() else {
        if type_.url_required() {
            return Err(Condition::invalid(format!(
                "URL is required for output type {type_}"
            )));
        }
        return Ok(());
    };
    let uri = url::parse_absolute(u)
        .map_err(|error| Condition::invalid(format!("invalid URL: {error}")))?;
    if type_ == OutputType::Syslog {
        let scheme = uri.scheme_str().unwrap_or_default().to_ascii_lowercase();
        if !matches!(scheme.as_str(), "tcp" | "tls" | "udp") {
            return Err(Condition::invalid(format!(
                "invalid URL scheme: {}",
                uri.scheme_str().unwrap_or_default()
            )));
        }
    }
    Ok(())
}

fn check_secret(
    cx: &Context<'_>,
    output: &OutputSpec,
    type_: OutputType,
) -> Result<Result<(), Condition>, Fatal> {
    let Some(name) = output.secret_name() else {
        if type_ == OutputType::Splunk {
            return Ok(Err(Condition::missing_resource(format!(
                "A non-empty {} entry is required",
                secret::SPLUNK_HEC_TOKEN
            ))));
        }
        return Ok(Ok(()));
    };
    if name.is_empty() {
        return Ok(Err(Condition::invalid("secret has empty name")));
    }

    // The log store's secret is created along with the collector.
    if matches!(type_, OutputType::Elasticsearch | OutputType::Loki)
        && cx.extras.has(names::MIGRATE_DEFAULT_OUTPUT)
    {
        return Ok(Ok(()));
    }

    let Some(s) = lookup_secret(cx, name)? else {
        return Ok(Err(Condition::missing_resource(format!(
            "secret {name:?} not found"
        ))));
    };
    let checked = match type_ {
        OutputType::Cloudwatch => check_cloudwatch_keys(&s),
        OutputType::Splunk if !s.has_non_empty(secret::SPLUNK_HEC_TOKEN) => {
            Err(Condition::missing_resource(format!(
                "A non-empty {} entry is required",
                secret::SPLUNK_HEC_TOKEN
            )))
        }
        _ => Ok(()),
    };
    Ok(checked.and_then(|()| check_tls_keys(&s)))
}

fn check_cloudwatch_keys(s: &Secret) -> Result<(), Condition> {
    if s.aws_role_arn().is_some() {
        return Ok(());
    }
    if s.has_key(secret::AWS_ROLE_ARN) || s.has_key(secret::AWS_CREDENTIALS) {
        return Err(Condition::missing_resource(
            "auth keys: a 'role_arn' or 'credentials' key is required containing a valid arn value",
        ));
    }
    if !s.has_non_empty(secret::AWS_ACCESS_KEY_ID)
        || !s.has_non_empty(secret::AWS_SECRET_ACCESS_KEY)
    {
        return Err(Condition::missing_resource(format!(
            "auth keys: {} and {} are required",
            secret::AWS_ACCESS_KEY_ID,
            secret::AWS_SECRET_ACCESS_KEY,
        )));
    }
    Ok(())
}

/// Keys that are only usable together.
fn check_tls_keys(s: &Secret) -> Result<(), Condition> {
    let pairs = [
        (secret::TLS_CERT, secret::TLS_KEY),
        (secret::USERNAME, secret::PASSWORD),
    ];
    for (a, b) in pairs {
        match (s.has_non_empty(a), s.has_non_empty(b)) {
            (true, false) => {
                return Err(Condition::missing_resource(format!(
                    "cannot have {a} without {b}"
                )))
            }
            (false, true) => {
                return Err(Condition::missing_resource(format!(
                    "cannot have {b} without {a}"
                )))
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_type_spec(output: &OutputSpec, type_: OutputType) -> Result<(), Condition> {
    match type_ {
        OutputType::Cloudwatch if output.type_spec.cloudwatch.is_none() => {
            Err(Condition::invalid(format!(
                "output {:?}: Cloudwatch output requires type spec",
                output.name
            )))
        }
        OutputType::GoogleCloudLogging => {
            let ids = output.type_spec.google_cloud_logging.as_ref().map(|g| {
                [
                    &g.billing_account_id,
                    &g.folder_id,
                    &g.organization_id,
                    &g.project_id,
                ]
                .iter()
                .filter(|id| id.as_deref().map(|s| !s.is_empty()).unwrap_or(false))
                .count()
            });
            if ids != Some(1) {
                return Err(Condition::invalid(format!(
                    "output {:?}: Exactly one of billingAccountId, folderId, organizationId, or projectId must be set.",
                    output.name
                )));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_tuning(output: &OutputSpec) -> Result<(), Condition> {
    for (key, value) in output.tuning() {
        if !TUNING_OPTIONS.contains(&key) {
            return Err(Condition::invalid(format!(
                "output {:?}: unsupported tuning option {key:?}",
                output.name
            )));
        }
        let valid = if key == TUNING_BUFFER_WHEN_FULL {
            value
                .as_str()
                .map(|p| WHEN_FULL_POLICIES.contains(&p))
                .unwrap_or(false)
        } else {
            value.is_u64()
        };
        if !valid {
            return Err(Condition::invalid(format!(
                "output {:?}: invalid value for tuning option {key:?}: {value}",
                output.name
            )));
        }
    }
    Ok(())
}
