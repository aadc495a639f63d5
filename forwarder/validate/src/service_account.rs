use crate::{fail, Context, Fatal, Validate};
use logging_forwarder_k8s_api::{names, ClusterLogForwarderStatus, Condition, Tenant};
use std::collections::BTreeMap;

/// A custom forwarder runs as its own service account, which must be allowed
/// to collect every tenant its pipelines read.
pub(crate) struct ServiceAccount;

impl Validate for ServiceAccount {
    fn name(&self) -> &'static str {
        "serviceaccount"
    }

    fn validate(
        &self,
        cx: &Context<'_>,
        status: &mut ClusterLogForwarderStatus,
    ) -> Result<(), Fatal> {
        if names::is_legacy(cx.namespace, cx.name) {
            return Ok(());
        }

        let sa = cx.spec.service_account_name.as_deref().unwrap_or_default();
        if cx.namespace == names::LEGACY_NAMESPACE && sa == names::DEFAULT_SERVICE_ACCOUNT {
            return Err(Fatal::Invalid(format!(
                "{} is a reserved serviceaccount name for legacy ClusterLogForwarder({}/{})",
                names::DEFAULT_SERVICE_ACCOUNT,
                names::LEGACY_NAMESPACE,
                names::SINGLETON_NAME,
            )));
        }
        if sa.is_empty() {
            return Err(Fatal::Invalid(
                "custom clusterlogforwarders must specify a service account name".to_string(),
            ));
        }

        let by_tenant = referenced_tenants(cx);
        for (tenant, inputs) in by_tenant {
            let allowed = cx
                .access
                .can_collect(sa, cx.namespace, tenant)
                .map_err(|error| {
                    Fatal::Transient(format!(
                        "unable to review access of service account {sa:?}: {error}"
                    ))
                })?;
            if allowed {
                continue;
            }
            tracing::debug!(namespace = %cx.namespace, name = %cx.name, serviceaccount = %sa, %tenant, "Service account may not collect");
            for input in inputs {
                fail(
                    &mut status.inputs,
                    input,
                    Condition::invalid(format!(
                        "insufficient permissions on service account, not authorized to collect {:?} logs",
                        tenant.as_str(),
                    )),
                );
            }
        }
        Ok(())
    }
}

/// The inputs referenced by pipelines, grouped by the tenants they read.
fn referenced_tenants<'a>(cx: &Context<'a>) -> BTreeMap<Tenant, Vec<&'a str>> {
    let declared = cx.spec.input_map();
    let mut by_tenant = BTreeMap::<Tenant, Vec<&str>>::new();
    for name in cx.spec.pipelines.iter().flat_map(|p| p.input_refs.iter()) {
        let tenants = match name.parse::<Tenant>() {
            Ok(tenant) => vec![tenant],
            Err(_) => declared.get(name.as_str()).map(|i| i.tenants()).unwrap_or_default(),
        };
        for tenant in tenants {
            let inputs = by_tenant.entry(tenant).or_default();
            if !inputs.contains(&name.as_str()) {
                inputs.push(name.as_str());
            }
        }
    }
    by_tenant
}
