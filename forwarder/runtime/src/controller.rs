use crate::{
    access::ReviewedAccess,
    core::{CancellationToken, CollectorKind, ServiceRequirement, StaticResources},
    generator::Generated,
    index::{ForwarderId, SharedIndex, Snapshot},
    k8s::{self, names, ClusterLogForwarder, ClusterLogForwarderStatus, Resource},
    metrics::{Applied, ControllerMetrics, ReconcileResult},
    reconcile::{self, Input, Outcome, ReconcileError},
};
use anyhow::{Context, Result};
use k8s_openapi::apimachinery::pkg::{apis::meta::v1::OwnerReference, util::intstr::IntOrString};
use std::collections::BTreeMap;
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    time,
};
use tracing::{info_span, Instrument};

const COMPONENT_LABEL: &str = "component";
const COMPONENT: &str = "collector";
const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

#[derive(Clone, Debug)]
pub struct Settings {
    /// The collector used when a forwarder's `ClusterLogging` names none.
    pub collector: CollectorKind,

    /// The namespace in which the log store is deployed.
    pub log_store_namespace: String,
    pub resources: StaticResources,
    pub reconcile_timeout: time::Duration,
    pub requeue_delay: time::Duration,
    pub field_manager: String,
}

/// Reconciles forwarders as the index publishes their IDs.
pub struct Controller {
    client: k8s::Client,
    index: SharedIndex,
    updates: UnboundedReceiver<ForwarderId>,
    requeues: UnboundedSender<ForwarderId>,
    settings: Settings,
    metrics: ControllerMetrics,
}

// === impl Controller ===

impl Controller {
    pub fn new(
        client: k8s::Client,
        index: SharedIndex,
        updates: UnboundedReceiver<ForwarderId>,
        requeues: UnboundedSender<ForwarderId>,
        settings: Settings,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            client,
            index,
            updates,
            requeues,
            settings,
            metrics,
        }
    }

    pub async fn run(mut self) {
        while let Some(id) = self.updates.recv().await {
            let span = info_span!("reconcile", namespace = %id.namespace, name = %id.name);
            self.process(id).instrument(span).await;
        }
        tracing::debug!("Update channel closed");
    }

    async fn process(&self, id: ForwarderId) {
        let start = time::Instant::now();
        let Some(snapshot) = self.index.read().snapshot(&id) else {
            tracing::debug!("ClusterLogForwarder deleted");
            self.metrics.reconciled(ReconcileResult::Deleted, start);
            return;
        };

        let deadline = start + self.settings.reconcile_timeout;
        let token = CancellationToken::new();
        let timer = tokio::spawn({
            let token = token.clone();
            async move {
                time::sleep_until(deadline).await;
                token.cancel();
            }
        });

        let access = self.review_access(&snapshot, deadline).await;
        let outcome = {
            let input = Input {
                namespace: &id.namespace,
                name: &id.name,
                annotations: &snapshot.forwarder.annotations,
                spec: &snapshot.forwarder.spec,
                logging: snapshot.logging.as_ref(),
                log_store_namespace: &self.settings.log_store_namespace,
                collector: self.settings.collector,
                secrets: &snapshot.secrets,
                resources: &self.settings.resources,
                access: &access,
            };
            reconcile::reconcile(&input, &token)
        };
        timer.abort();

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(ReconcileError::Cancelled(cancelled)) => {
                tracing::warn!(%cancelled, "Reconcile timed out");
                self.metrics.reconciled(ReconcileResult::Cancelled, start);
                self.requeue(id);
                return;
            }
        };

        let mut requeue = outcome.is_transient();
        if let Some(config) = outcome.config.as_ref() {
            if let Err(error) = self.apply_config(&snapshot, outcome.collector, config).await {
                tracing::error!(error = ?error, "Failed to apply collector configuration");
                requeue = true;
            }
        }
        if let Err(error) = self.publish_status(&snapshot, &outcome).await {
            tracing::error!(error = ?error, "Failed to patch ClusterLogForwarder status");
            requeue = true;
        }

        let result = if outcome.is_transient() {
            ReconcileResult::Transient
        } else if outcome.status.is_ready() {
            ReconcileResult::Ready
        } else {
            ReconcileResult::NotReady
        };
        self.metrics.reconciled(result, start);
        if requeue {
            self.requeue(id);
        }
    }

    /// Reviews the forwarder's service account. The legacy forwarder is not
    /// reviewed.
    async fn review_access(&self, snapshot: &Snapshot, deadline: time::Instant) -> ReviewedAccess {
        let id = &snapshot.id;
        if names::is_legacy(&id.namespace, &id.name) {
            return ReviewedAccess::default();
        }
        match snapshot.forwarder.spec.service_account_name.as_deref() {
            Some(sa) if !sa.is_empty() => {
                ReviewedAccess::review(&self.client, &id.namespace, sa, deadline).await
            }
            _ => ReviewedAccess::default(),
        }
    }

    async fn apply_config(
        &self,
        snapshot: &Snapshot,
        collector: CollectorKind,
        config: &Generated,
    ) -> Result<()> {
        let id = &snapshot.id;
        let params = k8s::PatchParams::apply(&self.settings.field_manager).force();

        let cm = config_map(snapshot, collector, config);
        let cm_name = config_map_name(&id.name);
        let api = k8s::Api::<k8s::ConfigMap>::namespaced(self.client.clone(), &id.namespace);
        let res = api.patch(&cm_name, &params, &k8s::Patch::Apply(&cm)).await;
        self.metrics.applied(Applied::ConfigMap, res.is_ok());
        res.with_context(|| format!("applying ConfigMap {cm_name}"))?;
        tracing::debug!(configmap = %cm_name, "Applied collector configuration");

        let api = k8s::Api::<k8s::Service>::namespaced(self.client.clone(), &id.namespace);
        for requirement in &config.services {
            let svc = service(snapshot, requirement);
            let res = api
                .patch(&requirement.name, &params, &k8s::Patch::Apply(&svc))
                .await;
            self.metrics.applied(Applied::Service, res.is_ok());
            res.with_context(|| format!("applying Service {}", requirement.name))?;
        }
        Ok(())
    }

    /// Patches the forwarder's status when it differs from the last published
    /// status.
    async fn publish_status(&self, snapshot: &Snapshot, outcome: &Outcome) -> Result<()> {
        let Some(status) = next_status(snapshot.forwarder.status.as_ref(), &outcome.status) else {
            tracing::trace!("Status unchanged");
            return Ok(());
        };

        let id = &snapshot.id;
        let api = k8s::Api::<ClusterLogForwarder>::namespaced(self.client.clone(), &id.namespace);
        let patch = status_patch(snapshot.forwarder.status.as_ref(), &status)
            .context("encoding status")?;
        let patch = k8s::Patch::Merge(patch);
        let params = k8s::PatchParams::apply(&self.settings.field_manager);
        let res = api.patch_status(&id.name, &params, &patch).await;
        self.metrics.applied(Applied::Status, res.is_ok());
        res.context("patching status")?;

        tracing::info!(ready = status.is_ready(), "Published status");
        self.index.write().set_status(id, status);
        Ok(())
    }

    fn requeue(&self, id: ForwarderId) {
        let requeues = self.requeues.clone();
        let delay = self.settings.requeue_delay;
        tokio::spawn(async move {
            time::sleep(delay).await;
            tracing::debug!(%id, "Requeuing reconcile");
            let _ = requeues.send(id);
        });
    }
}

/// The status to publish, or `None` when `prior` already says the same.
/// Conditions that did not change keep their transition time.
fn next_status(
    prior: Option<&ClusterLogForwarderStatus>,
    new: &ClusterLogForwarderStatus,
) -> Option<ClusterLogForwarderStatus> {
    let mut status = prior.cloned().unwrap_or_default();
    status.synchronize(new);
    if Some(&status) == prior {
        return None;
    }
    Some(status)
}

/// A merge patch that replaces the published status with `status`.
///
/// Merge patches keep the keys they omit, so entities that no longer exist
/// are removed with explicit nulls.
fn status_patch(
    prior: Option<&ClusterLogForwarderStatus>,
    status: &ClusterLogForwarderStatus,
) -> serde_json::Result<serde_json::Value> {
    let mut patch = serde_json::to_value(status)?;
    if let (Some(prior), Some(fields)) = (prior, patch.as_object_mut()) {
        if status.conditions.is_empty() && !prior.conditions.is_empty() {
            fields.insert("conditions".to_string(), serde_json::Value::Null);
        }
        let sections = [
            ("inputs", &prior.inputs, &status.inputs),
            ("outputs", &prior.outputs, &status.outputs),
            ("filters", &prior.filters, &status.filters),
            ("pipelines", &prior.pipelines, &status.pipelines),
        ];
        for (key, old, new) in sections {
            let removed = old
                .names()
                .filter(|name| new.get(name).is_none())
                .map(|name| (name.to_string(), serde_json::Value::Null))
                .collect::<serde_json::Map<_, _>>();
            if removed.is_empty() {
                continue;
            }
            let section = fields
                .entry(key)
                .or_insert_with(|| serde_json::Value::Object(Default::default()));
            if let Some(section) = section.as_object_mut() {
                section.extend(removed);
            }
        }
    }
    Ok(serde_json::json!({ "status": patch }))
}

fn config_map_name(forwarder: &str) -> String {
    format!("{forwarder}-config")
}

fn labels(snapshot: &Snapshot) -> BTreeMap<String, String> {
    BTreeMap::from([
        (COMPONENT_LABEL.to_string(), COMPONENT.to_string()),
        (INSTANCE_LABEL.to_string(), snapshot.id.name.clone()),
    ])
}

/// Makes the forwarder own the resources generated for it, so they are
/// deleted with it.
fn owner_references(snapshot: &Snapshot) -> Option<Vec<OwnerReference>> {
    let uid = snapshot.forwarder.uid.clone()?;
    Some(vec![OwnerReference {
        api_version: ClusterLogForwarder::api_version(&()).into_owned(),
        kind: ClusterLogForwarder::kind(&()).into_owned(),
        name: snapshot.id.name.clone(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    }])
}

/// The generated document, keyed by the collector's configuration file name.
fn config_map(snapshot: &Snapshot, collector: CollectorKind, config: &Generated) -> k8s::ConfigMap {
    k8s::ConfigMap {
        metadata: k8s::ObjectMeta {
            name: Some(config_map_name(&snapshot.id.name)),
            namespace: Some(snapshot.id.namespace.clone()),
            labels: Some(labels(snapshot)),
            owner_references: owner_references(snapshot),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            collector.config_file().to_string(),
            config.document.clone(),
        )])),
        ..Default::default()
    }
}

fn service(snapshot: &Snapshot, requirement: &ServiceRequirement) -> k8s::Service {
    k8s::Service {
        metadata: k8s::ObjectMeta {
            name: Some(requirement.name.clone()),
            namespace: Some(snapshot.id.namespace.clone()),
            labels: Some(labels(snapshot)),
            owner_references: owner_references(snapshot),
            ..Default::default()
        },
        spec: Some(k8s::ServiceSpec {
            selector: Some(labels(snapshot)),
            ports: Some(vec![k8s::ServicePort {
                name: Some(requirement.name.clone()),
                port: i32::from(requirement.port),
                target_port: Some(IntOrString::Int(i32::from(requirement.target_port))),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
