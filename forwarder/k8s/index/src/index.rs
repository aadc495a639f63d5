use ahash::AHashMap as HashMap;
use logging_forwarder_core::{Secret, SecretSnapshot, SecretStore};
use logging_forwarder_k8s_api::{
    self as k8s, ClusterLogForwarder, ClusterLogForwarderSpec, ClusterLogForwarderStatus,
    ClusterLogging, ClusterLoggingSpec, ResourceExt,
};
use parking_lot::RwLock;
use std::{collections::BTreeMap, fmt, sync::Arc};
use tokio::sync::mpsc::UnboundedSender;

pub type SharedIndex = Arc<RwLock<Index>>;

/// Identifies a forwarder, and its sibling `ClusterLogging`.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ForwarderId {
    pub namespace: String,
    pub name: String,
}

/// The parts of a `ClusterLogForwarder` that reconciliation reads.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Forwarder {
    pub uid: Option<String>,
    pub annotations: BTreeMap<String, String>,
    pub spec: ClusterLogForwarderSpec,

    /// The most recently published status.
    pub status: Option<ClusterLogForwarderStatus>,
}

/// Everything a forwarder's reconcile depends on, copied out of the index.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub id: ForwarderId,
    pub forwarder: Forwarder,
    pub logging: Option<ClusterLoggingSpec>,

    /// The secrets of the forwarder's namespace.
    pub secrets: SecretSnapshot,
}

pub struct Index {
    updates: UnboundedSender<ForwarderId>,

    forwarders: HashMap<ForwarderId, Forwarder>,
    loggings: HashMap<ForwarderId, ClusterLoggingSpec>,
    secrets: SecretSnapshot,
}

// === impl ForwarderId ===

impl ForwarderId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ForwarderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl Index ===

impl Index {
    pub fn shared(updates: UnboundedSender<ForwarderId>) -> SharedIndex {
        Arc::new(RwLock::new(Self {
            updates,
            forwarders: HashMap::new(),
            loggings: HashMap::new(),
            secrets: SecretSnapshot::default(),
        }))
    }

    /// Copies out the state that reconciling `id` reads, or `None` if the
    /// forwarder no longer exists.
    pub fn snapshot(&self, id: &ForwarderId) -> Option<Snapshot> {
        let forwarder = self.forwarders.get(id)?.clone();
        Some(Snapshot {
            id: id.clone(),
            forwarder,
            logging: self.loggings.get(id).cloned(),
            secrets: self.secrets.namespace(&id.namespace),
        })
    }

    /// Records the status that was published for `id`, so that the next
    /// reconcile can preserve unchanged transition times.
    pub fn set_status(&mut self, id: &ForwarderId, status: ClusterLogForwarderStatus) {
        if let Some(forwarder) = self.forwarders.get_mut(id) {
            forwarder.status = Some(status);
        }
    }

    pub fn forwarders(&self, namespace: &str) -> usize {
        self.forwarders
            .keys()
            .filter(|id| id.namespace == namespace)
            .count()
    }

    pub fn loggings(&self, namespace: &str) -> usize {
        self.loggings
            .keys()
            .filter(|id| id.namespace == namespace)
            .count()
    }

    pub fn secrets(&self, namespace: &str) -> usize {
        self.secrets.len(namespace)
    }

    fn enqueue(&self, id: ForwarderId) {
        tracing::trace!(%id, "Enqueuing reconcile");
        if let Err(error) = self.updates.send(id) {
            tracing::error!(id = %error.0, "Failed to enqueue reconcile");
        }
    }

    /// Enqueues the forwarders of `namespace` that read the secret `name`.
    fn enqueue_secret_readers(&self, namespace: &str, name: &str) {
        let readers = self
            .forwarders
            .iter()
            .filter(|(id, fwd)| id.namespace == namespace && fwd.spec.secret_names().contains(name))
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();
        for id in readers {
            self.enqueue(id);
        }
    }
}

impl kubert::index::IndexNamespacedResource<ClusterLogForwarder> for Index {
    fn apply(&mut self, resource: ClusterLogForwarder) {
        let Some(namespace) = resource.namespace() else {
            tracing::warn!(name = %resource.name_any(), "Ignoring ClusterLogForwarder without a namespace");
            return;
        };
        let id = ForwarderId::new(namespace, resource.name_unchecked());
        let forwarder = Forwarder {
            uid: resource.uid(),
            annotations: resource.annotations().clone(),
            spec: resource.spec,
            status: resource.status,
        };

        // Status updates, including those the controller publishes, do not
        // require a reconcile.
        let changed = match self.forwarders.get(&id) {
            Some(prior) => {
                prior.uid != forwarder.uid
                    || prior.annotations != forwarder.annotations
                    || prior.spec != forwarder.spec
            }
            None => true,
        };
        self.forwarders.insert(id.clone(), forwarder);
        if changed {
            self.enqueue(id);
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        let id = ForwarderId::new(namespace, name);
        if self.forwarders.remove(&id).is_some() {
            tracing::debug!(%id, "ClusterLogForwarder deleted");
        }
    }
}

impl kubert::index::IndexNamespacedResource<ClusterLogging> for Index {
    fn apply(&mut self, resource: ClusterLogging) {
        let Some(namespace) = resource.namespace() else {
            tracing::warn!(name = %resource.name_any(), "Ignoring ClusterLogging without a namespace");
            return;
        };
        let id = ForwarderId::new(namespace, resource.name_unchecked());
        if self.loggings.get(&id) == Some(&resource.spec) {
            return;
        }
        self.loggings.insert(id.clone(), resource.spec);
        if self.forwarders.contains_key(&id) {
            self.enqueue(id);
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        let id = ForwarderId::new(namespace, name);
        if self.loggings.remove(&id).is_some() && self.forwarders.contains_key(&id) {
            self.enqueue(id);
        }
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Secret> for Index {
    fn apply(&mut self, resource: k8s::Secret) {
        let Some(namespace) = resource.namespace() else {
            return;
        };
        let name = resource.name_unchecked();
        let mut secret = Secret::new(name.clone());
        for (key, value) in resource.data.into_iter().flatten() {
            secret.insert(key, value.0);
        }

        if self.secrets.get(&namespace, &name).ok().flatten().as_ref() == Some(&secret) {
            return;
        }
        self.secrets.insert(namespace.clone(), secret);
        self.enqueue_secret_readers(&namespace, &name);
    }

    fn delete(&mut self, namespace: String, name: String) {
        if self.secrets.remove(&namespace, &name).is_some() {
            self.enqueue_secret_readers(&namespace, &name);
        }
    }
}
