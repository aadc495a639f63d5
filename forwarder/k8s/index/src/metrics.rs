//! Counts index updates by resource kind and namespace.

use crate::{Index, SharedIndex};
use kubert::index::{IndexNamespacedResource, NamespacedRemoved};
use logging_forwarder_k8s_api::{
    self as k8s, ClusterLogForwarder, ClusterLogging, Resource, ResourceExt,
};
use parking_lot::RwLock;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::sync::Arc;

/// Wraps the shared index, recording each watch event before applying it.
pub struct IndexMetrics {
    inner: SharedIndex,

    size: Family<NamespacedLabels, Gauge>,
    applies: Family<NamespacedLabels, Counter>,
    deletes: Family<NamespacedLabels, Counter>,
    resets: Family<KindLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct NamespacedLabels {
    namespace: String,
    kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: String,
}

/// A resource kind the index holds.
pub trait Indexed: Resource<DynamicType = ()> {
    /// The number of resources of this kind in `namespace`.
    fn count(index: &Index, namespace: &str) -> usize;
}

impl Indexed for ClusterLogForwarder {
    fn count(index: &Index, namespace: &str) -> usize {
        index.forwarders(namespace)
    }
}

impl Indexed for ClusterLogging {
    fn count(index: &Index, namespace: &str) -> usize {
        index.loggings(namespace)
    }
}

impl Indexed for k8s::Secret {
    fn count(index: &Index, namespace: &str) -> usize {
        index.secrets(namespace)
    }
}

// === impl IndexMetrics ===

impl IndexMetrics {
    pub fn register(inner: SharedIndex, prom: &mut Registry) -> Self {
        let size = Family::default();
        prom.register(
            "size",
            "Gauge of the number of resources in the index",
            size.clone(),
        );

        let applies = Family::default();
        prom.register("applies", "Count of applies to the index", applies.clone());

        let deletes = Family::default();
        prom.register("deletes", "Count of deletes from the index", deletes.clone());

        let resets = Family::default();
        prom.register("resets", "Count of resets of the index", resets.clone());

        Self {
            inner,
            size,
            applies,
            deletes,
            resets,
        }
    }

    pub fn shared(self) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(self))
    }

    fn labels<R: Indexed>(namespace: &str) -> NamespacedLabels {
        NamespacedLabels {
            namespace: namespace.to_string(),
            kind: R::kind(&()).to_string(),
        }
    }

    fn observe_size<R: Indexed>(&self, namespace: &str) {
        let size = R::count(&self.inner.read(), namespace);
        self.size
            .get_or_create(&Self::labels::<R>(namespace))
            .set(size as i64);
    }
}

impl<R> IndexNamespacedResource<R> for IndexMetrics
where
    R: Indexed,
    Index: IndexNamespacedResource<R>,
{
    fn apply(&mut self, resource: R) {
        let namespace = resource.namespace().unwrap_or_default();
        self.applies
            .get_or_create(&Self::labels::<R>(&namespace))
            .inc();
        self.inner.write().apply(resource);
        self.observe_size::<R>(&namespace);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.deletes
            .get_or_create(&Self::labels::<R>(&namespace))
            .inc();
        IndexNamespacedResource::<R>::delete(&mut *self.inner.write(), namespace.clone(), name);
        self.observe_size::<R>(&namespace);
    }

    fn reset(&mut self, resources: Vec<R>, removed: NamespacedRemoved) {
        let mut namespaces = resources
            .iter()
            .flat_map(|r| r.namespace())
            .chain(removed.keys().cloned())
            .collect::<Vec<_>>();
        namespaces.sort();
        namespaces.dedup();

        self.resets
            .get_or_create(&KindLabels {
                kind: R::kind(&()).to_string(),
            })
            .inc();
        self.inner.write().reset(resources, removed);
        for namespace in namespaces {
            self.observe_size::<R>(&namespace);
        }
    }
}
