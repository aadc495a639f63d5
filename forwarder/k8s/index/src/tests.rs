use super::*;
use kubert::index::IndexNamespacedResource;
use logging_forwarder_core::SecretStore;
use logging_forwarder_k8s_api::{
    self as k8s, ClusterLogForwarder, ClusterLogForwarderSpec, ClusterLogging, ClusterLoggingSpec,
    ObjectMeta, OutputSpec, OutputType,
};
use k8s_openapi::ByteString;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(namespace.to_string()),
        name: Some(name.to_string()),
        uid: Some(format!("{namespace}-{name}")),
        ..Default::default()
    }
}

fn forwarder(namespace: &str, name: &str, secret: &str) -> ClusterLogForwarder {
    ClusterLogForwarder {
        metadata: meta(namespace, name),
        spec: ClusterLogForwarderSpec {
            outputs: vec![
                OutputSpec::new("es", OutputType::Elasticsearch, Some("https://es:9200"))
                    .with_secret(secret),
            ],
            ..Default::default()
        },
        status: None,
    }
}

fn secret(namespace: &str, name: &str, value: &str) -> k8s::Secret {
    k8s::Secret {
        metadata: meta(namespace, name),
        data: Some(btreemap! {
            "password".to_string() => ByteString(value.as_bytes().to_vec()),
        }),
        ..Default::default()
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ForwarderId>) -> Vec<ForwarderId> {
    let mut ids = Vec::new();
    while let Ok(id) = rx.try_recv() {
        ids.push(id);
    }
    ids
}

#[test]
fn forwarder_changes_enqueue_reconciles() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let index = Index::shared(tx);
    let id = ForwarderId::new("ns", "fwd");

    index.write().apply(forwarder("ns", "fwd", "es-secret"));
    assert_eq!(drain(&mut rx), vec![id.clone()]);

    // Reapplying the same spec with a new status does not.
    let mut observed = forwarder("ns", "fwd", "es-secret");
    observed.status = Some(Default::default());
    index.write().apply(observed);
    assert_eq!(drain(&mut rx), vec![]);
    assert!(index.read().snapshot(&id).unwrap().forwarder.status.is_some());

    index.write().apply(forwarder("ns", "fwd", "other-secret"));
    assert_eq!(drain(&mut rx), vec![id.clone()]);

    IndexNamespacedResource::<ClusterLogForwarder>::delete(
        &mut *index.write(),
        "ns".to_string(),
        "fwd".to_string(),
    );
    assert!(index.read().snapshot(&id).is_none());
    assert_eq!(drain(&mut rx), vec![]);
}

#[test]
fn secrets_enqueue_their_readers() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let index = Index::shared(tx);
    index.write().apply(forwarder("ns", "reads", "es-secret"));
    index.write().apply(forwarder("ns", "ignores", "other"));
    index.write().apply(forwarder("elsewhere", "reads", "es-secret"));
    drain(&mut rx);

    index.write().apply(secret("ns", "es-secret", "pw"));
    assert_eq!(drain(&mut rx), vec![ForwarderId::new("ns", "reads")]);

    // Unchanged secrets are ignored.
    index.write().apply(secret("ns", "es-secret", "pw"));
    assert_eq!(drain(&mut rx), vec![]);

    let snapshot = index
        .read()
        .snapshot(&ForwarderId::new("ns", "reads"))
        .unwrap();
    let stored = snapshot.secrets.get("ns", "es-secret").unwrap().unwrap();
    assert_eq!(stored.get_str("password"), Some("pw"));
    assert_eq!(snapshot.secrets.get("elsewhere", "es-secret"), Ok(None));

    IndexNamespacedResource::<k8s::Secret>::delete(
        &mut *index.write(),
        "ns".to_string(),
        "es-secret".to_string(),
    );
    assert_eq!(drain(&mut rx), vec![ForwarderId::new("ns", "reads")]);
    assert_eq!(index.read().secrets("ns"), 0);
}

#[test]
fn sibling_logging_is_snapshotted() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let index = Index::shared(tx);
    let id = ForwarderId::new("openshift-logging", "instance");

    // A logging resource without a forwarder enqueues nothing.
    let logging = ClusterLogging {
        metadata: meta("openshift-logging", "instance"),
        spec: ClusterLoggingSpec::default(),
        status: None,
    };
    index.write().apply(logging);
    assert_eq!(drain(&mut rx), vec![]);

    index.write().apply(forwarder("openshift-logging", "instance", "collector"));
    assert_eq!(drain(&mut rx), vec![id.clone()]);
    assert_eq!(
        index.read().snapshot(&id).unwrap().logging,
        Some(ClusterLoggingSpec::default())
    );

    IndexNamespacedResource::<ClusterLogging>::delete(
        &mut *index.write(),
        "openshift-logging".to_string(),
        "instance".to_string(),
    );
    assert_eq!(drain(&mut rx), vec![id.clone()]);
    assert_eq!(index.read().snapshot(&id).unwrap().logging, None);
}

#[test]
fn metrics_wrap_the_index() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let index = Index::shared(tx);
    let mut prom = prometheus_client::registry::Registry::default();
    let metrics = metrics::IndexMetrics::register(index.clone(), &mut prom).shared();

    metrics.write().apply(forwarder("ns", "fwd", "s"));
    metrics.write().apply(secret("ns", "s", "pw"));
    assert_eq!(index.read().forwarders("ns"), 1);
    assert_eq!(index.read().secrets("ns"), 1);
    assert_eq!(drain(&mut rx).len(), 2);

    let mut text = String::new();
    prometheus_client::encoding::text::encode(&mut text, &prom).unwrap();
    assert!(text.contains(r#"applies_total{namespace="ns",kind="ClusterLogForwarder"} 1"#));
    assert!(text.contains(r#"size{namespace="ns",kind="Secret"} 1"#));
}

#[test]
fn ids_display_as_paths() {
    assert_eq!(ForwarderId::new("ns", "fwd").to_string(), "ns/fwd");
}
