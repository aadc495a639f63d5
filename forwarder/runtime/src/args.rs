use crate::{
    controller::{Controller, Settings},
    core::{CollectorKind, StaticResources, TlsProfile},
    index::{metrics::IndexMetrics, Index},
    k8s::{self, names, ClusterLogForwarder, ClusterLogging},
    metrics::ControllerMetrics,
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use tokio::{sync::mpsc, time::Duration};
use tracing::{info_span, Instrument};

// Transient failures are retried after this long.
const REQUEUE_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[clap(name = "forwarder", about = "A log forwarder resource controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "logging_forwarder=info,warn",
        env = "LOGGING_FORWARDER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The namespace in which the log store is deployed.
    #[clap(long, default_value = names::LEGACY_NAMESPACE)]
    collector_namespace: String,

    #[clap(long, default_value = "5000")]
    reconcile_timeout_ms: u64,

    /// The minimum TLS version of the cluster's TLS security profile.
    #[clap(long, default_value = "VersionTLS12")]
    tls_min_version: String,

    /// Comma-separated ciphers of the cluster's TLS security profile.
    ///
    /// The intermediate profile's ciphers are used when unset.
    #[clap(long)]
    tls_ciphers: Option<String>,

    /// The cluster's infrastructure name, used as the default cloudwatch group
    /// prefix.
    #[clap(long, default_value = "")]
    infrastructure_name: String,

    /// The collector used when a `ClusterLogging` does not name one.
    #[clap(long, default_value = "vector")]
    collector_kind: CollectorKind,

    #[clap(long, default_value = "logging-forwarder")]
    field_manager: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            collector_namespace,
            reconcile_timeout_ms,
            tls_min_version,
            tls_ciphers,
            infrastructure_name,
            collector_kind,
            field_manager,
        } = self;

        let settings = Settings {
            collector: collector_kind,
            log_store_namespace: collector_namespace,
            resources: StaticResources {
                tls_profile: tls_profile(tls_min_version, tls_ciphers.as_deref()),
                infrastructure_name,
            },
            reconcile_timeout: Duration::from_millis(reconcile_timeout_ms),
            requeue_delay: REQUEUE_DELAY,
            field_manager,
        };

        // Index updates and requeues share the controller's queue.
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let index = Index::shared(updates_tx.clone());

        let mut prom = <Registry>::default();
        let index_metrics =
            IndexMetrics::register(index.clone(), prom.sub_registry_with_prefix("index")).shared();
        let controller_metrics =
            ControllerMetrics::register(prom.sub_registry_with_prefix("controller"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        // Spawn resource watches.

        let forwarders = runtime.watch_all::<ClusterLogForwarder>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index_metrics.clone(), forwarders)
                .instrument(info_span!("clusterlogforwarders")),
        );

        let loggings = runtime.watch_all::<ClusterLogging>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index_metrics.clone(), loggings)
                .instrument(info_span!("clusterloggings")),
        );

        let secrets = runtime.watch_all::<k8s::Secret>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index_metrics, secrets).instrument(info_span!("secrets")),
        );

        let controller = Controller::new(
            runtime.client(),
            index,
            updates_rx,
            updates_tx,
            settings,
            controller_metrics,
        );
        tokio::spawn(controller.run().instrument(info_span!("controller")));

        // Block the main thread on the shutdown signal.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

fn tls_profile(min_version: String, ciphers: Option<&str>) -> TlsProfile {
    let ciphers = match ciphers {
        Some(ciphers) => ciphers
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
        None => TlsProfile::intermediate().ciphers,
    };
    TlsProfile {
        min_version,
        ciphers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn parses_defaults() {
        let args = Args::try_parse_from(["forwarder"]).expect("defaults parse");
        assert_eq!(args.collector_namespace, "openshift-logging");
        assert_eq!(args.reconcile_timeout_ms, 5000);
        assert_eq!(args.collector_kind, CollectorKind::Vector);
        assert_eq!(args.field_manager, "logging-forwarder");
    }

    #[rstest]
    #[case::vector("vector", Some(CollectorKind::Vector))]
    #[case::fluentd("fluentd", Some(CollectorKind::Fluentd))]
    #[case::unknown("logstash", None)]
    fn parses_collector_kind(#[case] arg: &str, #[case] expected: Option<CollectorKind>) {
        let parsed = Args::try_parse_from(["forwarder", "--collector-kind", arg]);
        assert_eq!(parsed.ok().map(|a| a.collector_kind), expected);
    }

    #[test]
    fn tls_ciphers_default_to_intermediate() {
        assert_eq!(
            tls_profile("VersionTLS12".to_string(), None),
            TlsProfile::intermediate()
        );
        assert_eq!(
            tls_profile("VersionTLS13".to_string(), Some("a, b,,")),
            TlsProfile::new("VersionTLS13", ["a", "b"])
        );
    }
}
