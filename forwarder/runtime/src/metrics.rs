use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue},
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::{Registry, Unit},
};
use tokio::time;

#[derive(Clone, Debug)]
pub struct ControllerMetrics {
    reconciles: Family<ResultLabels, Counter>,
    reconcile_duration: Histogram,
    applies: Family<ApplyLabels, Counter>,
}

/// How a reconcile ended.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum ReconcileResult {
    Ready,
    NotReady,
    Transient,
    Cancelled,
    Deleted,
}

/// A resource the controller writes.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Applied {
    ConfigMap,
    Service,
    Status,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
enum ApplyResult {
    Ok,
    Failed,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ResultLabels {
    result: ReconcileResult,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ApplyLabels {
    kind: Applied,
    result: ApplyResult,
}

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reconciles = Family::<ResultLabels, Counter>::default();
        reg.register(
            "reconciles",
            "Count of forwarder reconciles by result",
            reconciles.clone(),
        );

        // Reconciles are bounded by the reconcile timeout, which defaults to
        // five seconds.
        let reconcile_duration = Histogram::new([0.01, 0.1, 0.5, 1.0, 5.0]);
        reg.register_with_unit(
            "reconcile_duration",
            "Histogram of the time taken to reconcile a forwarder",
            Unit::Seconds,
            reconcile_duration.clone(),
        );

        let applies = Family::<ApplyLabels, Counter>::default();
        reg.register(
            "applies",
            "Count of writes to the API server by resource kind",
            applies.clone(),
        );

        Self {
            reconciles,
            reconcile_duration,
            applies,
        }
    }

    pub fn reconciled(&self, result: ReconcileResult, start: time::Instant) {
        self.reconciles.get_or_create(&ResultLabels { result }).inc();
        self.reconcile_duration
            .observe(start.elapsed().as_secs_f64());
    }

    pub fn applied(&self, kind: Applied, success: bool) {
        let result = if success {
            ApplyResult::Ok
        } else {
            ApplyResult::Failed
        };
        self.applies
            .get_or_create(&ApplyLabels { kind, result })
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_results() {
        let mut prom = Registry::default();
        let metrics = ControllerMetrics::register(&mut prom);
        metrics.reconciled(ReconcileResult::Ready, time::Instant::now());
        metrics.reconciled(ReconcileResult::Ready, time::Instant::now());
        metrics.applied(Applied::ConfigMap, true);

        let mut text = String::new();
        prometheus_client::encoding::text::encode(&mut text, &prom).unwrap();
        assert!(text.contains(r#"reconciles_total{result="Ready"} 2"#), "{text}");
        assert!(text.contains(r#"applies_total{kind="ConfigMap",result="Ok"} 1"#), "{text}");
        assert!(text.contains("reconcile_duration_seconds_count 2"), "{text}");
    }
}
