use crate::Warning;
use logging_forwarder_k8s_api::ClusterLoggingSpec;

/// Folds `collection.logs` and `forwarder.fluentd` into `collection`.
///
/// Values already set on the replacement fields win; the deprecated fields
/// are dropped either way.
pub(crate) fn unify(logging: &mut ClusterLoggingSpec, warnings: &mut Vec<Warning>) {
    let forwarder_fluentd = logging.forwarder.take().and_then(|f| f.fluentd);

    if let Some(collection) = logging.collection.as_mut() {
        if let Some(logs) = collection.logs.take() {
            warnings.push(Warning::deprecated(
                "collection.logs is deprecated in favor of collection.type and collection.fluentd",
            ));
            if collection.type_.is_empty() {
                collection.type_ = logs.type_;
            }
            if collection.fluentd.is_none() {
                collection.fluentd = logs.fluentd;
            }
        }
    }

    if let Some(fluentd) = forwarder_fluentd {
        warnings.push(Warning::deprecated(
            "forwarder.fluentd is deprecated in favor of collection.fluentd",
        ));
        let collection = logging.collection.get_or_insert_with(Default::default);
        if collection.fluentd.is_none() {
            collection.fluentd = Some(fluentd);
        }
    }
}
