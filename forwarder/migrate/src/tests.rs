use super::*;
use logging_forwarder_k8s_api::{
    logging::{LogStoreSpec, LokiStackStoreSpec, LOG_STORE_ELASTICSEARCH, LOG_STORE_LOKISTACK},
    InputSpec, OutputSpec, OutputType, PipelineSpec,
};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};

#[fixture]
fn elasticsearch_store() -> ClusterLoggingSpec {
    ClusterLoggingSpec {
        log_store: Some(LogStoreSpec {
            type_: LOG_STORE_ELASTICSEARCH.to_string(),
            lokistack: None,
        }),
        ..Default::default()
    }
}

#[fixture]
fn lokistack_store() -> ClusterLoggingSpec {
    ClusterLoggingSpec {
        log_store: Some(LogStoreSpec {
            type_: LOG_STORE_LOKISTACK.to_string(),
            lokistack: Some(LokiStackStoreSpec {
                name: "lokistack-testing".to_string(),
            }),
        }),
        ..Default::default()
    }
}

fn custom_forwarder() -> ClusterLogForwarderSpec {
    ClusterLogForwarderSpec {
        inputs: vec![InputSpec::application("my-app", Default::default())],
        outputs: vec![OutputSpec::new(
            "kr",
            OutputType::Kafka,
            Some("tls://broker:9092/topic"),
        )],
        pipelines: vec![
            PipelineSpec::new("", &["my-app", "audit"], &["kr"]),
            PipelineSpec::new("to-store", &["infrastructure"], &["default"]),
        ],
        service_account_name: Some("collector-sa".to_string()),
        ..Default::default()
    }
}

#[rstest]
fn legacy_forwarder_defaults_to_log_store(elasticsearch_store: ClusterLoggingSpec) {
    let target = Target::new("openshift-logging", "instance").with_logging(Some(&elasticsearch_store));
    let mut extras = Extras::default();
    let migrated = migrate(&target, ClusterLogForwarderSpec::default(), &mut extras);

    let spec = &migrated.spec;
    assert_eq!(
        spec.pipelines,
        vec![PipelineSpec::new(
            "default",
            &["application", "infrastructure"],
            &["default"]
        )]
    );
    assert_eq!(
        spec.inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
        vec!["application", "infrastructure"]
    );
    assert_eq!(spec.outputs.len(), 1);
    assert!(spec.outputs[0].is_type(OutputType::Elasticsearch));
    assert_eq!(spec.service_account_name.as_deref(), Some("logcollector"));
    assert_eq!(
        extras.iter().collect::<Vec<_>>(),
        vec![
            "migrateDefaultOutput",
            "migrateInputApplication",
            "migrateInputInfrastructure",
        ]
    );
}

#[test]
fn custom_forwarder_without_log_store_keeps_default_dangling() {
    let target = Target::new("app-ns", "my-forwarder");
    let mut extras = Extras::default();
    let migrated = migrate(&target, custom_forwarder(), &mut extras);

    assert_eq!(migrated.spec.pipelines[0].name, "pipeline_0");
    assert!(migrated.spec.outputs.iter().all(|o| o.name != "default"));
    assert_eq!(
        migrated.spec.service_account_name.as_deref(),
        Some("collector-sa")
    );
    assert!(!extras.has("migrateDefaultOutput"));
    assert!(extras.has("migrateInputAudit"));
    assert!(migrated.logging.is_none());
}

#[rstest]
fn lokistack_splits_default_pipeline(lokistack_store: ClusterLoggingSpec) {
    let target = Target::new("openshift-logging", "instance").with_logging(Some(&lokistack_store));
    let spec = ClusterLogForwarderSpec {
        pipelines: vec![PipelineSpec::new(
            "all",
            &["application", "infrastructure"],
            &["default"],
        )],
        ..Default::default()
    };
    let mut extras = Extras::default();
    let migrated = migrate(&target, spec, &mut extras);

    let urls = migrated
        .spec
        .outputs
        .iter()
        .map(|o| o.url().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        urls,
        vec![
            "https://lokistack-testing-gateway-http.openshift-logging.svc:8080/api/logs/v1/application",
            "https://lokistack-testing-gateway-http.openshift-logging.svc:8080/api/logs/v1/infrastructure",
        ]
    );
    assert_eq!(migrated.spec.pipelines.len(), 2);
    assert!(migrated
        .spec
        .pipelines
        .iter()
        .all(|p| p.input_refs.len() == 1));
    assert!(!extras.has("migrateDefaultOutput"));
    assert_eq!(
        migrated
            .logging
            .as_ref()
            .and_then(|l| l.visualization.as_ref())
            .map(|v| v.type_.as_str()),
        Some("ocp-console")
    );
    assert_eq!(migrated.warnings.len(), 1);
    assert_eq!(migrated.warnings[0].reason, Reason::Migrated);
}

#[rstest]
#[case::empty_legacy("openshift-logging", "instance", ClusterLogForwarderSpec::default())]
#[case::custom("app-ns", "my-forwarder", custom_forwarder())]
fn migration_is_idempotent(
    #[case] namespace: &str,
    #[case] name: &str,
    #[case] spec: ClusterLogForwarderSpec,
    #[values(elasticsearch_store(), lokistack_store())] logging: ClusterLoggingSpec,
) {
    let target = Target::new(namespace, name).with_logging(Some(&logging));

    let mut extras = Extras::default();
    let once = migrate(&target, spec, &mut extras);

    let target = Target::new(namespace, name).with_logging(once.logging.as_ref());
    let mut again = Extras::default();
    let twice = migrate(&target, once.spec.clone(), &mut again);

    assert_eq!(twice.spec, once.spec);
    assert_eq!(twice.logging, once.logging);
    assert_eq!(again, extras);
    assert!(twice.warnings.is_empty());
}

#[test]
fn warnings_become_degraded_conditions() {
    let warning = Warning::deprecated("old field");
    let cond = warning.to_condition();
    assert_eq!(cond.type_, logging_forwarder_k8s_api::ConditionType::Degraded);
    assert_eq!(cond.reason, Some(Reason::Deprecated));
    assert!(cond.is_true());
}
