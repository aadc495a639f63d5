use super::*;
use logging_forwarder_core::{secret, LookupError, SecretSnapshot, StaticResources, Tenant};
use logging_forwarder_k8s_api::{
    filter::KubeApiAudit,
    input::{LimitSpec, NamespaceContainerSpec, ReceiverTlsSpec},
    output::{Cloudwatch, GoogleCloudLogging, Http, Kafka, OutputTlsSpec},
    Application, ConditionType, DropCondition, DropTest, FilterSpec, InputSpec, OutputSpec,
    OutputType, PipelineSpec, ReceiverSpec,
};
use maplit::btreemap;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::BTreeSet;

const NS: &str = "app-logs";

/// Answers access reviews from a fixed set of denied tenants.
#[derive(Default)]
struct Access {
    denied: BTreeSet<Tenant>,
    error: Option<LookupError>,
}

impl AccessReviewer for Access {
    fn can_collect(&self, _: &str, _: &str, tenant: Tenant) -> Result<bool, LookupError> {
        if let Some(error) = self.error.clone() {
            return Err(error);
        }
        Ok(!self.denied.contains(&tenant))
    }
}

struct Fixture {
    namespace: String,
    name: String,
    annotations: BTreeMap<String, String>,
    spec: ClusterLogForwarderSpec,
    logging: Option<ClusterLoggingSpec>,
    extras: Extras,
    warnings: Vec<Warning>,
    collector: CollectorKind,
    secrets: SecretSnapshot,
    resources: StaticResources,
    access: Access,
}

impl Fixture {
    fn new(spec: ClusterLogForwarderSpec) -> Self {
        Self {
            namespace: NS.to_string(),
            name: "my-forwarder".to_string(),
            annotations: BTreeMap::new(),
            spec: ClusterLogForwarderSpec {
                service_account_name: Some("collector-sa".to_string()),
                ..spec
            },
            logging: None,
            extras: Extras::default(),
            warnings: vec![],
            collector: CollectorKind::Vector,
            secrets: SecretSnapshot::default(),
            resources: StaticResources {
                infrastructure_name: "cluster-abc".to_string(),
                ..Default::default()
            },
            access: Access::default(),
        }
    }

    fn named(mut self, namespace: &str, name: &str) -> Self {
        self.namespace = namespace.to_string();
        self.name = name.to_string();
        self
    }

    fn with_secret(mut self, secret: Secret) -> Self {
        self.secrets.insert(NS, secret);
        self
    }

    fn validate(&self) -> Result<ClusterLogForwarderStatus, Fatal> {
        let cx = Context {
            namespace: &self.namespace,
            name: &self.name,
            annotations: &self.annotations,
            spec: &self.spec,
            logging: self.logging.as_ref(),
            extras: &self.extras,
            warnings: &self.warnings,
            collector: self.collector,
            secrets: &self.secrets,
            resources: &self.resources,
            access: &self.access,
        };
        validate(&cx, &CancellationToken::new())
    }

    fn status(&self) -> ClusterLogForwarderStatus {
        self.validate().expect("validation must not be fatal")
    }
}

fn http_output(name: &str) -> OutputSpec {
    OutputSpec::new(name, OutputType::Http, Some("https://collector.example.com:8443"))
}

/// One pipeline from the application input to each named output.
fn forwarding(outputs: Vec<OutputSpec>) -> ClusterLogForwarderSpec {
    let refs = outputs.iter().map(|o| o.name.clone()).collect::<Vec<_>>();
    ClusterLogForwarderSpec {
        pipelines: vec![PipelineSpec {
            name: "p".to_string(),
            input_refs: vec!["application".to_string()],
            output_refs: refs,
            ..Default::default()
        }],
        outputs,
        ..Default::default()
    }
}

fn receiving(receiver: ReceiverSpec) -> ClusterLogForwarderSpec {
    ClusterLogForwarderSpec {
        inputs: vec![InputSpec::receiver("rcv", receiver)],
        pipelines: vec![PipelineSpec::new("p", &["rcv"], &["out"])],
        outputs: vec![http_output("out")],
        ..Default::default()
    }
}

fn reason(conds: &NamedConditions, name: &str) -> Option<(Reason, String)> {
    let cond = conds.get(name)?.get(ConditionType::Ready)?;
    cond.reason.map(|r| (r, cond.message.clone()))
}

fn message(conds: &NamedConditions, name: &str) -> String {
    reason(conds, name).map(|(_, m)| m).unwrap_or_default()
}

#[test]
fn valid_forwarder_is_ready() {
    let status = Fixture::new(forwarding(vec![http_output("out")])).status();
    assert!(status.is_ready());
    assert!(status.outputs.is_ready("out"));
    assert!(status.pipelines.is_ready("p"));
}

#[test]
fn no_pipelines_is_fatal() {
    let err = Fixture::new(ClusterLogForwarderSpec::default())
        .validate()
        .unwrap_err();
    assert_eq!(err, Fatal::Invalid("ClusterLogForwarder disabled".to_string()));
    assert_eq!(err.to_condition().unwrap().reason, Some(Reason::Invalid));
}

#[test]
fn cancelled_before_any_pass() {
    let f = Fixture::new(forwarding(vec![http_output("out")]));
    let cx = Context {
        namespace: &f.namespace,
        name: &f.name,
        annotations: &f.annotations,
        spec: &f.spec,
        logging: None,
        extras: &f.extras,
        warnings: &f.warnings,
        collector: f.collector,
        secrets: &f.secrets,
        resources: &f.resources,
        access: &f.access,
    };
    let token = CancellationToken::new();
    token.cancel();
    let err = validate(&cx, &token).unwrap_err();
    assert_eq!(err, Fatal::Cancelled(Cancelled { stage: "name" }));
    assert_eq!(err.to_condition(), None);
}

#[rstest]
#[case::uppercase("My-Forwarder")]
#[case::underscore("my_forwarder")]
#[case::trailing_dash("forwarder-")]
#[case::too_long("a123456789b123456789c123456789d123456789e123456789fgh")]
#[case::reserved("elasticsearch")]
#[case::reserved_lokistack("lokistack")]
fn rejects_forwarder_names(#[case] name: &str) {
    let err = Fixture::new(forwarding(vec![http_output("out")]))
        .named(NS, name)
        .validate()
        .unwrap_err();
    assert!(matches!(err, Fatal::Invalid(_)), "{err:?}");
}

#[test]
fn accepts_longest_name() {
    let name = "a".repeat(52);
    let status = Fixture::new(forwarding(vec![http_output("out")]))
        .named(NS, &name)
        .status();
    assert!(status.is_ready());
}

#[test]
fn instance_is_reserved_outside_openshift_logging() {
    let err = Fixture::new(forwarding(vec![http_output("out")]))
        .named(NS, "instance")
        .validate()
        .unwrap_err();
    assert!(matches!(err, Fatal::Invalid(msg) if msg.contains("reserved")));
}

#[test]
fn legacy_forwarder_requires_cluster_logging() {
    let mut f = Fixture::new(forwarding(vec![http_output("out")])).named("openshift-logging", "instance");
    let err = f.validate().unwrap_err();
    assert!(matches!(err, Fatal::Invalid(msg) if msg.starts_with("ClusterLogging \"instance\" must exist")));

    f.logging = Some(ClusterLoggingSpec::default());
    assert!(f.status().is_ready());
}

#[test]
fn invalid_log_level_is_a_validation_condition() {
    let mut f = Fixture::new(forwarding(vec![http_output("out")]));
    f.annotations = btreemap! {
        LOG_LEVEL_ANNOTATION.to_string() => "verbose".to_string(),
    };
    let status = f.status();
    let cond = status.conditions.get(ConditionType::Validation).unwrap();
    assert_eq!(cond.reason, Some(Reason::ValidationFailure));
    assert!(status.is_ready());

    f.annotations = btreemap! {
        LOG_LEVEL_ANNOTATION.to_string() => "debug".to_string(),
    };
    assert_eq!(f.status().conditions.get(ConditionType::Validation), None);
}

#[test]
fn migration_warnings_degrade_the_forwarder() {
    let mut f = Fixture::new(forwarding(vec![http_output("out")]));
    f.warnings = vec![
        Warning {
            reason: Reason::Deprecated,
            message: "first".to_string(),
        },
        Warning {
            reason: Reason::Deprecated,
            message: "second".to_string(),
        },
    ];
    let status = f.status();
    let degraded = status.conditions.get(ConditionType::Degraded).unwrap();
    assert_eq!(degraded.message, "first; second");
    assert!(status.is_ready());
}

#[test]
fn fluentd_does_not_support_every_output() {
    let mut f = Fixture::new(forwarding(vec![OutputSpec::new(
        "gcl",
        OutputType::GoogleCloudLogging,
        None,
    )]));
    f.collector = CollectorKind::Fluentd;
    let status = f.status();
    assert_eq!(
        message(&status.outputs, "gcl"),
        "output \"gcl\": type \"googleCloudLogging\" is not supported by the fluentd collector"
    );
    assert!(!status.is_ready());

    let mut f = Fixture::new(forwarding(vec![OutputSpec::new(
        "fwd",
        OutputType::FluentdForward,
        Some("tcp://fluentd:24224"),
    )]));
    assert!(!f.status().outputs.is_ready("fwd"));
    f.collector = CollectorKind::Fluentd;
    assert!(f.status().outputs.is_ready("fwd"));
}

#[test]
fn fluentd_rejects_container_selection_and_limits() {
    let mut spec = forwarding(vec![http_output("out")]);
    spec.inputs = vec![
        InputSpec::application(
            "included",
            Application {
                includes: vec![NamespaceContainerSpec {
                    namespace: Some("ns-*".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            },
        ),
        InputSpec::application(
            "limited",
            Application {
                group_limit: Some(LimitSpec {
                    max_records_per_second: 10,
                }),
                ..Default::default()
            },
        ),
        InputSpec::application(
            "namespaced",
            Application {
                namespaces: vec!["ns-a".to_string()],
                ..Default::default()
            },
        ),
    ];
    spec.pipelines[0].input_refs =
        vec!["included".into(), "limited".into(), "namespaced".into()];
    let mut f = Fixture::new(spec);
    assert!(f.status().inputs.is_ready("included"));

    f.collector = CollectorKind::Fluentd;
    let status = f.status();
    assert_eq!(
        message(&status.inputs, "included"),
        "input \"included\": container includes and excludes are not supported by the fluentd collector"
    );
    assert_eq!(
        message(&status.inputs, "limited"),
        "input \"limited\": rate limits are not supported by the fluentd collector"
    );
    assert!(status.inputs.is_ready("namespaced"));
    assert!(!status.pipelines.is_ready("p"));
}

#[test]
fn fluentd_rejects_output_tuning_and_filters() {
    let mut tuned = http_output("tuned");
    tuned.tuning = Some(btreemap! {
        "request.concurrency".to_string() => serde_json::json!(2),
    });
    let mut spec = forwarding(vec![tuned, http_output("plain")]);
    spec.filters = vec![FilterSpec::drop(
        "drop-debug",
        vec![DropTest {
            conditions: vec![DropCondition::matches(".level", "debug")],
        }],
    )];
    spec.pipelines[0].filter_refs = vec!["drop-debug".to_string()];
    let mut f = Fixture::new(spec);
    f.collector = CollectorKind::Fluentd;
    let status = f.status();
    assert_eq!(
        message(&status.outputs, "tuned"),
        "output \"tuned\": tuning options are not supported by the fluentd collector"
    );
    assert!(status.outputs.is_ready("plain"));
    assert_eq!(
        message(&status.filters, "drop-debug"),
        "filter \"drop-debug\": filters are not supported by the fluentd collector"
    );
    assert!(!status.is_ready());
}

#[test]
fn custom_forwarder_requires_service_account() {
    let mut f = Fixture::new(forwarding(vec![http_output("out")]));
    f.spec.service_account_name = None;
    let err = f.validate().unwrap_err();
    assert_eq!(
        err,
        Fatal::Invalid("custom clusterlogforwarders must specify a service account name".to_string())
    );

    let mut f = Fixture::new(forwarding(vec![http_output("out")])).named("openshift-logging", "audit-forwarder");
    f.spec.service_account_name = Some("logcollector".to_string());
    assert!(matches!(f.validate().unwrap_err(), Fatal::Invalid(msg) if msg.starts_with("logcollector is a reserved")));
}

#[test]
fn denied_tenant_fails_its_inputs() {
    let mut spec = forwarding(vec![http_output("out")]);
    spec.inputs = vec![InputSpec::receiver("syslog-in", ReceiverSpec::syslog(10514, "tcp"))];
    spec.pipelines = vec![PipelineSpec::new("p", &["application", "syslog-in"], &["out"])];
    let mut f = Fixture::new(spec);
    f.access.denied.insert(Tenant::Infrastructure);

    let status = f.status();
    assert_eq!(
        reason(&status.inputs, "syslog-in"),
        Some((
            Reason::Invalid,
            "insufficient permissions on service account, not authorized to collect \"infrastructure\" logs".to_string()
        ))
    );
    assert_eq!(
        message(&status.pipelines, "p"),
        "invalid: unrecognized inputs: {\"syslog-in\"}"
    );
    assert!(!status.is_ready());
}

#[test]
fn access_review_errors_are_transient() {
    let mut f = Fixture::new(forwarding(vec![http_output("out")]));
    f.access.error = Some(LookupError::Unavailable("connection refused".to_string()));
    let err = f.validate().unwrap_err();
    assert!(matches!(err, Fatal::Transient(_)));
    assert_eq!(err.to_condition().unwrap().reason, Some(Reason::Transient));
}

#[test]
fn legacy_forwarder_skips_access_review() {
    let mut f = Fixture::new(forwarding(vec![http_output("out")])).named("openshift-logging", "instance");
    f.logging = Some(ClusterLoggingSpec::default());
    f.spec.service_account_name = Some("logcollector".to_string());
    f.access.error = Some(LookupError::Timeout);
    assert!(f.status().is_ready());
}

#[rstest]
#[case::zero(0, false)]
#[case::privileged(1023, false)]
#[case::lowest(1024, true)]
#[case::highest(65535, true)]
#[case::overflow(65536, false)]
fn receiver_port_range(#[case] port: i32, #[case] ready: bool) {
    let status = Fixture::new(receiving(ReceiverSpec::http(port, "kubeAPIAudit"))).status();
    assert_eq!(status.inputs.is_ready("rcv"), ready);
    if !ready {
        assert_eq!(
            message(&status.inputs, "rcv"),
            "invalid port specified for HTTP receiver"
        );
    }

    let status = Fixture::new(receiving(ReceiverSpec::syslog(port, "udp"))).status();
    assert_eq!(status.inputs.is_ready("rcv"), ready);
}

#[test]
fn receiver_mismatches() {
    let mut receiver = ReceiverSpec::http(8443, "kubeAPIAudit");
    receiver.syslog = ReceiverSpec::syslog(10514, "tcp").syslog;
    let status = Fixture::new(receiving(receiver)).status();
    assert_eq!(
        message(&status.inputs, "rcv"),
        "mismatched Type specified for receiver, specified HTTP and have Syslog"
    );

    let mut receiver = ReceiverSpec::http(8443, "kubeAPIAudit");
    receiver.type_ = Some("grpc".to_string());
    let status = Fixture::new(receiving(receiver)).status();
    assert_eq!(message(&status.inputs, "rcv"), "invalid Type specified for receiver");

    let status = Fixture::new(receiving(ReceiverSpec::http(8443, "json"))).status();
    assert_eq!(
        message(&status.inputs, "rcv"),
        "invalid format specified for HTTP receiver"
    );

    let status = Fixture::new(receiving(ReceiverSpec::syslog(10514, "sctp"))).status();
    assert!(!status.inputs.is_ready("rcv"));
}

#[test]
fn receivers_need_vector() {
    let mut f = Fixture::new(receiving(ReceiverSpec::http(8443, "kubeAPIAudit")));
    f.collector = CollectorKind::Fluentd;
    assert_eq!(
        message(&f.status().inputs, "rcv"),
        "ReceiverSpecs are only supported for the vector log collector"
    );
}

#[test]
fn receivers_cannot_share_a_port() {
    let mut spec = receiving(ReceiverSpec::http(8443, "kubeAPIAudit"));
    spec.inputs.push(InputSpec::receiver("rcv2", ReceiverSpec::syslog(8443, "tcp")));
    spec.pipelines[0].input_refs.push("rcv2".to_string());
    let status = Fixture::new(spec).status();
    assert!(status.inputs.is_ready("rcv"));
    assert!(!status.inputs.is_ready("rcv2"));
}

#[test]
fn receiver_tls_secret_must_hold_a_key_pair() {
    let mut receiver = ReceiverSpec::http(8443, "kubeAPIAudit");
    receiver.tls = Some(ReceiverTlsSpec {
        secret_name: Some("serving".to_string()),
    });
    let f = Fixture::new(receiving(receiver));
    assert_eq!(
        reason(&f.status().inputs, "rcv"),
        Some((Reason::MissingResource, "secret \"serving\" not found".to_string()))
    );

    let f = f.with_secret(Secret::new("serving").with(secret::TLS_CERT, "cert"));
    assert_eq!(
        reason(&f.status().inputs, "rcv").map(|(r, _)| r),
        Some(Reason::MissingResource)
    );

    let f = f.with_secret(
        Secret::new("serving")
            .with(secret::TLS_CERT, "cert")
            .with(secret::TLS_KEY, "key"),
    );
    assert!(f.status().inputs.is_ready("rcv"));
}

#[rstest]
#[case::negative(-1, false)]
#[case::zero(0, true)]
#[case::one(1, true)]
#[case::max(i64::MAX, true)]
fn throttle_thresholds(#[case] max: i64, #[case] ready: bool) {
    let mut spec = forwarding(vec![http_output("out")]);
    spec.inputs = vec![InputSpec::application(
        "my-app",
        Application {
            container_limit: Some(LimitSpec {
                max_records_per_second: max,
            }),
            ..Default::default()
        },
    )];
    spec.pipelines[0].input_refs = vec!["my-app".to_string()];
    spec.outputs[0].limit = Some(LimitSpec {
        max_records_per_second: max,
    });
    let status = Fixture::new(spec).status();
    assert_eq!(status.inputs.is_ready("my-app"), ready);
    assert_eq!(status.outputs.is_ready("out"), ready);
    if !ready {
        assert_eq!(
            message(&status.inputs, "my-app"),
            "inputspec cannot have a negative limit threshold"
        );
        assert_eq!(
            message(&status.outputs, "out"),
            "output \"out\": Output cannot have negative limit threshold"
        );
    }
}

#[test]
fn input_rules() {
    let mut both_limits = Application {
        container_limit: Some(LimitSpec::default()),
        group_limit: Some(LimitSpec::default()),
        ..Default::default()
    };
    let spec = ClusterLogForwarderSpec {
        inputs: vec![
            InputSpec::new(""),
            InputSpec::new("empty"),
            InputSpec::application("limits", both_limits.clone()),
            InputSpec::infrastructure("infra", &["journal"]),
            InputSpec::audit("audit-in", &["kubeAPI", "syslog"]),
            InputSpec::audit("application", &[]),
        ],
        ..forwarding(vec![http_output("out")])
    };
    let status = Fixture::new(spec).status();
    assert_eq!(message(&status.inputs, "input_0_"), "input must have a name");
    assert_eq!(
        message(&status.inputs, "empty"),
        "inputspec must define one and only one of: application, infrastructure, audit or receiver"
    );
    assert_eq!(
        message(&status.inputs, "limits"),
        "inputspec must define only one of container or group limit"
    );
    assert_eq!(
        message(&status.inputs, "infra"),
        "infrastructure inputs must define at least one valid source: container,node"
    );
    assert_eq!(
        message(&status.inputs, "audit-in"),
        "audit inputs must define at least one valid source: auditd,kubeAPI,openshiftAPI,ovn"
    );
    assert_eq!(
        message(&status.inputs, "application"),
        "input name \"application\" is reserved"
    );

    both_limits.group_limit = None;
    both_limits.namespaces = vec!["kube-*".to_string(), "bad/ns".to_string()];
    let spec = ClusterLogForwarderSpec {
        inputs: vec![
            InputSpec::application("globs", both_limits),
            InputSpec::infrastructure("dup", &[]),
            InputSpec::audit("dup", &[]),
        ],
        ..forwarding(vec![http_output("out")])
    };
    let status = Fixture::new(spec).status();
    assert_eq!(
        message(&status.inputs, "globs"),
        "invalid glob for namespace or container: \"bad/ns\""
    );
    assert_eq!(message(&status.inputs, "dup"), "duplicate name: \"dup\"");
}

#[test]
fn migrated_reserved_inputs_are_accepted() {
    let mut spec = forwarding(vec![http_output("out")]);
    spec.inputs = vec![InputSpec::reserved("application").unwrap()];
    let mut f = Fixture::new(spec);
    f.extras.set("migrateInputApplication");
    let status = f.status();
    assert!(status.inputs.is_ready("application"));
    assert!(status.is_ready());
}

#[rstest]
#[case::https(OutputType::Http, "https://h.example.com", true)]
#[case::relative(OutputType::Http, "/api/logs", false)]
#[case::garbage(OutputType::Loki, "https://bad host", false)]
#[case::syslog_tcp(OutputType::Syslog, "tcp://rsyslog:514", true)]
#[case::syslog_tls(OutputType::Syslog, "tls://rsyslog:6514", true)]
#[case::syslog_udp(OutputType::Syslog, "UDP://rsyslog:514", true)]
#[case::syslog_http(OutputType::Syslog, "http://rsyslog:514", false)]
#[case::kafka_tls(OutputType::Kafka, "tls://broker:9093/topic", true)]
fn output_urls(#[case] type_: OutputType, #[case] url: &str, #[case] ready: bool) {
    let status = Fixture::new(forwarding(vec![OutputSpec::new("out", type_, Some(url))])).status();
    assert_eq!(status.outputs.is_ready("out"), ready, "{:?}", status.outputs);
}

#[test]
fn output_url_requirements() {
    let status = Fixture::new(forwarding(vec![OutputSpec::new("es", OutputType::Elasticsearch, None)])).status();
    assert_eq!(
        message(&status.outputs, "es"),
        "URL is required for output type elasticsearch"
    );

    let status = Fixture::new(forwarding(vec![OutputSpec::new("k", OutputType::Kafka, None)])).status();
    assert_eq!(message(&status.outputs, "k"), "no broker URLs specified");

    let mut kafka = OutputSpec::new("k", OutputType::Kafka, None);
    kafka.type_spec.kafka = Some(Kafka {
        topic: Some("logs".to_string()),
        brokers: vec!["tls://b1:9093".to_string(), "tls://b2:9093".to_string()],
    });
    assert!(Fixture::new(forwarding(vec![kafka])).status().outputs.is_ready("k"));

    let status = Fixture::new(forwarding(vec![OutputSpec::new("s", OutputType::Syslog, Some("https://s:514"))])).status();
    assert_eq!(message(&status.outputs, "s"), "invalid URL scheme: https");
}

#[test]
fn output_names() {
    let mut spec = forwarding(vec![
        http_output(""),
        http_output("default"),
        http_output("dup"),
        http_output("dup"),
    ]);
    spec.outputs.push(OutputSpec {
        name: "odd".to_string(),
        type_: "carrierPigeon".to_string(),
        ..Default::default()
    });
    spec.pipelines[0].output_refs = vec!["dup".to_string(), "odd".to_string()];
    let status = Fixture::new(spec).status();
    assert_eq!(message(&status.outputs, "output_0_"), "output must have a name");
    assert_eq!(
        message(&status.outputs, "default"),
        "output name \"default\" is reserved"
    );
    assert_eq!(message(&status.outputs, "dup"), "duplicate name: \"dup\"");
    assert_eq!(
        message(&status.outputs, "odd"),
        "output \"odd\": unknown output type \"carrierPigeon\""
    );
}

#[test]
fn unreferenced_output_is_unused() {
    let mut spec = forwarding(vec![http_output("out"), http_output("spare")]);
    spec.pipelines[0].output_refs = vec!["out".to_string()];
    let status = Fixture::new(spec).status();
    assert_eq!(
        reason(&status.outputs, "spare"),
        Some((
            Reason::Unused,
            "output \"spare\": Output not referenced by any pipeline".to_string()
        ))
    );
    assert!(status.is_ready());
}

#[test]
fn output_secrets() {
    let out = http_output("out").with_secret("creds");
    let f = Fixture::new(forwarding(vec![out.clone()]));
    assert_eq!(
        reason(&f.status().outputs, "out"),
        Some((Reason::MissingResource, "secret \"creds\" not found".to_string()))
    );

    let f = f.with_secret(Secret::new("creds").with(secret::USERNAME, "u"));
    assert_eq!(
        message(&f.status().outputs, "out"),
        "cannot have username without password"
    );

    let f = f.with_secret(Secret::new("creds").with(secret::TLS_KEY, "k"));
    assert_eq!(
        message(&f.status().outputs, "out"),
        "cannot have tls.key without tls.crt"
    );

    let f = f.with_secret(
        Secret::new("creds")
            .with(secret::USERNAME, "u")
            .with(secret::PASSWORD, "p"),
    );
    assert!(f.status().outputs.is_ready("out"));

    let status = Fixture::new(forwarding(vec![http_output("out").with_secret("")])).status();
    assert_eq!(message(&status.outputs, "out"), "secret has empty name");
}

#[test]
fn secret_lookup_timeout_is_missing_and_failure_is_transient() {
    struct Failing(LookupError);
    impl SecretStore for Failing {
        fn get(&self, _: &str, _: &str) -> Result<Option<Secret>, LookupError> {
            Err(self.0.clone())
        }
    }

    let f = Fixture::new(forwarding(vec![http_output("out").with_secret("creds")]));
    let run = |secrets: &dyn SecretStore| {
        let cx = Context {
            namespace: &f.namespace,
            name: &f.name,
            annotations: &f.annotations,
            spec: &f.spec,
            logging: None,
            extras: &f.extras,
            warnings: &f.warnings,
            collector: f.collector,
            secrets,
            resources: &f.resources,
            access: &f.access,
        };
        validate(&cx, &CancellationToken::new())
    };

    let status = run(&Failing(LookupError::Timeout)).unwrap();
    assert_eq!(
        reason(&status.outputs, "out").map(|(r, _)| r),
        Some(Reason::MissingResource)
    );
    assert!(matches!(
        run(&Failing(LookupError::Unavailable("boom".to_string()))),
        Err(Fatal::Transient(_))
    ));
}

fn cloudwatch(secret: Option<&str>) -> OutputSpec {
    let mut out = OutputSpec::new("cw", OutputType::Cloudwatch, None);
    out.type_spec.cloudwatch = Some(Cloudwatch {
        region: "us-east-1".to_string(),
        group_by: "logType".to_string(),
        group_prefix: Some("prefix".to_string()),
    });
    match secret {
        Some(name) => out.with_secret(name),
        None => out,
    }
}

#[rstest]
#[case::keys(
    Secret::new("aws").with(secret::AWS_ACCESS_KEY_ID, "id").with(secret::AWS_SECRET_ACCESS_KEY, "key"),
    None
)]
#[case::role_arn(
    Secret::new("aws").with(secret::AWS_ROLE_ARN, "arn:aws:iam::123456789012:role/my-role"),
    None
)]
#[case::credentials(
    Secret::new("aws").with(
        secret::AWS_CREDENTIALS,
        "[default]\nrole_arn = arn:aws:iam::123456789012:role/my-role\nweb_identity_token_file = /var/run/token"
    ),
    None
)]
#[case::bad_role_arn(
    Secret::new("aws").with(secret::AWS_ROLE_ARN, "arn:aws:iam::notanumber:role/x"),
    Some("auth keys: a 'role_arn' or 'credentials' key is required containing a valid arn value")
)]
#[case::missing_keys(
    Secret::new("aws").with(secret::AWS_ACCESS_KEY_ID, "id"),
    Some("auth keys: aws_access_key_id and aws_secret_access_key are required")
)]
fn cloudwatch_credentials(#[case] secret: Secret, #[case] error: Option<&str>) {
    let status = Fixture::new(forwarding(vec![cloudwatch(Some("aws"))]))
        .with_secret(secret)
        .status();
    match error {
        None => assert!(status.outputs.is_ready("cw")),
        Some(msg) => assert_eq!(
            reason(&status.outputs, "cw"),
            Some((Reason::MissingResource, msg.to_string()))
        ),
    }
}

#[test]
fn cloudwatch_requires_its_type_spec() {
    let mut out = cloudwatch(None);
    out.type_spec.cloudwatch = None;
    let status = Fixture::new(forwarding(vec![out])).status();
    assert_eq!(
        message(&status.outputs, "cw"),
        "output \"cw\": Cloudwatch output requires type spec"
    );
}

#[test]
fn cloudwatch_group_prefix_falls_back_to_infrastructure_name() {
    struct Unreachable(LookupError);
    impl ResourceLookup for Unreachable {
        fn cluster_tls_profile(&self) -> Result<logging_forwarder_core::TlsProfile, LookupError> {
            Err(self.0.clone())
        }
        fn cluster_infrastructure_name(&self) -> Result<String, LookupError> {
            Err(self.0.clone())
        }
    }

    let mut out = cloudwatch(None);
    out.type_spec.cloudwatch.as_mut().unwrap().group_prefix = None;
    let f = Fixture::new(forwarding(vec![out]));
    assert!(f.status().outputs.is_ready("cw"));

    let run = |resources: &dyn ResourceLookup| {
        let cx = Context {
            namespace: &f.namespace,
            name: &f.name,
            annotations: &f.annotations,
            spec: &f.spec,
            logging: None,
            extras: &f.extras,
            warnings: &f.warnings,
            collector: f.collector,
            secrets: &f.secrets,
            resources,
            access: &f.access,
        };
        validate(&cx, &CancellationToken::new())
    };
    let status = run(&Unreachable(LookupError::Timeout)).unwrap();
    assert_eq!(
        reason(&status.outputs, "cw"),
        Some((
            Reason::MissingResource,
            "outputprefix is not set and it can't be fetched from the cluster. Error: lookup timed out".to_string()
        ))
    );
    assert!(matches!(
        run(&Unreachable(LookupError::Unavailable("down".to_string()))),
        Err(Fatal::Transient(_))
    ));
}

#[test]
fn splunk_requires_a_hec_token() {
    let splunk = OutputSpec::new("splunk", OutputType::Splunk, Some("https://splunk:8088"));
    let status = Fixture::new(forwarding(vec![splunk.clone()])).status();
    assert_eq!(
        reason(&status.outputs, "splunk"),
        Some((
            Reason::MissingResource,
            "A non-empty hecToken entry is required".to_string()
        ))
    );

    let f = Fixture::new(forwarding(vec![splunk.with_secret("hec")]))
        .with_secret(Secret::new("hec").with(secret::SPLUNK_HEC_TOKEN, " "));
    assert!(!f.status().outputs.is_ready("splunk"));
    let f = f.with_secret(Secret::new("hec").with(secret::SPLUNK_HEC_TOKEN, "token"));
    assert!(f.status().outputs.is_ready("splunk"));
}

#[rstest]
#[case::none(GoogleCloudLogging::default(), false)]
#[case::project(GoogleCloudLogging { project_id: Some("p".to_string()), ..Default::default() }, true)]
#[case::two(
    GoogleCloudLogging {
        project_id: Some("p".to_string()),
        folder_id: Some("f".to_string()),
        ..Default::default()
    },
    false
)]
fn google_cloud_logging_ids(#[case] gcl: GoogleCloudLogging, #[case] ready: bool) {
    let mut out = OutputSpec::new("gcl", OutputType::GoogleCloudLogging, None);
    out.type_spec.google_cloud_logging = Some(gcl);
    let status = Fixture::new(forwarding(vec![out])).status();
    assert_eq!(status.outputs.is_ready("gcl"), ready);
}

#[rstest]
#[case::max_events("buffer.max_events", serde_json::json!(1000), true)]
#[case::when_full("buffer.when_full", serde_json::json!("drop_newest"), true)]
#[case::bad_policy("buffer.when_full", serde_json::json!("spill"), false)]
#[case::negative("request.retry_attempts", serde_json::json!(-1), false)]
#[case::unknown("compression", serde_json::json!("gzip"), false)]
fn tuning_options(#[case] key: &str, #[case] value: serde_json::Value, #[case] ready: bool) {
    let mut out = http_output("out");
    out.tuning = Some(btreemap! { key.to_string() => value });
    let status = Fixture::new(forwarding(vec![out])).status();
    assert_eq!(status.outputs.is_ready("out"), ready);
}

#[test]
fn tls_settings_need_a_secure_url() {
    let mut out = OutputSpec::new("es", OutputType::Elasticsearch, Some("http://es:9200"));
    out.tls = Some(OutputTlsSpec {
        insecure_skip_verify: true,
        security_profile: None,
    });
    let status = Fixture::new(forwarding(vec![out.clone()])).status();
    assert!(!status.outputs.is_ready("es"));
    assert_eq!(
        message(&status.pipelines, "p"),
        "invalid: unrecognized outputs: {\"es\"}"
    );
    assert!(!status.is_ready());

    out.url = Some("https://es:9200".to_string());
    assert!(Fixture::new(forwarding(vec![out])).status().is_ready());
}

#[rstest]
#[case::json("application/json", true)]
#[case::ndjson("application/x-ndjson", true)]
#[case::mixed_case("Application/JSON", true)]
#[case::text("text/plain", false)]
fn http_content_type(#[case] value: &str, #[case] ready: bool) {
    let mut out = http_output("out");
    out.type_spec.http = Some(Http {
        headers: btreemap! { "content-TYPE".to_string() => value.to_string() },
        ..Default::default()
    });
    let status = Fixture::new(forwarding(vec![out])).status();
    assert_eq!(status.outputs.is_ready("out"), ready);
    assert_eq!(status.is_ready(), ready);
}

fn filtering(filter: FilterSpec) -> ClusterLogForwarderSpec {
    let mut spec = forwarding(vec![http_output("out")]);
    spec.pipelines[0].filter_refs = vec![filter.name.clone()];
    spec.filters = vec![filter];
    spec
}

#[rstest]
#[case::plain(".kubernetes.namespace_name", true)]
#[case::dashed(".kubernetes.container-name", true)]
#[case::quoted(".kubernetes.labels.\"app.io/name\"", true)]
#[case::no_dot("kubernetes.namespace_name", false)]
#[case::slash(".kubernetes.labels.app/name", false)]
#[case::empty_segment(".kubernetes..name", false)]
fn drop_field_paths(#[case] field: &str, #[case] ready: bool) {
    let filter = FilterSpec::drop(
        "drop-debug",
        vec![DropTest {
            conditions: vec![DropCondition::matches(field, "debug")],
        }],
    );
    let status = Fixture::new(filtering(filter)).status();
    assert_eq!(status.filters.is_ready("drop-debug"), ready);
    assert_eq!(status.pipelines.is_ready("p"), ready);
}

#[test]
fn drop_condition_rules() {
    let filter = FilterSpec::drop(
        "drop",
        vec![
            DropTest {
                conditions: vec![DropCondition::matches(".message", "ok")],
            },
            DropTest {
                conditions: vec![DropCondition {
                    field: "message".to_string(),
                    matches: Some("(unclosed".to_string()),
                    not_matches: Some("x".to_string()),
                }],
            },
        ],
    );
    let status = Fixture::new(filtering(filter)).status();
    assert_eq!(
        message(&status.filters, "drop"),
        "test[1]: \"message\" must start with a '.'; \
         test[1]: only one of matches or notMatches can be defined at once; \
         test[1]: matches/notMatches must be a valid regular expression."
    );
}

#[test]
fn prune_keeps_required_fields() {
    let status = Fixture::new(filtering(FilterSpec::prune("prune", &[".message", ".kubernetes"], &[]))).status();
    assert_eq!(
        message(&status.filters, "prune"),
        "[\".message\"] is/are required fields and must be removed from the `in` list."
    );

    let status = Fixture::new(filtering(FilterSpec::prune("prune", &[], &[".message"]))).status();
    assert_eq!(
        message(&status.filters, "prune"),
        "[\".log_type\"] is/are required fields and must be included in the `notIn` list."
    );

    let status = Fixture::new(filtering(FilterSpec::prune(
        "prune",
        &[".kubernetes.labels"],
        &[".log_type", ".message", ".kubernetes"],
    )))
    .status();
    assert!(status.filters.is_ready("prune"));
}

#[test]
fn kube_api_audit_levels_and_stages() {
    let mut filter = FilterSpec {
        name: "audit-policy".to_string(),
        type_: "kubeAPIAudit".to_string(),
        kube_api_audit: Some(KubeApiAudit {
            omit_stages: vec!["RequestReceived".to_string()],
            ..Default::default()
        }),
        ..Default::default()
    };
    assert!(Fixture::new(filtering(filter.clone())).status().filters.is_ready("audit-policy"));

    filter.kube_api_audit.as_mut().unwrap().omit_stages = vec!["Never".to_string()];
    assert_eq!(
        message(&Fixture::new(filtering(filter)).status().filters, "audit-policy"),
        "invalid stage \"Never\""
    );
}

#[test]
fn pipeline_refs() {
    let mut spec = forwarding(vec![http_output("out")]);
    spec.pipelines = vec![
        PipelineSpec::new("", &["application"], &["out"]),
        PipelineSpec::new("p", &["missing"], &["out"]),
        PipelineSpec::new("p", &["application"], &["out"]),
        PipelineSpec::new("q", &["application"], &["nowhere"]).with_filters(&["nothing"]),
        PipelineSpec::new("r", &["audit"], &["default"]),
    ];
    let status = Fixture::new(spec).status();
    assert_eq!(
        message(&status.pipelines, "pipeline_0_"),
        "pipeline must have a name"
    );
    assert_eq!(
        message(&status.pipelines, "p"),
        "invalid: unrecognized inputs: {\"missing\"}, no valid inputs"
    );
    assert_eq!(
        message(&status.pipelines, "pipeline_2_"),
        "duplicate name \"p\""
    );
    assert_eq!(
        message(&status.pipelines, "q"),
        "invalid: unrecognized outputs: {\"nowhere\"}, no valid outputs, unrecognized filters: {\"nothing\"}"
    );
    assert_eq!(
        message(&status.pipelines, "r"),
        "invalid: custom ClusterLogForwarders cannot forward to the `default` log store, \
         unrecognized outputs: {\"default\"}, no valid outputs"
    );
    assert_eq!(
        status.ready_condition().unwrap().message,
        "invalid clf spec; one or more errors present: [\"p\", \"pipeline_0_\", \"pipeline_2_\", \"q\", \"r\"]"
    );
}

#[test]
fn partially_ready_pipeline_invalidates_the_forwarder() {
    let mut spec = forwarding(vec![http_output("good"), http_output("bad")]);
    spec.outputs[1].url = Some("not a url".to_string());
    let status = Fixture::new(spec).status();
    assert!(status.outputs.is_ready("good"));
    assert!(!status.pipelines.is_ready("p"));
    assert!(!status.is_ready());
    assert_eq!(status.ready_condition().unwrap().reason, Some(Reason::Invalid));
}

#[test]
fn empty_label_key_is_invalid() {
    let mut spec = forwarding(vec![http_output("out")]);
    spec.pipelines[0].labels = btreemap! { String::new() => "v".to_string() };
    let status = Fixture::new(spec).status();
    assert_eq!(message(&status.pipelines, "p"), "invalid pipeline labels");
}

#[test]
fn google_cloud_logging_needs_hostname() {
    let mut gcl = OutputSpec::new("gcl", OutputType::GoogleCloudLogging, None);
    gcl.type_spec.google_cloud_logging = Some(GoogleCloudLogging {
        project_id: Some("p".to_string()),
        ..Default::default()
    });
    let mut spec = filtering(FilterSpec::prune("prune", &[".hostname"], &[]));
    spec.pipelines[0].output_refs = vec!["gcl".to_string()];
    spec.outputs = vec![gcl];
    let status = Fixture::new(spec).status();
    assert!(status.filters.is_ready("prune"));
    assert!(!status.pipelines.is_ready("p"));
    assert!(message(&status.pipelines, "p").contains("googleCloudLogging"));
}

#[test]
fn json_parsing_to_elasticsearch_needs_an_index() {
    let es = OutputSpec::new("es", OutputType::Elasticsearch, Some("https://es:9200"));
    let mut spec = forwarding(vec![es]);
    spec.pipelines[0].parse = Some("json".to_string());
    let status = Fixture::new(spec.clone()).status();
    assert_eq!(
        message(&status.pipelines, "p"),
        "structuredTypeKey or structuredTypeName must be defined for Elasticsearch output \"es\" when JSON parsing is enabled on pipeline \"p\""
    );

    spec.output_defaults = Some(logging_forwarder_k8s_api::OutputDefaults {
        elasticsearch: Some(logging_forwarder_k8s_api::output::ElasticsearchStructuredSpec {
            structured_type_key: Some("kubernetes.labels.app".to_string()),
            ..Default::default()
        }),
    });
    assert!(Fixture::new(spec).status().is_ready());
}
