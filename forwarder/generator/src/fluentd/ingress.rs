//! The collector's own settings, the sources it reads and the labels that
//! prepare records for routing.

use super::{boxed, tenant_label, Collection, Directive, DATA_DIR};
use crate::{
    framework::{funcs::array, Part, Section},
    metrics, sources, Context,
};
use logging_forwarder_core::{Tenant, TlsProfile};
use logging_forwarder_k8s_api::input::{
    AUDIT_SOURCE_AUDITD, AUDIT_SOURCE_KUBE, AUDIT_SOURCE_OPENSHIFT, AUDIT_SOURCE_OVN,
    INFRA_SOURCE_NODE,
};

const INGRESS: &str = "@INGRESS";
const CONCAT: &str = "@CONCAT";

const INFRA_TAGS: &str = "kubernetes.var.log.pods.openshift_** \
    kubernetes.var.log.pods.openshift-*_** kubernetes.var.log.pods.default_** \
    kubernetes.var.log.pods.kube-*_** journal.** system.var.log**";
const APPLICATION_TAGS: &str = "kubernetes.**";
const AUDIT_TAGS: &str = "linux-audit.log** k8s-audit.log** openshift-audit.log** ovn-audit.log**";

const CONTAINER_LINE: &str =
    r"/^(?<@timestamp>[^\s]+) (?<stream>stdout|stderr) (?<logtag>[F|P]) (?<message>.*)$/";

const KEEP_FIELDS: &str = "CEE,time,@timestamp,aushape,ci_job,collectd,docker,fedora-ci,file,\
    foreman,geoip,hostname,ipaddr4,ipaddr6,kubernetes,level,message,namespace_name,\
    namespace_uuid,offset,openstack,ovirt,pid,pipeline_metadata,rsyslog,service,systemd,tags,\
    testcase,tlog,viaq_msg_id";

const JOURNAL_REMOVE_KEYS: &str = "log,stream,MESSAGE,_SOURCE_REALTIME_TIMESTAMP,\
    __REALTIME_TIMESTAMP,CONTAINER_ID,CONTAINER_ID_FULL,CONTAINER_NAME,PRIORITY,_BOOT_ID,\
    _CAP_EFFECTIVE,_CMDLINE,_COMM,_EXE,_GID,_HOSTNAME,_MACHINE_ID,_PID,_SELINUX_CONTEXT,\
    _SYSTEMD_CGROUP,_SYSTEMD_SLICE,_SYSTEMD_UNIT,_TRANSPORT,_UID,_AUDIT_LOGINUID,_AUDIT_SESSION,\
    _SYSTEMD_OWNER_UID,_SYSTEMD_SESSION,_SYSTEMD_USER_UNIT,CODE_FILE,CODE_FUNCTION,CODE_LINE,ERRNO,\
    MESSAGE_ID,RESULT,UNIT,_KERNEL_DEVICE,_KERNEL_SUBSYSTEM,_UDEV_SYSNAME,_UDEV_DEVNODE,\
    _UDEV_DEVLINK,SYSLOG_FACILITY,SYSLOG_IDENTIFIER,SYSLOG_PID";

/// Journal container names, matched in order, and the tags they are given.
const JOURNAL_RULES: [(&str, &str, &str); 6] = [
    ("CONTAINER_NAME", "^k8s_[^_]+_[^_]+_default_", "kubernetes.journal.container._default_"),
    ("CONTAINER_NAME", "^k8s_[^_]+_[^_]+_kube-(.+)_", "kubernetes.journal.container._kube-$1_"),
    (
        "CONTAINER_NAME",
        "^k8s_[^_]+_[^_]+_openshift-(.+)_",
        "kubernetes.journal.container._openshift-$1_",
    ),
    ("CONTAINER_NAME", "^k8s_[^_]+_[^_]+_openshift_", "kubernetes.journal.container._openshift_"),
    ("CONTAINER_NAME", "^k8s_", "kubernetes.journal.container"),
    ("_TRANSPORT", ".+", "journal.system"),
];

/// The tags of records of `tenant` once they reach the ingress label.
pub(super) fn tags(tenant: Tenant) -> &'static str {
    match tenant {
        Tenant::Application => APPLICATION_TAGS,
        Tenant::Infrastructure => INFRA_TAGS,
        Tenant::Audit => AUDIT_TAGS,
    }
}

pub(super) fn system() -> Directive {
    Directive::new("system").param("log_level", r##""#{ENV['LOG_LEVEL'] || 'warn'}""##)
}

/// The metrics endpoint, served with the cluster's TLS profile, and the
/// monitors that feed it.
pub(super) fn metrics(tls: &TlsProfile) -> Section {
    let transport = Directive::with_arg("transport", "tls")
        .param("cert_path", metrics::CERT_FILE)
        .param("private_key_path", metrics::KEY_FILE)
        .param_opt("min_version", tls_version(&tls.min_version))
        .param_opt(
            "ciphers",
            Some(tls.ciphers_joined(":")).filter(|c| !c.is_empty()),
        );
    let monitor = |type_: &str| {
        Directive::typed("source", None, type_)
            .child(Directive::new("labels").param("hostname", "${hostname}"))
    };
    Section::new(
        "Prometheus monitoring",
        vec![
            boxed(
                Directive::typed("source", None, "prometheus")
                    .param("bind", "\"[::]\"")
                    .child(transport),
            ),
            boxed(monitor("prometheus_monitor")),
            boxed(monitor("collected_tail_monitor")),
            boxed(monitor("prometheus_output_monitor")),
        ],
    )
}

/// Fluentd's name for a cluster TLS version such as `VersionTLS12`.
pub(super) fn tls_version(version: &str) -> Option<&'static str> {
    match version {
        "VersionTLS10" => Some("TLS1"),
        "VersionTLS11" => Some("TLS1_1"),
        "VersionTLS12" => Some("TLS1_2"),
        "VersionTLS13" => Some("TLS1_3"),
        _ => None,
    }
}

/// One source per kind of log file the inputs read.
pub(super) fn sources(cx: &Context<'_>, collection: &Collection) -> Vec<Part> {
    let mut parts = Vec::new();
    if collection.infrastructure.contains(INFRA_SOURCE_NODE) {
        parts.push(section("Logs from linux journal", journal()));
    }
    if collection.reads_containers() {
        parts.push(section(
            "Logs from containers (including openshift containers)",
            containers(cx),
        ));
    }
    for source in &collection.audit {
        let (comment, source) = match source.as_str() {
            AUDIT_SOURCE_AUDITD => (
                "Linux audit logs",
                tail("audit-input", sources::AUDITD_LOGS, "audit.log.pos", "linux-audit.log")
                    .child(Directive::typed("parse", None, "viaq_host_audit")),
            ),
            AUDIT_SOURCE_KUBE => (
                "Kubernetes API audit logs",
                tail(
                    "k8s-audit-input",
                    sources::KUBE_API_LOGS,
                    "kube-apiserver.audit.log.pos",
                    "k8s-audit.log",
                )
                .child(api_audit()),
            ),
            AUDIT_SOURCE_OPENSHIFT => (
                "OpenShift API audit logs",
                tail(
                    "openshift-audit-input",
                    sources::OPENSHIFT_API_LOGS,
                    "oauth-apiserver.audit.log",
                    "openshift-audit.log",
                )
                .child(api_audit()),
            ),
            AUDIT_SOURCE_OVN => (
                "OVN audit logs",
                tail("ovn-audit-input", sources::OVN_LOGS, "acl-audit-log.pos", "ovn-audit.log")
                    .param("refresh_interval", 5)
                    .param("rotate_wait", 5)
                    .param("read_from_head", true)
                    .child(Directive::typed("parse", None, "none")),
            ),
            other => {
                tracing::warn!(source = %other, "Skipping unknown audit source");
                continue;
            }
        };
        parts.push(section(comment, source));
    }
    parts
}

/// The labels every record passes through before it is routed by tenant.
pub(super) fn labels(collection: &Collection) -> Vec<Part> {
    let mut parts = Vec::new();
    if collection.reads_containers() {
        parts.push(section(
            "Concat log lines of container logs, and send to INGRESS pipeline",
            Directive::with_arg("label", CONCAT)
                .child(
                    Directive::typed("filter", Some("kubernetes.**"), "concat")
                        .param("key", "message")
                        .param("partial_key", "logtag")
                        .param("partial_value", "P")
                        .param("separator", "''"),
                )
                .child(relabel("kubernetes.**", INGRESS)),
        ));
    }
    parts.push(section("Ingress pipeline", ingress(collection)));
    parts
}

fn section(comment: &str, directive: Directive) -> Part {
    Part::from(Section::new(comment, vec![boxed(directive)]))
}

fn journal() -> Directive {
    Directive::typed("source", None, "systemd")
        .param("@id", "systemd-input")
        .param("@label", INGRESS)
        .param("path", "'/var/log/journal'")
        .param("matches", r##""#{ENV['JOURNAL_FILTERS_JSON'] || '[]'}""##)
        .param("tag", "journal")
        .param("read_from_head", false)
        .child(
            Directive::typed("storage", None, "local")
                .param("persistent", true)
                .param("path", format!("'{DATA_DIR}/pos/journal_pos.json'")),
        )
}

fn containers(cx: &Context<'_>) -> Directive {
    let read_lines_limit = cx
        .fluentd
        .and_then(|f| f.in_file.as_ref())
        .map(|f| f.read_lines_limit)
        .filter(|n| *n > 0);
    Directive::typed("source", None, "tail")
        .param("@id", "container-input")
        .param("path", format!("\"{}/*/*/*.log\"", sources::POD_LOGS))
        .param("exclude_path", array(sources::excluded_pod_logs(cx)))
        .param("pos_file", format!("\"{DATA_DIR}/pos/es-containers.log.pos\""))
        .param("follow_inodes", true)
        .param("refresh_interval", 5)
        .param("rotate_wait", 5)
        .param("tag", "kubernetes.*")
        .param("read_from_head", "\"true\"")
        .param("skip_refresh_on_startup", true)
        .param_opt("read_lines_limit", read_lines_limit)
        .param("@label", CONCAT)
        .child(
            Directive::typed("parse", None, "regexp")
                .param("expression", CONTAINER_LINE)
                .param("time_key", "'@timestamp'")
                .param("keep_time_key", true),
        )
}

fn tail(id: &str, paths: &[&str], pos_file: &str, tag: &str) -> Directive {
    Directive::typed("source", None, "tail")
        .param("@id", id)
        .param("@label", INGRESS)
        .param("path", format!("\"{}\"", paths.join(",")))
        .param("pos_file", format!("\"{DATA_DIR}/pos/{pos_file}\""))
        .param("follow_inodes", true)
        .param("tag", tag)
}

fn api_audit() -> Directive {
    Directive::typed("parse", None, "json")
        .param("time_key", "requestReceivedTimestamp")
        .param("keep_time_key", true)
        .param("time_format", "%Y-%m-%dT%H:%M:%S.%N%z")
}

fn relabel(tags: &str, label: &str) -> Directive {
    Directive::typed("match", Some(tags), "relabel").param("@label", label)
}

/// Attaches metadata, normalizes records and relabels them by tenant.
/// Tenants no input reads are discarded.
fn ingress(collection: &Collection) -> Directive {
    let mut label = Directive::with_arg("label", INGRESS);

    if collection.infrastructure.contains(INFRA_SOURCE_NODE) {
        let rules = JOURNAL_RULES.iter().map(|(key, pattern, tag)| {
            Directive::new("rule")
                .param("key", key)
                .param("pattern", pattern)
                .param("tag", tag)
        });
        label = label
            .child(
                Directive::typed("filter", Some("journal"), "grep").child(
                    Directive::new("exclude")
                        .param("key", "PRIORITY")
                        .param("pattern", "^7$"),
                ),
            )
            .child(
                Directive::typed("match", Some("journal"), "rewrite_tag_filter")
                    .param("@label", INGRESS)
                    .children(rules),
            );
    }
    if collection.audit.contains(AUDIT_SOURCE_OVN) {
        label = label.child(
            Directive::typed("filter", Some("ovn-audit.log**"), "record_modifier").record([
                (
                    "@timestamp",
                    "${DateTime.parse(record['message'].split('|')[0]).rfc3339(6)}",
                ),
                ("level", "${record['message'].split('|')[3].downcase}"),
            ]),
        );
    }
    if collection.reads_containers() {
        label = label
            .child(
                Directive::typed("filter", Some("kubernetes.**"), "kubernetes_metadata")
                    .param("@id", "kubernetes-metadata")
                    .param("kubernetes_url", "'https://kubernetes.default.svc'")
                    .param("allow_orphans", false)
                    .param("cache_size", "'1000'")
                    .param("ssl_partial_chain", "'true'"),
            )
            .child(
                Directive::typed(
                    "filter",
                    Some("kubernetes.var.log.pods.**_eventrouter-**"),
                    "parse_json_field",
                )
                .param("merge_json_log", true)
                .param("preserve_json_log", true)
                .param("json_fields", "'message'"),
            );
    }
    if collection.audit.contains(AUDIT_SOURCE_KUBE) {
        label = label.child(
            Directive::typed("filter", Some("k8s-audit.log**"), "record_modifier")
                .record([("k8s_audit_level", "${record['level']}")]),
        );
    }
    if collection.audit.contains(AUDIT_SOURCE_OPENSHIFT) {
        label = label.child(
            Directive::typed("filter", Some("openshift-audit.log**"), "record_modifier")
                .record([("openshift_audit_level", "${record['level']}")]),
        );
    }

    label = label
        .child(viaq())
        .child(
            Directive::typed("filter", Some("**"), "elasticsearch_genid_ext")
                .param("hash_id_key", "viaq_msg_id")
                .param("alt_key", "kubernetes.event.metadata.uid")
                .param(
                    "alt_tags",
                    "'kubernetes.var.log.pods.**_eventrouter-*.** kubernetes.journal.container._default_.kubernetes-event'",
                ),
        );

    // Infrastructure tags are matched first; application tags would match
    // them too.
    for tenant in [Tenant::Infrastructure, Tenant::Application, Tenant::Audit] {
        let tags = tags(tenant);
        label = if collection.collects(tenant) {
            label.child(relabel(tags, &tenant_label(tenant)))
        } else {
            label.child(Directive::typed("match", Some(tags), "null"))
        };
    }
    label.child(Directive::typed("match", Some("**"), "stdout"))
}

/// The ViaQ data model, with a formatter per kind of record.
fn viaq() -> Directive {
    let formatter = |tag: &str, type_: &str, remove_keys: &str| {
        Directive::new("formatter")
            .param("tag", format!("\"{tag}\""))
            .param("type", type_)
            .param("remove_keys", remove_keys)
    };
    Directive::typed("filter", Some("**"), "viaq_data_model")
        .param("enable_flatten_labels", true)
        .param("enable_prune_empty_fields", false)
        .param("default_keep_fields", KEEP_FIELDS)
        .param("keep_empty_fields", "'message'")
        .param("rename_time", true)
        .param("pipeline_type", "'collector'")
        .param("process_kubernetes_events", false)
        .child(formatter("journal.system**", "sys_journal", JOURNAL_REMOVE_KEYS))
        .child(
            formatter(
                "kubernetes.var.log.pods.**_eventrouter-** k8s-audit.log** openshift-audit.log** ovn-audit.log**",
                "k8s_json_file",
                "stream",
            )
            .param("process_kubernetes_events", "'true'"),
        )
        .child(formatter("kubernetes.var.log.pods**", "k8s_json_file", "stream"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{framework::Element, tests::Fixture};
    use logging_forwarder_k8s_api::logging::{FluentdForwarderSpec, FluentdInFileSpec};
    use pretty_assertions::assert_eq;

    fn collection(application: bool, infrastructure: &[&str], audit: &[&str]) -> Collection {
        Collection {
            application,
            infrastructure: infrastructure.iter().map(|s| s.to_string()).collect(),
            audit: audit.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn uncollected_tenants_are_discarded() {
        let ingress = ingress(&collection(true, &[], &[])).template();
        assert!(ingress.contains(&format!(
            "<match {INFRA_TAGS}>\n    @type null\n  </match>"
        )));
        assert!(ingress.contains(
            "<match kubernetes.**>\n    @type relabel\n    @label @_APPLICATION\n  </match>"
        ));
        assert!(ingress.contains(&format!("<match {AUDIT_TAGS}>\n    @type null")));
        assert!(!ingress.contains("rewrite_tag_filter"));
        assert!(ingress.trim_end().ends_with("<match **>\n    @type stdout\n  </match>\n</label>"));
    }

    #[test]
    fn infrastructure_is_matched_before_applications() {
        let ingress = ingress(&collection(true, &[INFRA_SOURCE_NODE], &[])).template();
        let infra = ingress.find("@label @_INFRASTRUCTURE").expect("infra is relabeled");
        let app = ingress.find("@label @_APPLICATION").expect("apps are relabeled");
        assert!(infra < app);
        assert!(ingress.contains("rewrite_tag_filter"));
    }

    #[test]
    fn only_selected_audit_sources_are_tailed() {
        let fixture = Fixture::default();
        let cx = crate::tests::context(&fixture);
        let parts = sources(&cx, &collection(false, &[], &[AUDIT_SOURCE_KUBE]));
        assert_eq!(parts.len(), 1);
        let Part::Template(source) = &parts[0] else {
            panic!("sources are templates");
        };
        let source = source.template();
        assert!(source.contains("tag k8s-audit.log"), "{source}");
        assert!(source.contains("path \"/var/log/kube-apiserver/audit.log\""));
        assert!(source.contains("time_key requestReceivedTimestamp"));
    }

    #[test]
    fn container_reads_are_limited() {
        let mut fixture = Fixture::default();
        fixture.fluentd = Some(FluentdForwarderSpec {
            in_file: Some(FluentdInFileSpec {
                read_lines_limit: 50,
            }),
            buffer: None,
        });
        let cx = crate::tests::context(&fixture);
        let source = containers(&cx).template();
        assert!(source.contains("\n  read_lines_limit 50\n"), "{source}");
        assert!(source.contains("/var/log/pods/openshift-logging_instance-*/*/*.log"));
    }

    #[test]
    fn metrics_use_the_cluster_tls_profile() {
        let metrics = metrics(&TlsProfile::new("VersionTLS12", ["A", "B"])).template();
        assert!(metrics.contains("min_version TLS1_2"), "{metrics}");
        assert!(metrics.contains("ciphers A:B"));
        let metrics = super::metrics(&TlsProfile::default()).template();
        assert!(!metrics.contains("min_version"));
    }
}
