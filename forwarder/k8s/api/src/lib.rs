#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Forwarder resource types and the predicates shared by the migrator, the
//! validator and the generator.

pub mod filter;
pub mod forwarder;
pub mod input;
pub mod logging;
pub mod names;
pub mod output;
pub mod pipeline;
pub mod routes;
pub mod status;
pub mod url;

pub use self::{
    filter::{DropCondition, DropTest, FilterSpec, FilterType, KubeApiAudit, PruneFilterSpec},
    forwarder::{ClusterLogForwarder, ClusterLogForwarderSpec, OutputDefaults},
    input::{
        Application, Audit, HttpReceiver, Infrastructure, InputSpec, LimitSpec,
        NamespaceContainerSpec, ReceiverSpec, ReceiverType, SyslogReceiver,
    },
    logging::{ClusterLogging, ClusterLoggingSpec, LogStoreKind},
    output::{OutputSpec, OutputType, OutputTypeSpec},
    pipeline::PipelineSpec,
    routes::{RouteMap, Routes},
    status::{
        ClusterLogForwarderStatus, Condition, ConditionStatus, ConditionType, Conditions,
        NamedConditions, Reason,
    },
};
pub use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServicePort, ServiceSpec};
pub use kube::api::{Api, ObjectMeta, Patch, PatchParams, ResourceExt};
pub use kube::{Client, Resource};
pub use logging_forwarder_core::Tenant;
