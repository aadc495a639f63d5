//! Names the forwarder owns.

use logging_forwarder_core::Tenant;

pub const INPUT_APPLICATION: &str = "application";
pub const INPUT_INFRASTRUCTURE: &str = "infrastructure";
pub const INPUT_AUDIT: &str = "audit";

pub const RESERVED_INPUTS: [&str; 3] = [INPUT_APPLICATION, INPUT_INFRASTRUCTURE, INPUT_AUDIT];

/// The output that denotes the cluster's managed log store.
pub const OUTPUT_DEFAULT: &str = "default";

/// The namespace of the legacy singleton forwarder.
pub const LEGACY_NAMESPACE: &str = "openshift-logging";
pub const SINGLETON_NAME: &str = "instance";

/// Service account used by the legacy singleton; reserved for it.
pub const DEFAULT_SERVICE_ACCOUNT: &str = "logcollector";

/// Secret mounted for the managed elasticsearch log store.
pub const COLLECTOR_SECRET: &str = "collector";
pub const LOG_STORE_URL: &str = "https://elasticsearch.openshift-logging.svc:9200";

pub const DEFAULT_ES_VERSION: u32 = 6;
pub const FIRST_ES_VERSION_WITHOUT_TYPE: u32 = 8;

const LOKI_OUTPUT_PREFIX: &str = "default-loki-";

/// Extras flag recording that the migrator synthesised the `default` output.
pub const MIGRATE_DEFAULT_OUTPUT: &str = "migrateDefaultOutput";

pub fn is_reserved_input(name: &str) -> bool {
    RESERVED_INPUTS.contains(&name)
}

pub fn is_legacy(namespace: &str, name: &str) -> bool {
    namespace == LEGACY_NAMESPACE && name == SINGLETON_NAME
}

/// The extras flag that re-owns a reserved input name, e.g.
/// `migrateInputApplication`.
pub fn migrate_input_flag(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("migrateInput{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => "migrateInput".to_string(),
    }
}

/// The tenant-specific output the migrator substitutes for `default` when the
/// log store is a lokistack.
pub fn default_loki_output(tenant: Tenant) -> String {
    format!("{}{}", LOKI_OUTPUT_PREFIX, tenant.short_name())
}

pub fn is_default_loki_output(name: &str) -> bool {
    Tenant::ALL
        .iter()
        .any(|t| name.strip_prefix(LOKI_OUTPUT_PREFIX) == Some(t.short_name()))
}
