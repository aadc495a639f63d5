use std::{fmt, str::FromStr};

/// One of the three log partitions that access reviews and tenant-aware log
/// stores are keyed by.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tenant {
    Application,
    Infrastructure,
    Audit,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("not a log tenant: {0:?}")]
pub struct UnknownTenant(String);

// === impl Tenant ===

impl Tenant {
    pub const ALL: [Tenant; 3] = [Tenant::Application, Tenant::Infrastructure, Tenant::Audit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Infrastructure => "infrastructure",
            Self::Audit => "audit",
        }
    }

    /// The short form used in tenant-specific output names, e.g.
    /// `default-loki-apps`.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Application => "apps",
            Self::Infrastructure => "infra",
            Self::Audit => "audit",
        }
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl FromStr for Tenant {
    type Err = UnknownTenant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "application" => Ok(Self::Application),
            "infrastructure" => Ok(Self::Infrastructure),
            "audit" => Ok(Self::Audit),
            s => Err(UnknownTenant(s.to_string())),
        }
    }
}
