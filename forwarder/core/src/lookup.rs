use crate::tls::TlsProfile;

/// Cluster-scoped resources the generator reads but never writes.
pub trait ResourceLookup {
    fn cluster_tls_profile(&self) -> Result<TlsProfile, LookupError>;

    /// The cluster's infrastructure name, used as the default cloudwatch
    /// group prefix.
    fn cluster_infrastructure_name(&self) -> Result<String, LookupError>;
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// The lookup did not complete before the caller's deadline.
    #[error("lookup timed out")]
    Timeout,

    #[error("lookup failed: {0}")]
    Unavailable(String),
}

/// A [`ResourceLookup`] answered from fixed values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticResources {
    pub tls_profile: TlsProfile,
    pub infrastructure_name: String,
}

impl ResourceLookup for StaticResources {
    fn cluster_tls_profile(&self) -> Result<TlsProfile, LookupError> {
        Ok(self.tls_profile.clone())
    }

    fn cluster_infrastructure_name(&self) -> Result<String, LookupError> {
        Ok(self.infrastructure_name.clone())
    }
}

impl<L: ResourceLookup + ?Sized> ResourceLookup for &L {
    fn cluster_tls_profile(&self) -> Result<TlsProfile, LookupError> {
        (**self).cluster_tls_profile()
    }

    fn cluster_infrastructure_name(&self) -> Result<String, LookupError> {
        (**self).cluster_infrastructure_name()
    }
}
