use crate::{lookup::LookupError, Tenant};

/// Answers whether a service account may collect a tenant's logs.
///
/// Implementations resolve a subject access review for the verb `collect` on
/// the `logs` resource named after the tenant, e.g. `application`.
pub trait AccessReviewer {
    fn can_collect(
        &self,
        service_account: &str,
        namespace: &str,
        tenant: Tenant,
    ) -> Result<bool, LookupError>;
}

impl<A: AccessReviewer + ?Sized> AccessReviewer for &A {
    fn can_collect(
        &self,
        service_account: &str,
        namespace: &str,
        tenant: Tenant,
    ) -> Result<bool, LookupError> {
        (**self).can_collect(service_account, namespace, tenant)
    }
}

/// The username a service account authenticates as.
pub fn service_account_user(namespace: &str, name: &str) -> String {
    format!("system:serviceaccount:{namespace}:{name}")
}
