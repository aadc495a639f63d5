use crate::{
    core::{access::service_account_user, AccessReviewer, LookupError, Tenant},
    k8s::{self, Resource},
};
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
};
use kube::api::PostParams;
use std::collections::BTreeMap;
use tokio::time;

/// The outcome of reviewing whether a service account may collect each
/// tenant's logs.
///
/// Reviews are resolved before a reconcile starts so that validation can
/// consult them synchronously.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReviewedAccess {
    namespace: String,
    service_account: String,
    reviews: BTreeMap<Tenant, Result<bool, LookupError>>,
}

// === impl ReviewedAccess ===

impl ReviewedAccess {
    pub fn new(namespace: impl Into<String>, service_account: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            service_account: service_account.into(),
            reviews: BTreeMap::new(),
        }
    }

    pub fn with(mut self, tenant: Tenant, result: Result<bool, LookupError>) -> Self {
        self.reviews.insert(tenant, result);
        self
    }

    /// Reviews the service account's access to every tenant. Reviews that
    /// have not completed by `deadline` time out.
    pub async fn review(
        client: &k8s::Client,
        namespace: &str,
        service_account: &str,
        deadline: time::Instant,
    ) -> Self {
        let api = k8s::Api::<SubjectAccessReview>::all(client.clone());
        let params = PostParams::default();

        let mut access = Self::new(namespace, service_account);
        for tenant in Tenant::ALL {
            let review = access_review(namespace, service_account, tenant);
            let result = match time::timeout_at(deadline, api.create(&params, &review)).await {
                Ok(Ok(review)) => Ok(review.status.map(|s| s.allowed).unwrap_or(false)),
                Ok(Err(error)) => Err(LookupError::Unavailable(error.to_string())),
                Err(_) => Err(LookupError::Timeout),
            };
            tracing::debug!(%namespace, serviceaccount = %service_account, %tenant, ?result, "Reviewed access");
            access.reviews.insert(tenant, result);
        }
        access
    }
}

impl AccessReviewer for ReviewedAccess {
    fn can_collect(
        &self,
        service_account: &str,
        namespace: &str,
        tenant: Tenant,
    ) -> Result<bool, LookupError> {
        if service_account != self.service_account || namespace != self.namespace {
            return Err(LookupError::Unavailable(format!(
                "access of {:?} was not reviewed",
                service_account_user(namespace, service_account),
            )));
        }
        match self.reviews.get(&tenant) {
            Some(result) => result.clone(),
            None => Err(LookupError::Unavailable(format!(
                "access to {tenant} logs was not reviewed"
            ))),
        }
    }
}

/// Asks whether `service_account` may `collect` the `logs` of `tenant`.
fn access_review(namespace: &str, service_account: &str, tenant: Tenant) -> SubjectAccessReview {
    SubjectAccessReview {
        spec: SubjectAccessReviewSpec {
            user: Some(service_account_user(namespace, service_account)),
            groups: Some(vec![
                "system:serviceaccounts".to_string(),
                format!("system:serviceaccounts:{namespace}"),
            ]),
            resource_attributes: Some(ResourceAttributes {
                namespace: Some(namespace.to_string()),
                verb: Some("collect".to_string()),
                group: Some(k8s::ClusterLogForwarder::group(&()).into_owned()),
                resource: Some("logs".to_string()),
                name: Some(tenant.as_str().to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}
