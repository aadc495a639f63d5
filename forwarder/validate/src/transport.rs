use crate::{fail, Context, Fatal, Validate};
use logging_forwarder_k8s_api::{url, ClusterLogForwarderStatus, Condition, OutputType};

const CONTENT_TYPES: [&str; 2] = ["application/json", "application/x-ndjson"];

/// TLS settings are only meaningful on an encrypted transport.
pub(crate) struct UrlTls;

/// HTTP outputs send JSON, so an explicit content type must agree.
pub(crate) struct HttpContentType;

impl Validate for UrlTls {
    fn name(&self) -> &'static str {
        "tls"
    }

    fn validate(
        &self,
        cx: &Context<'_>,
        status: &mut ClusterLogForwarderStatus,
    ) -> Result<(), Fatal> {
        for output in cx.spec.outputs.iter().filter(|o| o.has_tls_settings()) {
            let mut urls = output.url().into_iter().collect::<Vec<_>>();
            if let Some(kafka) = output.type_spec.kafka.as_ref() {
                urls.extend(kafka.brokers.iter().map(String::as_str));
            }
            if let Some(insecure) = urls.into_iter().find(|u| !url::is_secure(Some(u))) {
                fail(
                    &mut status.outputs,
                    &output.name,
                    Condition::invalid(format!(
                        "output {:?}: URL {insecure:?} does not use a secure scheme but TLS settings are set",
                        output.name
                    )),
                );
            }
        }
        Ok(())
    }
}

impl Validate for HttpContentType {
    fn name(&self) -> &'static str {
        "http"
    }

    fn validate(
        &self,
        cx: &Context<'_>,
        status: &mut ClusterLogForwarderStatus,
    ) -> Result<(), Fatal> {
        let http_outputs = cx
            .spec
            .outputs
            .iter()
            .filter(|o| o.is_type(OutputType::Http))
            .filter_map(|o| o.type_spec.http.as_ref().map(|h| (o, h)));
        for (output, http) in http_outputs {
            let content_type = http
                .headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                .map(|(_, v)| v.as_str());
            if let Some(ct) = content_type {
                if !CONTENT_TYPES.iter().any(|t| t.eq_ignore_ascii_case(ct)) {
                    fail(
                        &mut status.outputs,
                        &output.name,
                        Condition::invalid(format!(
                            "output {:?}: Content-Type {ct:?} is not supported; use one of {CONTENT_TYPES:?}",
                            output.name
                        )),
                    );
                }
            }
        }
        Ok(())
    }
}
