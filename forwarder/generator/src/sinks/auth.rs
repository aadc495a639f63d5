//! Credentials carried as `auth.*` keys of a sink.

use super::Sink;
use crate::framework::funcs::kv;
use logging_forwarder_core::secret::{BEARER_TOKEN, PASSWORD, USERNAME};

/// Basic auth from the secret's username and password, when it has both.
pub(crate) fn basic(sink: &Sink<'_>) -> Vec<String> {
    match (sink.secret_ref(USERNAME), sink.secret_ref(PASSWORD)) {
        (Some(user), Some(password)) => vec![
            r#"auth.strategy = "basic""#.to_string(),
            kv("auth.user", Some(user)),
            kv("auth.password", Some(password)),
        ],
        _ => Vec::new(),
    }
}

/// Bearer auth from the secret's token.
pub(crate) fn bearer(sink: &Sink<'_>) -> Vec<String> {
    match sink.secret_ref(BEARER_TOKEN) {
        Some(token) => bearer_token(token),
        None => Vec::new(),
    }
}

pub(crate) fn bearer_token(token: String) -> Vec<String> {
    vec![
        r#"auth.strategy = "bearer""#.to_string(),
        kv("auth.token", Some(token)),
    ]
}

/// Basic auth when available, otherwise a bearer token.
pub(crate) fn basic_or_bearer(sink: &Sink<'_>) -> Vec<String> {
    let basic = basic(sink);
    if basic.is_empty() {
        bearer(sink)
    } else {
        basic
    }
}
