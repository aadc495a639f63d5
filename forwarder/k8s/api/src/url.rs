use http::Uri;

const TLS_SCHEMES: [&str; 4] = ["https", "tls", "udps", "wss"];

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("invalid URL {url:?}: {reason}")]
    Parse { url: String, reason: String },

    #[error("URL is not absolute: {0:?}")]
    NotAbsolute(String),
}

/// Parses `url`, requiring both a scheme and an authority.
pub fn parse_absolute(url: &str) -> Result<Uri, UrlError> {
    let uri = url.parse::<Uri>().map_err(|e| UrlError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(UrlError::NotAbsolute(url.to_string()));
    }
    Ok(uri)
}

/// The lowercased scheme of `url`, if it parses as an absolute URL.
pub fn scheme(url: &str) -> Option<String> {
    parse_absolute(url)
        .ok()
        .and_then(|u| u.scheme_str().map(str::to_ascii_lowercase))
}

pub fn is_tls_scheme(scheme: &str) -> bool {
    TLS_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str())
}

/// True when traffic to `url` is encrypted, or when there is no URL and the
/// sink decides its own transport.
pub fn is_secure(url: Option<&str>) -> bool {
    match url {
        None | Some("") => true,
        Some(url) => scheme(url).map(|s| is_tls_scheme(&s)).unwrap_or(false),
    }
}
