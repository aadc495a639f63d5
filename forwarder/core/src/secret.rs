use crate::lookup::LookupError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

pub const TLS_CERT: &str = "tls.crt";
pub const TLS_KEY: &str = "tls.key";
pub const CA_BUNDLE: &str = "ca-bundle.crt";
pub const USERNAME: &str = "username";
pub const PASSWORD: &str = "password";
pub const PASSPHRASE: &str = "passphrase";
pub const BEARER_TOKEN: &str = "token";
pub const SHARED_KEY: &str = "shared_key";
pub const AWS_ACCESS_KEY_ID: &str = "aws_access_key_id";
pub const AWS_SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
pub const AWS_ROLE_ARN: &str = "role_arn";
pub const AWS_CREDENTIALS: &str = "credentials";
pub const SPLUNK_HEC_TOKEN: &str = "hecToken";
pub const GOOGLE_CREDENTIALS: &str = "google-application-credentials.json";

static ROLE_ARN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"arn:aws:iam::\d+:role/[\w+=,.@-]+").expect("role ARN pattern must compile")
});

/// Read-only access to the secrets an output or receiver refers to.
///
/// `Ok(None)` means the secret does not exist. Errors are reserved for lookups
/// that could not be answered.
pub trait SecretStore {
    fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, LookupError>;
}

/// A named map of secret keys to their raw values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Secret {
    pub name: String,
    data: BTreeMap<String, Vec<u8>>,
}

/// An in-memory set of secrets, grouped by namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecretSnapshot {
    namespaces: BTreeMap<String, BTreeMap<String, Secret>>,
}

// === impl Secret ===

impl Secret {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Returns the value of `key` if it is valid UTF-8.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn has_keys(&self, keys: &[&str]) -> bool {
        keys.iter().all(|k| self.has_key(k))
    }

    /// True if `key` is present with a value that is not blank.
    pub fn has_non_empty(&self, key: &str) -> bool {
        self.get_str(key)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// The AWS role ARN held in `role_arn`, or embedded in a `credentials`
    /// profile.
    pub fn aws_role_arn(&self) -> Option<&str> {
        [AWS_ROLE_ARN, AWS_CREDENTIALS]
            .iter()
            .filter_map(|key| self.get_str(key))
            .find_map(|value| ROLE_ARN.find(value))
            .map(|m| m.as_str())
    }
}

// === impl SecretSnapshot ===

impl SecretSnapshot {
    pub fn insert(&mut self, namespace: impl Into<String>, secret: Secret) {
        self.namespaces
            .entry(namespace.into())
            .or_default()
            .insert(secret.name.clone(), secret);
    }

    pub fn remove(&mut self, namespace: &str, name: &str) -> Option<Secret> {
        let secrets = self.namespaces.get_mut(namespace)?;
        let removed = secrets.remove(name);
        if secrets.is_empty() {
            self.namespaces.remove(namespace);
        }
        removed
    }

    /// Copies the secrets of a single namespace into a new snapshot.
    pub fn namespace(&self, namespace: &str) -> Self {
        let mut snapshot = Self::default();
        if let Some(secrets) = self.namespaces.get(namespace) {
            snapshot
                .namespaces
                .insert(namespace.to_string(), secrets.clone());
        }
        snapshot
    }

    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces.get(namespace).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

impl SecretStore for SecretSnapshot {
    fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, LookupError> {
        Ok(self
            .namespaces
            .get(namespace)
            .and_then(|secrets| secrets.get(name))
            .cloned())
    }
}

impl<S: SecretStore + ?Sized> SecretStore for &S {
    fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, LookupError> {
        (**self).get(namespace, name)
    }
}

impl<S: SecretStore + ?Sized> SecretStore for std::sync::Arc<S> {
    fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, LookupError> {
        (**self).get(namespace, name)
    }
}
