/// The negotiated TLS settings applied to collector listeners and sinks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsProfile {
    /// A version name such as `VersionTLS12`. Empty means "collector default".
    pub min_version: String,
    pub ciphers: Vec<String>,
}

const MODERN_CIPHERS: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
];

const INTERMEDIATE_CIPHERS: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "ECDHE-RSA-AES128-GCM-SHA256",
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-CHACHA20-POLY1305",
    "ECDHE-RSA-CHACHA20-POLY1305",
    "DHE-RSA-AES128-GCM-SHA256",
    "DHE-RSA-AES256-GCM-SHA384",
];

const OLD_EXTRA_CIPHERS: &[&str] = &[
    "DHE-RSA-CHACHA20-POLY1305",
    "ECDHE-ECDSA-AES128-SHA256",
    "ECDHE-RSA-AES128-SHA256",
    "ECDHE-ECDSA-AES128-SHA",
    "ECDHE-RSA-AES128-SHA",
    "ECDHE-ECDSA-AES256-SHA384",
    "ECDHE-RSA-AES256-SHA384",
    "ECDHE-ECDSA-AES256-SHA",
    "ECDHE-RSA-AES256-SHA",
    "DHE-RSA-AES128-SHA256",
    "DHE-RSA-AES256-SHA256",
    "AES128-GCM-SHA256",
    "AES256-GCM-SHA384",
    "AES128-SHA256",
    "AES256-SHA256",
    "AES128-SHA",
    "AES256-SHA",
    "DES-CBC3-SHA",
];

// === impl TlsProfile ===

impl TlsProfile {
    pub fn new(
        min_version: impl Into<String>,
        ciphers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            min_version: min_version.into(),
            ciphers: ciphers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn modern() -> Self {
        Self::new("VersionTLS13", MODERN_CIPHERS.iter().copied())
    }

    pub fn intermediate() -> Self {
        Self::new("VersionTLS12", INTERMEDIATE_CIPHERS.iter().copied())
    }

    pub fn old() -> Self {
        Self::new(
            "VersionTLS10",
            INTERMEDIATE_CIPHERS
                .iter()
                .chain(OLD_EXTRA_CIPHERS.iter())
                .copied(),
        )
    }

    /// Resolves one of the named profiles `Old`, `Intermediate` or `Modern`.
    pub fn named(name: &str) -> Option<Self> {
        match name {
            "Old" => Some(Self::old()),
            "Intermediate" => Some(Self::intermediate()),
            "Modern" => Some(Self::modern()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_version.is_empty() && self.ciphers.is_empty()
    }

    pub fn ciphers_joined(&self, sep: &str) -> String {
        self.ciphers.join(sep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::modern("Modern", Some("VersionTLS13"))]
    #[case::intermediate("Intermediate", Some("VersionTLS12"))]
    #[case::old("Old", Some("VersionTLS10"))]
    #[case::custom("Custom", None)]
    #[case::lowercase("modern", None)]
    fn named_profiles(#[case] name: &str, #[case] min_version: Option<&str>) {
        assert_eq!(
            TlsProfile::named(name).map(|p| p.min_version),
            min_version.map(String::from)
        );
    }

    #[test]
    fn old_is_superset_of_intermediate() {
        let old = TlsProfile::old();
        for c in TlsProfile::intermediate().ciphers {
            assert!(old.ciphers.contains(&c), "{c} missing from old profile");
        }
    }

    #[test]
    fn joins_ciphers() {
        let p = TlsProfile::new("VersionTLS12", ["a", "b"]);
        assert_eq!(p.ciphers_joined(","), "a,b");
        assert!(TlsProfile::default().is_empty());
    }
}
