use std::{fmt, str::FromStr};

/// The collector implementation a forwarder generates configuration for.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub enum CollectorKind {
    #[default]
    Vector,
    Fluentd,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown collector type {0:?}; expected vector or fluentd")]
pub struct UnknownCollectorKind(String);

impl CollectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Fluentd => "fluentd",
        }
    }

    /// The key of the generated configuration in the collector's config map.
    pub fn config_file(&self) -> &'static str {
        match self {
            Self::Vector => "vector.toml",
            Self::Fluentd => "fluent.conf",
        }
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl FromStr for CollectorKind {
    type Err = UnknownCollectorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vector" => Ok(Self::Vector),
            "fluentd" => Ok(Self::Fluentd),
            s => Err(UnknownCollectorKind(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn round_trips_names() {
        assert_eq!("vector".parse(), Ok(CollectorKind::Vector));
        assert_eq!("fluentd".parse(), Ok(CollectorKind::Fluentd));
        assert_eq!(CollectorKind::default().to_string(), "vector");
        assert!("logstash".parse::<CollectorKind>().is_err());
    }

    #[rstest]
    #[case::vector(CollectorKind::Vector, "vector.toml")]
    #[case::fluentd(CollectorKind::Fluentd, "fluent.conf")]
    fn config_files(#[case] kind: CollectorKind, #[case] file: &str) {
        assert_eq!(kind.config_file(), file);
    }
}
