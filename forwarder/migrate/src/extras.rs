use std::collections::BTreeSet;

/// Flags raised by migration that later stages consult, such as
/// `migrateDefaultOutput` or `migrateInputApplication`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extras(BTreeSet<String>);

impl Extras {
    pub fn set(&mut self, flag: impl Into<String>) {
        self.0.insert(flag.into());
    }

    pub fn has(&self, flag: &str) -> bool {
        self.0.contains(flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Extras {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
