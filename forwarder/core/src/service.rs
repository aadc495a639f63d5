/// A port the collector service must expose for a receiver input.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServiceRequirement {
    pub name: String,
    pub port: u16,
    pub target_port: u16,
}
