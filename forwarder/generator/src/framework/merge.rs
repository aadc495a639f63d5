/// Deep-merges `from` into `into`. Tables merge key-wise; any other value in
/// `from` replaces the value in `into`.
pub fn merge(into: &mut toml::Table, from: toml::Table) {
    for (key, value) in from {
        match value {
            toml::Value::Table(table) => match into.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge(existing, table),
                _ => {
                    into.insert(key, toml::Value::Table(table));
                }
            },
            value => {
                into.insert(key, value);
            }
        }
    }
}
