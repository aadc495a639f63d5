//! Helpers that element templates are written with.

use super::Element;

/// Renders each element, skipping empty ones, separated by blank lines.
pub fn compose(elements: &[Box<dyn Element>]) -> String {
    elements
        .iter()
        .map(|e| compose_one(e.as_ref()))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn compose_one(element: &dyn Element) -> String {
    element.template().trim().to_string()
}

/// `key = value`, or nothing when there is no value.
pub fn kv(key: &str, value: Option<impl Into<toml::Value>>) -> String {
    match value {
        Some(value) => format!("{key} = {}", value.into()),
        None => String::new(),
    }
}

/// Joins the non-empty lines of a template.
pub fn lines(parts: impl IntoIterator<Item = String>) -> String {
    parts
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn indent(n: usize, s: &str) -> String {
    let pad = " ".repeat(n);
    s.lines()
        .map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                format!("{pad}{l}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Quoted strings separated by commas.
pub fn comma_separated<S: AsRef<str>>(items: impl IntoIterator<Item = S>) -> String {
    items
        .into_iter()
        .map(|s| quote(s.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// An array of strings.
pub fn array<S: AsRef<str>>(items: impl IntoIterator<Item = S>) -> String {
    format!("[{}]", comma_separated(items))
}

/// Keys in ascending order, whatever the map's own iteration order is.
pub fn sorted_keys<'a, K: Ord + 'a, V: 'a>(
    map: impl IntoIterator<Item = (&'a K, &'a V)>,
) -> Vec<&'a K> {
    let mut keys = map.into_iter().map(|(k, _)| k).collect::<Vec<_>>();
    keys.sort();
    keys
}

/// A string value.
pub fn quote(s: &str) -> String {
    toml::Value::String(s.to_string()).to_string()
}

/// A multi-line string value, used for transform source code.
pub fn multiline(s: &str) -> String {
    if s.contains("'''") {
        return quote(s);
    }
    format!("'''\n{}\n'''", s.trim())
}

/// A table key, quoted unless it is a bare key.
pub fn key(k: &str) -> String {
    let bare = !k.is_empty()
        && k
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if bare {
        k.to_string()
    } else {
        quote(k)
    }
}

/// Renders the tables of `table` under `[dotted.path]` headers, in key
/// order. Root-level values are not rendered; they would attach to whatever
/// table precedes them in the document.
pub fn render_table(table: &toml::Table) -> String {
    let mut out = Vec::new();
    for (k, v) in table {
        match v {
            toml::Value::Table(t) => render_into(&mut vec![k.as_str()], t, &mut out),
            _ => tracing::warn!(key = %k, "Dropping root-level value from structured configuration"),
        }
    }
    out.join("\n\n")
}

fn render_into<'a>(path: &mut Vec<&'a str>, table: &'a toml::Table, out: &mut Vec<String>) {
    let values = table
        .iter()
        .filter(|(_, v)| !v.is_table())
        .map(|(k, v)| format!("{} = {v}", key(k)))
        .collect::<Vec<_>>();
    if !values.is_empty() {
        let header = path.iter().map(|s| key(s)).collect::<Vec<_>>().join(".");
        out.push(format!("[{header}]\n{}", values.join("\n")));
    }
    for (k, v) in table {
        if let toml::Value::Table(t) = v {
            path.push(k);
            render_into(path, t, out);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;
    use pretty_assertions::assert_eq;

    #[test]
    fn kv_renders_or_omits() {
        assert_eq!(kv("threshold", Some(10)), "threshold = 10");
        assert_eq!(kv("enabled", Some(true)), "enabled = true");
        assert_eq!(kv("endpoint", None::<&str>), "");
        assert_eq!(kv("region", Some("us-east-1")), "region = \"us-east-1\"");
    }

    #[test]
    fn arrays_quote_items() {
        assert_eq!(array(["a", "b"]), r#"["a", "b"]"#);
        assert_eq!(array(Vec::<String>::new()), "[]");
        assert_eq!(comma_separated(["x"]), r#""x""#);
    }

    #[test]
    fn indents_non_empty_lines() {
        assert_eq!(indent(2, "a\n\nb"), "  a\n\n  b");
    }

    #[test]
    fn keys_are_sorted() {
        let map = hashmap! { "b" => 1, "c" => 3, "a" => 2 };
        assert_eq!(sorted_keys(&map), vec![&"a", &"b", &"c"]);
    }

    #[test]
    fn quotes_keys_that_are_not_bare() {
        assert_eq!(key("max_events"), "max_events");
        assert_eq!(key("Content-Type"), "Content-Type");
        assert_eq!(key("a.b"), "\"a.b\"");
    }

    #[test]
    fn multiline_sources() {
        assert_eq!(multiline("\n.a = 1\n"), "'''\n.a = 1\n'''");
        let escaped = multiline("x = ''' y");
        let doc = format!("source = {escaped}").parse::<toml::Table>().unwrap();
        assert_eq!(doc["source"].as_str(), Some("x = ''' y"));
    }

    #[test]
    fn renders_nested_tables_with_headers() {
        let table: toml::Table = r#"
            [sinks.out.buffer]
            max_events = 10
            [sinks.out.request]
            retry_attempts = 2
            [sinks.out.request.headers]
            "Content-Type" = "application/json"
        "#
        .parse()
        .unwrap();
        let rendered = render_table(&table);
        assert_eq!(
            rendered,
            "[sinks.out.buffer]\nmax_events = 10\n\n[sinks.out.request]\nretry_attempts = 2\n\n[sinks.out.request.headers]\nContent-Type = \"application/json\""
        );
        assert_eq!(rendered.parse::<toml::Table>().unwrap(), table);
    }
}
