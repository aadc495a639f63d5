use crate::framework::{funcs::indent, Element};
use std::fmt;

/// A fluentd directive: `<name arg>`, its parameters, then any nested
/// directives, each level indented by two spaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Directive {
    name: &'static str,
    arg: Option<String>,
    lines: Vec<String>,
    children: Vec<Directive>,
}

// === impl Directive ===

impl Directive {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            arg: None,
            lines: Vec::new(),
            children: Vec::new(),
        }
    }

    /// `<name arg>`, e.g. `<match kubernetes.**>` or `<label @INGRESS>`.
    pub fn with_arg(name: &'static str, arg: impl Into<String>) -> Self {
        Self {
            arg: Some(arg.into()),
            ..Self::new(name)
        }
    }

    /// A directive whose plugin is `type_`.
    pub fn typed(name: &'static str, arg: Option<&str>, type_: &str) -> Self {
        let directive = match arg {
            Some(arg) => Self::with_arg(name, arg),
            None => Self::new(name),
        };
        directive.param("@type", type_)
    }

    pub fn param(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.lines.push(format!("{key} {value}"));
        self
    }

    pub fn param_opt(self, key: &str, value: Option<impl fmt::Display>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    pub fn child(mut self, child: Directive) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Directive>) -> Self {
        self.children.extend(children);
        self
    }

    /// Adds `<record>` with one `key expression` line per field.
    pub fn record<K, V>(self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: fmt::Display,
        V: fmt::Display,
    {
        let record = fields
            .into_iter()
            .fold(Directive::new("record"), |record, (k, v)| {
                record.param(&k.to_string(), v)
            });
        self.child(record)
    }

    /// True when `key` is set directly on this directive.
    #[cfg(test)]
    pub fn has_param(&self, key: &str) -> bool {
        let prefix = format!("{key} ");
        self.lines.iter().any(|l| l.starts_with(&prefix))
    }

    fn render(&self) -> String {
        let open = match &self.arg {
            Some(arg) => format!("<{} {arg}>", self.name),
            None => format!("<{}>", self.name),
        };
        let body = self
            .lines
            .iter()
            .cloned()
            .chain(self.children.iter().map(Directive::render))
            .collect::<Vec<_>>()
            .join("\n");
        if body.is_empty() {
            return format!("{open}\n</{}>", self.name);
        }
        format!("{open}\n{}\n</{}>", indent(2, &body), self.name)
    }
}

impl Element for Directive {
    fn name(&self) -> &str {
        self.name
    }

    fn template(&self) -> String {
        self.render()
    }
}
