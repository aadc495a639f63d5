//! Renders collector configuration from elements.
//!
//! Template elements render themselves to text and appear in the document in
//! the order they are given. Structured elements contribute nested tables
//! that are deep-merged, in order, into a single table that is written once
//! after all template elements.

pub mod funcs;
mod merge;

pub use self::merge::merge;

/// A named fragment of the document that renders itself to text.
pub trait Element {
    /// The component ID, or a label for elements that are not components.
    fn name(&self) -> &str;

    fn template(&self) -> String;
}

/// A fragment that contributes keys to the document's merged table.
pub trait StructuredElement {
    fn config(&self) -> toml::Table;
}

/// A commented group of elements.
pub struct Section {
    comment: String,
    elements: Vec<Box<dyn Element>>,
}

/// One unit of generator input.
pub enum Part {
    Template(Box<dyn Element>),
    Structured(Box<dyn StructuredElement>),
}

/// Renders a sequence of parts into one document.
#[derive(Clone, Copy, Debug, Default)]
pub struct Generator(());

// === impl Section ===

impl Section {
    pub fn new(comment: impl Into<String>, elements: Vec<Box<dyn Element>>) -> Self {
        Self {
            comment: comment.into(),
            elements,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl Element for Section {
    fn name(&self) -> &str {
        &self.comment
    }

    fn template(&self) -> String {
        let body = funcs::compose(&self.elements);
        let comment = self
            .comment
            .lines()
            .map(|l| format!("# {l}"))
            .collect::<Vec<_>>()
            .join("\n");
        if body.is_empty() {
            return comment;
        }
        format!("{comment}\n{body}")
    }
}

// === impl Part ===

impl Part {
    pub fn template(element: impl Element + 'static) -> Self {
        Self::Template(Box::new(element))
    }

    pub fn structured(element: impl StructuredElement + 'static) -> Self {
        Self::Structured(Box::new(element))
    }
}

impl From<Section> for Part {
    fn from(section: Section) -> Self {
        Self::Template(Box::new(section))
    }
}

// === impl Generator ===

impl Generator {
    pub fn generate(&self, parts: impl IntoIterator<Item = Part>) -> String {
        let mut templates = Vec::new();
        let mut merged = toml::Table::new();
        for part in parts {
            match part {
                Part::Template(element) => templates.push(element),
                Part::Structured(element) => merge(&mut merged, element.config()),
            }
        }

        let mut doc = funcs::compose(&templates);
        let structured = funcs::render_table(&merged);
        if !structured.is_empty() {
            if !doc.is_empty() {
                doc.push_str("\n\n");
            }
            doc.push_str(&structured);
        }
        doc.push('\n');
        doc
    }
}
