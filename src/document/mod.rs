//! Template documents
//!
//! A [`Document`] is the loaded form of an infrastructure template: an ordered
//! mapping whose values may still contain [`Placeholder`]s. Documents are
//! produced by [`load`] and consumed by [`crate::resolve`].

mod loader;
mod path;
mod value;
mod writer;

pub use loader::{load, load_str, parse_data, LoadError};
pub use path::{KeyPath, PathSegment};
pub use value::{format_number, Mapping, Placeholder, Segment, Value};
pub use writer::{to_json, to_json_compact};

use crate::template::Declarations;

/// Sections whose entries may carry a `"Condition": name` key
pub(crate) const CONDITIONAL_SECTIONS: [&str; 2] = ["Resources", "Outputs"];

/// A loaded template with a non-empty `Resources` section
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Mapping,
}

impl Document {
    /// Build a document from a root mapping.
    ///
    /// Checks the section layout, every parameter declaration and every
    /// condition body, so a loaded document only fails to resolve because of
    /// the values it is resolved against.
    pub fn from_root(root: Mapping) -> Result<Self, LoadError> {
        loader::check_schema(&root)?;
        let doc = Self { root };
        Declarations::collect(&doc).map_err(LoadError::Declaration)?;
        Ok(doc)
    }

    /// Wrap a root the caller has already checked
    pub(crate) fn from_checked_root(root: Mapping) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Mapping {
        &self.root
    }

    pub fn get(&self, section: &str) -> Option<&Value> {
        self.root.get(section)
    }

    /// The `Resources` section
    pub fn resources(&self) -> &Mapping {
        static EMPTY: Mapping = Mapping::EMPTY;
        self.section("Resources").unwrap_or(&EMPTY)
    }

    pub fn parameters(&self) -> Option<&Mapping> {
        self.section("Parameters")
    }

    pub fn conditions(&self) -> Option<&Mapping> {
        self.section("Conditions")
    }

    pub fn outputs(&self) -> Option<&Mapping> {
        self.section("Outputs")
    }

    fn section(&self, name: &str) -> Option<&Mapping> {
        self.root.get(name).and_then(Value::as_mapping)
    }

    /// Whether anything is left to resolve: a placeholder, or a resource or
    /// output still guarded by a `Condition` key
    pub fn has_placeholders(&self) -> bool {
        self.root.values().any(Value::has_placeholders) || self.has_entry_conditions()
    }

    fn has_entry_conditions(&self) -> bool {
        CONDITIONAL_SECTIONS
            .iter()
            .filter_map(|section| self.section(section))
            .flat_map(|section| section.values())
            .filter_map(Value::as_mapping)
            .any(|entry| entry.contains_key("Condition"))
    }

    /// Deterministic pretty JSON; placeholders are written in intrinsic form
    pub fn to_json(&self) -> String {
        writer::mapping_to_json(&self.root)
    }
}
