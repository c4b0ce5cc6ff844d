//! Central registry of dependency identifiers.
//!
//! The registry is a list of definitions. A definition with a non-empty
//! `provides` list is an alias: it names another way of satisfying the
//! canonical identifiers it provides. Aliases resolve one level deep; the
//! registry never chains aliases.
//!
//! A [`Registry`] is loaded once and never mutated. Every accessor re-iterates
//! the definitions in document order, so iterators are restartable by calling
//! the accessor again.
//!
//! ## Examples
//!
//! ```
//! use depmap_lib::Registry;
//!
//! let registry = Registry::from_json(r#"{
//!     "definitions": [
//!         {"id": "dep:generic/arrow"},
//!         {"id": "dep:github/apache/arrow", "provides": ["dep:generic/arrow"]}
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(registry.canonical_entries().count(), 1);
//! assert_eq!(registry.alias_entries().count(), 1);
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dep_url::DepUrl;
use crate::source::{DEFAULT_REGISTRY_URL, DocumentSource, parse_document};
use crate::{DepmapError, Result};

const VIRTUAL_PREFIX: &str = "dep:virtual/";
const GENERIC_PREFIX: &str = "dep:generic/";

/// One definition in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// The dependency identifier this definition describes.
    pub id: String,
    /// Identifiers this definition is an alias or implementation of.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
}

impl Definition {
    /// Whether this definition names a real package rather than an alias.
    ///
    /// Virtual identifiers are always canonical. So is any definition that
    /// only provides virtual identifiers.
    pub fn is_canonical(&self) -> bool {
        self.id.starts_with(VIRTUAL_PREFIX)
            || self.provides.iter().all(|p| p.starts_with(VIRTUAL_PREFIX))
    }

    /// Whether this definition provides one or more other identifiers.
    pub fn is_alias(&self) -> bool {
        !self.provides.is_empty()
    }
}

/// The loaded registry document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    schema: Option<String>,
    definitions: Vec<Definition>,
}

impl Registry {
    /// Loads the registry from a path or URL.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::Io`] or [`DepmapError::Fetch`] when the document
    /// cannot be read, and [`DepmapError::Schema`] when it has the wrong shape.
    pub fn load(source: &DocumentSource) -> Result<Self> {
        let registry: Self = source.load("registry")?;
        debug!(%source, definitions = registry.definitions.len(), "loaded registry");
        Ok(registry)
    }

    /// Loads the registry from its default remote location.
    pub fn from_default() -> Result<Self> {
        Self::load(&DocumentSource::parse(DEFAULT_REGISTRY_URL))
    }

    /// Parses a registry from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        parse_document(text, "registry", "<inline>")
    }

    /// The `$schema` pointer declared by the document, if any.
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// All definitions, in document order.
    pub fn all_entries(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.iter()
    }

    /// Distinct ids, in order of first appearance.
    pub fn unique_ids(&self) -> impl Iterator<Item = &str> {
        let mut seen = HashSet::new();
        self.all_entries()
            .map(|d| d.id.as_str())
            .filter(move |id| seen.insert(*id))
    }

    /// Every definition, canonical or alias, whose id equals `id`.
    pub fn entries_by_id<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Definition> {
        self.all_entries().filter(move |d| d.id == id)
    }

    pub fn canonical_entries(&self) -> impl Iterator<Item = &Definition> {
        self.all_entries().filter(|d| d.is_canonical())
    }

    pub fn alias_entries(&self) -> impl Iterator<Item = &Definition> {
        self.all_entries().filter(|d| d.is_alias())
    }

    /// Definitions whose id starts with `prefix`.
    pub fn entries_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a Definition> {
        self.all_entries().filter(move |d| d.id.starts_with(prefix))
    }

    pub fn generic_entries(&self) -> impl Iterator<Item = &Definition> {
        self.entries_with_prefix(GENERIC_PREFIX)
    }

    pub fn virtual_entries(&self) -> impl Iterator<Item = &Definition> {
        self.entries_with_prefix(VIRTUAL_PREFIX)
    }

    /// Whether any definition uses `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.entries_by_id(id).next().is_some()
    }

    /// Canonical ids provided by the alias `id`.
    pub fn provided_by<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> {
        self.alias_entries()
            .filter(move |alias| alias.id == id)
            .flat_map(|alias| alias.provides.iter().map(String::as_str))
    }

    /// Alias ids that provide the canonical `id`.
    pub fn aliases_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> {
        self.alias_entries()
            .filter(move |alias| alias.provides.iter().any(|p| p == id))
            .map(|alias| alias.id.as_str())
    }

    /// Checks that every id and every `provides` target parses as a
    /// dependency identifier.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::Schema`] listing every invalid identifier.
    pub fn validate(&self) -> Result<()> {
        let problems: Vec<String> = self
            .all_entries()
            .flat_map(|d| std::iter::once(&d.id).chain(d.provides.iter()))
            .filter_map(|id| DepUrl::parse(id).err().map(|e| e.to_string()))
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(DepmapError::Schema {
                document: "registry",
                source_label: "definitions".to_string(),
                message: problems.join("; "),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Registry {
        Registry::from_json(
            r#"{
                "definitions": [
                    {"id": "dep:generic/arrow"},
                    {"id": "dep:virtual/compiler/c"},
                    {"id": "dep:generic/gcc", "provides": ["dep:virtual/compiler/c"]},
                    {"id": "dep:github/apache/arrow", "provides": ["dep:generic/arrow"]},
                    {"id": "dep:generic/arrow", "description": "duplicate on purpose"},
                    {"id": "dep:generic/zlib"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_all_entries_preserve_document_order() {
        let registry = sample();
        let ids: Vec<&str> = registry.all_entries().map(|d| d.id.as_str()).collect();
        assert_eq!(ids[0], "dep:generic/arrow");
        assert_eq!(ids[5], "dep:generic/zlib");
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let registry = sample();
        assert_eq!(registry.all_entries().count(), registry.all_entries().count());
    }

    #[test]
    fn test_unique_ids_deduplicate_by_first_occurrence() {
        let registry = sample();
        let ids: Vec<&str> = registry.unique_ids().collect();
        assert_eq!(
            ids,
            vec![
                "dep:generic/arrow",
                "dep:virtual/compiler/c",
                "dep:generic/gcc",
                "dep:github/apache/arrow",
                "dep:generic/zlib",
            ]
        );
    }

    #[test]
    fn test_entries_by_id_returns_every_match() {
        let registry = sample();
        assert_eq!(registry.entries_by_id("dep:generic/arrow").count(), 2);
        assert_eq!(registry.entries_by_id("dep:generic/nope").count(), 0);
    }

    #[test]
    fn test_canonical_includes_virtual_providers() {
        let registry = sample();
        let ids: Vec<&str> = registry.canonical_entries().map(|d| d.id.as_str()).collect();
        assert!(ids.contains(&"dep:generic/gcc"));
        assert!(ids.contains(&"dep:virtual/compiler/c"));
        assert!(!ids.contains(&"dep:github/apache/arrow"));
    }

    #[test]
    fn test_alias_entries_have_provides() {
        let registry = sample();
        let ids: Vec<&str> = registry.alias_entries().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["dep:generic/gcc", "dep:github/apache/arrow"]);
    }

    #[test]
    fn test_prefix_filters() {
        let registry = sample();
        assert_eq!(registry.virtual_entries().count(), 1);
        assert_eq!(registry.generic_entries().count(), 4);
        assert_eq!(registry.entries_with_prefix("dep:github/").count(), 1);
    }

    #[test]
    fn test_alias_lookups_go_both_ways() {
        let registry = sample();
        let provided: Vec<&str> = registry.provided_by("dep:github/apache/arrow").collect();
        assert_eq!(provided, vec!["dep:generic/arrow"]);
        let aliases: Vec<&str> = registry.aliases_of("dep:generic/arrow").collect();
        assert_eq!(aliases, vec!["dep:github/apache/arrow"]);
    }

    #[test]
    fn test_validate_accepts_parsable_ids() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_every_bad_id() {
        let registry = Registry::from_json(
            r#"{"definitions": [
                {"id": "pkg:generic/bad"},
                {"id": "dep:generic/ok", "provides": ["dep:virtual/nope/x"]}
            ]}"#,
        )
        .unwrap();
        let err = registry.validate().unwrap_err().to_string();
        assert!(err.contains("pkg:generic/bad"));
        assert!(err.contains("dep:virtual/nope/x"));
    }

    #[test]
    fn test_missing_definitions_is_schema_error() {
        assert!(matches!(
            Registry::from_json("{}"),
            Err(DepmapError::Schema { document: "registry", .. })
        ));
    }
}
