//! Catalog of known ecosystems.
//!
//! The catalog maps each ecosystem name to the location of its mapping
//! document. Relative locations resolve against the catalog's own location,
//! so a catalog and its mappings can live side by side on disk.
//!
//! Ecosystems keep the order the document lists them in. When several
//! ecosystems share a package manager, the first one listed wins.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::mapping::Mapping;
use crate::source::{DEFAULT_ECOSYSTEMS_URL, DocumentSource, parse_document};
use crate::{DepmapError, Result};

/// A catalog entry pointing at an ecosystem's mapping document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcosystemEntry {
    /// Path or URL of the mapping document.
    pub mapping: String,
}

#[derive(Debug, Clone, Deserialize)]
struct EcosystemsDocument {
    #[serde(default, deserialize_with = "in_document_order")]
    ecosystems: Vec<(String, EcosystemEntry)>,
}

/// Reads a JSON object as name/entry pairs without reordering them.
fn in_document_order<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<(String, EcosystemEntry)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedEntries;

    impl<'de> Visitor<'de> for OrderedEntries {
        type Value = Vec<(String, EcosystemEntry)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of ecosystem names to catalog entries")
        }

        fn visit_map<A: MapAccess<'de>>(
            self,
            mut map: A,
        ) -> std::result::Result<Self::Value, A::Error> {
            let mut entries: Vec<(String, EcosystemEntry)> =
                Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, entry)) = map.next_entry::<String, EcosystemEntry>()? {
                match entries.iter_mut().find(|slot| slot.0 == name) {
                    Some(slot) => slot.1 = entry,
                    None => entries.push((name, entry)),
                }
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedEntries)
}

/// The loaded catalog of ecosystems, iterated in document order.
#[derive(Debug, Clone)]
pub struct Ecosystems {
    ecosystems: Vec<(String, EcosystemEntry)>,
    origin: Option<DocumentSource>,
}

impl Ecosystems {
    /// Loads the catalog from a path or URL.
    pub fn load(source: &DocumentSource) -> Result<Self> {
        let document: EcosystemsDocument = source.load("ecosystems")?;
        debug!(%source, ecosystems = document.ecosystems.len(), "loaded ecosystem catalog");
        Ok(Self {
            ecosystems: document.ecosystems,
            origin: Some(source.clone()),
        })
    }

    /// Loads the catalog from its default remote location.
    pub fn from_default() -> Result<Self> {
        Self::load(&DocumentSource::parse(DEFAULT_ECOSYSTEMS_URL))
    }

    /// Parses a catalog from JSON text. Relative mapping paths resolve
    /// against the working directory.
    pub fn from_json(text: &str) -> Result<Self> {
        let document: EcosystemsDocument = parse_document(text, "ecosystems", "<inline>")?;
        Ok(Self {
            ecosystems: document.ecosystems,
            origin: None,
        })
    }

    /// Ecosystem names, in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ecosystems.iter().map(|(name, _)| name.as_str())
    }

    /// Ecosystem names paired with their catalog entries.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &EcosystemEntry)> {
        self.ecosystems.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    fn entry(&self, name: &str) -> Option<&EcosystemEntry> {
        self.ecosystems
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, entry)| entry)
    }

    /// Where the mapping for `name` lives.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::NotFound`] listing the known ecosystems.
    pub fn mapping_source(&self, name: &str) -> Result<DocumentSource> {
        let entry = self
            .entry(name)
            .ok_or_else(|| DepmapError::NotFound {
                kind: "ecosystem",
                name: name.to_string(),
                available: self.names().map(str::to_string).collect(),
            })?;
        match &self.origin {
            Some(origin) => origin.join(&entry.mapping),
            None => Ok(DocumentSource::parse(&entry.mapping)),
        }
    }

    /// Loads the mapping for `name`.
    pub fn get_mapping(&self, name: &str) -> Result<Mapping> {
        Mapping::load(&self.mapping_source(name)?)
    }

    /// Loads the mapping for `name`, or `None` if the catalog lacks it.
    pub fn find_mapping(&self, name: &str) -> Result<Option<Mapping>> {
        if !self.contains(name) {
            return Ok(None);
        }
        self.get_mapping(name).map(Some)
    }
}
