//! Per-ecosystem mapping documents.
//!
//! A mapping translates dependency identifiers into the package specifiers of
//! one ecosystem and describes the package managers that install them. Lookup
//! never fails on an unknown identifier: it yields nothing and leaves the
//! required/optional decision to the caller.

mod package_manager;
mod specs;
mod version;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use package_manager::{
    CommandTemplate, Commands, ELEVATION_PREFIX, MultipleSpecifiers, PackageManager,
};
pub use specs::{Category, CategorySpecs, OneOrMany, RawSpecs, Specs};
pub use version::{
    Constraint, Operator, SpecifierSyntax, VersionRanges, parse_constraints, translate,
};

use crate::dep_url::{DepUrl, split_version};
use crate::registry::Registry;
use crate::source::{DocumentSource, is_url, parse_document};
use crate::{DepmapError, Result};

/// One entry of the `mappings` list, as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs: Option<RawSpecs>,
    /// Id of another entry whose specifiers this one reuses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MappingEntry {
    /// Whether the entry declares specifiers or defers to another entry.
    fn declares_anything(&self) -> bool {
        self.specs.as_ref().is_some_and(|s| !s.is_empty()) || self.specs_from.is_some()
    }
}

/// A mapping entry with its specifiers resolved and normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntry {
    pub id: String,
    pub specs: Specs,
}

/// Options shared by the lookup and rendering operations.
#[derive(Debug, Clone)]
pub struct ResolveOptions<'a> {
    /// Categories whose specifiers are collected.
    pub categories: Vec<Category>,
    /// Apply the identifier's version to the specifiers.
    pub with_version: bool,
    /// Skip entries whose specifier set is empty.
    pub only_mapped: bool,
    /// Widen lookups through the registry's aliases.
    pub registry: Option<&'a Registry>,
}

impl Default for ResolveOptions<'_> {
    fn default() -> Self {
        Self {
            categories: Category::all(),
            with_version: true,
            only_mapped: false,
            registry: None,
        }
    }
}

impl<'a> ResolveOptions<'a> {
    pub fn categories(mut self, categories: &[Category]) -> Self {
        self.categories = categories.to_vec();
        self
    }

    pub fn with_version(mut self, with_version: bool) -> Self {
        self.with_version = with_version;
        self
    }

    pub fn only_mapped(mut self, only_mapped: bool) -> Self {
        self.only_mapped = only_mapped;
        self
    }

    pub fn registry(mut self, registry: &'a Registry) -> Self {
        self.registry = Some(registry);
        self
    }
}

/// A loaded mapping document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    package_managers: Vec<PackageManager>,
    mappings: Vec<MappingEntry>,
}

impl Mapping {
    /// Loads a mapping from a path or URL.
    pub fn load(source: &DocumentSource) -> Result<Self> {
        let mapping: Self = source.load("mapping")?;
        debug!(
            %source,
            entries = mapping.mappings.len(),
            package_managers = mapping.package_managers.len(),
            "loaded mapping"
        );
        Ok(mapping)
    }

    /// Loads the mapping for `ecosystem` from the default remote location.
    pub fn from_default(ecosystem: &str) -> Result<Self> {
        Self::load(&DocumentSource::default_mapping(ecosystem))
    }

    /// Loads from a URL, a `.json` path, or otherwise treats `text` as an
    /// ecosystem name for the default location.
    pub fn from_name_or_source(text: &str) -> Result<Self> {
        Self::load(&mapping_location(text))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        parse_document(text, "mapping", "<inline>")
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| "<unnamed>".to_string())
    }

    // ------------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------------

    /// Entries as written, in document order.
    pub fn raw_entries(&self) -> impl Iterator<Item = &MappingEntry> {
        self.mappings.iter()
    }

    /// Entries with specifiers resolved through `specs_from` and normalized.
    pub fn entries(&self) -> impl Iterator<Item = ResolvedEntry> + '_ {
        self.raw_entries().map(|entry| self.resolve(entry))
    }

    /// Entries matching `id` as written, without resolving `specs_from`.
    ///
    /// With `only_mapped`, an entry is kept if it declares specifiers or
    /// defers to another entry.
    pub fn raw_entries_by_id<'s>(
        &'s self,
        id: &str,
        options: &ResolveOptions<'_>,
    ) -> impl Iterator<Item = &'s MappingEntry> {
        let keys = lookup_keys(id, options.registry);
        let only_mapped = options.only_mapped;
        self.raw_entries()
            .filter(move |entry| keys.contains(&entry.id))
            .filter(move |entry| !only_mapped || entry.declares_anything())
    }

    /// Entries matching `id`, resolved and normalized.
    ///
    /// Any version, qualifiers or subpath on `id` are ignored. With a registry, the match
    /// set also includes the canonical ids an alias provides and the aliases
    /// that provide a canonical id.
    pub fn entries_by_id(&self, id: &str, options: &ResolveOptions<'_>) -> Vec<ResolvedEntry> {
        let keys = lookup_keys(id, options.registry);
        self.raw_entries()
            .filter(|entry| keys.contains(&entry.id))
            .map(|entry| self.resolve(entry))
            .filter(|entry| !options.only_mapped || !entry.specs.is_empty())
            .collect()
    }

    fn resolve(&self, entry: &MappingEntry) -> ResolvedEntry {
        ResolvedEntry {
            id: entry.id.clone(),
            specs: self.resolve_specs(entry),
        }
    }

    /// Follows `specs_from` until an entry with specifiers is found.
    ///
    /// A missing target or a cycle resolves to an empty set.
    pub fn resolve_specs(&self, entry: &MappingEntry) -> Specs {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = entry;

        loop {
            if let Some(specs) = current.specs.as_ref().filter(|s| !s.is_empty()) {
                return Specs::from(specs.clone());
            }
            let Some(target) = current.specs_from.as_deref() else {
                return Specs::default();
            };
            if !visited.insert(current.id.as_str()) {
                warn!(id = %entry.id, at = %current.id, "specs_from cycle, treating as unmapped");
                return Specs::default();
            }
            let target = split_version(target).0;
            match self.raw_entries().find(|e| e.id == target) {
                Some(next) => current = next,
                None => {
                    debug!(id = %current.id, target, "specs_from target not found");
                    return Specs::default();
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Package managers
    // ------------------------------------------------------------------------

    pub fn package_managers(&self) -> &[PackageManager] {
        &self.package_managers
    }

    pub fn package_manager_names(&self) -> impl Iterator<Item = &str> {
        self.package_managers.iter().map(|pm| pm.name.as_str())
    }

    /// Looks up a package manager by name.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::NotFound`] listing the declared package managers.
    pub fn get_package_manager(&self, name: &str) -> Result<&PackageManager> {
        self.package_managers
            .iter()
            .find(|pm| pm.name == name)
            .ok_or_else(|| DepmapError::NotFound {
                kind: "package manager",
                name: name.to_string(),
                available: self.package_manager_names().map(str::to_string).collect(),
            })
    }

    /// Picks the package manager to use.
    ///
    /// An explicit name must exist. Without one, a mapping that declares a
    /// single package manager uses it.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::NotFound`] listing the declared package managers
    /// when the name is unknown, or when none was given and the choice is
    /// ambiguous.
    pub fn select_package_manager(&self, requested: Option<&str>) -> Result<&PackageManager> {
        match (requested, self.package_managers.as_slice()) {
            (Some(name), _) => self.get_package_manager(name),
            (None, [only]) => Ok(only),
            (None, _) => Err(DepmapError::NotFound {
                kind: "package manager",
                name: "<unspecified>".to_string(),
                available: self.package_manager_names().map(str::to_string).collect(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Specifiers and commands
    // ------------------------------------------------------------------------

    /// Specifier groups for `dep_url`, one group per mapped package name.
    ///
    /// Without a version, each group is the bare package name. With one, each
    /// group is that name rewritten in the package manager's version syntax,
    /// which may take more than one token. Versions on virtual identifiers
    /// are ignored. Groups from every matching entry are merged without
    /// duplicates.
    ///
    /// ## Errors
    ///
    /// [`DepmapError::NotFound`] for an unknown package manager, and the
    /// translation errors of [`translate`].
    pub fn specs_for(
        &self,
        dep_url: &str,
        package_manager: &str,
        options: &ResolveOptions<'_>,
    ) -> Result<Vec<Vec<String>>> {
        let mut groups: Vec<Vec<String>> = Vec::new();
        for group in self
            .specs_by_entry(dep_url, package_manager, options)?
            .into_iter()
            .flatten()
        {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        Ok(groups)
    }

    /// Like [`Mapping::specs_for`], but keeps the groups of each matching
    /// entry apart, in document order.
    pub fn specs_by_entry(
        &self,
        dep_url: &str,
        package_manager: &str,
        options: &ResolveOptions<'_>,
    ) -> Result<Vec<Vec<Vec<String>>>> {
        let manager = self.get_package_manager(package_manager)?;
        let (id, version) = requested_version(dep_url)?;
        let version = version.filter(|_| options.with_version);

        self.entries_by_id(&id, options)
            .into_iter()
            .map(|entry| {
                entry
                    .specs
                    .collect(&options.categories)
                    .into_iter()
                    .map(|name| match version.as_deref() {
                        Some(version) => manager.versioned_specifiers(&name, version),
                        None => Ok(vec![name]),
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    /// Install commands for `dep_url`, batched per the package manager's
    /// `multiple_specifiers` policy.
    pub fn install_commands_for(
        &self,
        dep_url: &str,
        package_manager: &str,
        options: &ResolveOptions<'_>,
    ) -> Result<Vec<Vec<String>>> {
        let groups = self.specs_for(dep_url, package_manager, options)?;
        let versioned = options.with_version && requested_version(dep_url)?.1.is_some();
        let manager = self.get_package_manager(package_manager)?;
        Ok(manager.render_install_commands(&groups, versioned))
    }

    /// Query commands for `dep_url`, one per bare specifier.
    ///
    /// A package manager without a query template yields a single empty
    /// command.
    pub fn query_commands_for(
        &self,
        dep_url: &str,
        package_manager: &str,
        options: &ResolveOptions<'_>,
    ) -> Result<Vec<Vec<String>>> {
        let manager = self.get_package_manager(package_manager)?;
        if manager.query().is_none() {
            return Ok(vec![Vec::new()]);
        }
        let options = options.clone().with_version(false);
        let specifiers: Vec<String> = self
            .specs_for(dep_url, package_manager, &options)?
            .into_iter()
            .flatten()
            .collect();
        Ok(manager.render_query_commands(&specifiers))
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Semantic checks serde cannot express.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::Schema`] listing every problem found.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        for entry in self.raw_entries() {
            if let Err(e) = DepUrl::parse(&entry.id) {
                problems.push(e.to_string());
            }
            if entry.specs.is_some() && entry.specs_from.is_some() {
                problems.push(format!(
                    "entry '{}' declares both specs and specs_from",
                    entry.id
                ));
            }
        }

        let mut seen = HashSet::new();
        for manager in &self.package_managers {
            if !seen.insert(manager.name.as_str()) {
                problems.push(format!("package manager '{}' is declared twice", manager.name));
            }
            problems.extend(manager.problems());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(DepmapError::Schema {
                document: "mapping",
                source_label: self.label(),
                message: problems.join("; "),
            })
        }
    }
}

/// Where [`Mapping::from_name_or_source`] loads `text` from.
pub fn mapping_location(text: &str) -> DocumentSource {
    if is_url(text) || text.ends_with(".json") || text.contains(std::path::MAIN_SEPARATOR) {
        DocumentSource::parse(text)
    } else {
        DocumentSource::default_mapping(text)
    }
}

/// The lookup id and the version to translate, if any.
///
/// Versions on virtual identifiers are dropped.
fn requested_version(dep_url: &str) -> Result<(String, Option<String>)> {
    let url = DepUrl::parse(dep_url)?;
    let version = match url.version() {
        Some(version) if url.is_virtual() => {
            warn!(dep_url, version, "versions on virtual dependencies are not supported, ignoring");
            None
        }
        other => other.map(str::to_string),
    };
    Ok((url.base().to_string(), version))
}

/// The id mapping entries are keyed on. Text that does not parse as an
/// identifier only loses its `@version` suffix.
fn lookup_id(text: &str) -> String {
    match DepUrl::parse(text) {
        Ok(url) => url.base().to_string(),
        Err(_) => split_version(text).0.to_string(),
    }
}

fn lookup_keys(id: &str, registry: Option<&Registry>) -> HashSet<String> {
    let id = lookup_id(id);
    let mut keys = HashSet::new();
    if let Some(registry) = registry {
        keys.extend(registry.provided_by(&id).map(str::to_string));
        keys.extend(registry.aliases_of(&id).map(str::to_string));
    }
    keys.insert(id);
    keys
}
