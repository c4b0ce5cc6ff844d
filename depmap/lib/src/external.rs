//! The `[external]` table of a `pyproject.toml`.
//!
//! Six categories of dependency identifiers. The three `optional-*`
//! categories may go unmapped in a target ecosystem; the other three may not.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::warn;

use crate::config::UnsupportedConstraintsBehaviour;
use crate::dep_url::DepUrl;
use crate::mapping::{Category, Mapping, PackageManager, ResolveOptions};
use crate::registry::Registry;
use crate::{DepmapError, Result};

/// Identifier of the Python development package added for C/C++ builds.
pub const PYTHON_DEV_ID: &str = "dep:generic/python";

/// A category of the `[external]` table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ExternalCategory {
    BuildRequires,
    HostRequires,
    Dependencies,
    OptionalBuildRequires,
    OptionalHostRequires,
    OptionalDependencies,
}

impl ExternalCategory {
    /// All six categories in table order.
    pub fn all() -> Vec<ExternalCategory> {
        ExternalCategory::iter().collect()
    }

    /// Parses a kebab-case or snake_case category name.
    pub fn from_key(key: &str) -> Option<Self> {
        key.replace('_', "-").parse().ok()
    }

    /// Whether an unmapped dependency in this category is an error.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            ExternalCategory::BuildRequires
                | ExternalCategory::HostRequires
                | ExternalCategory::Dependencies
        )
    }

    /// The mapping category this table category draws specifiers from.
    pub fn specs_category(self) -> Category {
        match self {
            ExternalCategory::BuildRequires | ExternalCategory::OptionalBuildRequires => {
                Category::Build
            }
            ExternalCategory::HostRequires | ExternalCategory::OptionalHostRequires => {
                Category::Host
            }
            ExternalCategory::Dependencies | ExternalCategory::OptionalDependencies => {
                Category::Run
            }
        }
    }
}

/// Options for [`External::map_dependencies`] and friends.
#[derive(Debug, Clone, Default)]
pub struct MapOptions<'a> {
    /// Categories to map; empty means all six.
    pub categories: Vec<ExternalCategory>,
    /// Package manager name; optional when the mapping declares only one.
    pub package_manager: Option<String>,
    pub unsupported_constraints: UnsupportedConstraintsBehaviour,
    /// Registry used for alias-aware lookups.
    pub registry: Option<&'a Registry>,
}

impl<'a> MapOptions<'a> {
    pub fn package_manager(mut self, name: impl Into<String>) -> Self {
        self.package_manager = Some(name.into());
        self
    }

    pub fn categories(mut self, categories: &[ExternalCategory]) -> Self {
        self.categories = categories.to_vec();
        self
    }

    pub fn unsupported_constraints(mut self, behaviour: UnsupportedConstraintsBehaviour) -> Self {
        self.unsupported_constraints = behaviour;
        self
    }

    pub fn registry(mut self, registry: &'a Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    fn selected(&self) -> Vec<ExternalCategory> {
        if self.categories.is_empty() {
            ExternalCategory::all()
        } else {
            self.categories.clone()
        }
    }
}

/// The parsed `[external]` table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct External {
    #[serde(default, alias = "build_requires")]
    pub build_requires: Vec<DepUrl>,
    #[serde(default, alias = "host_requires")]
    pub host_requires: Vec<DepUrl>,
    #[serde(default)]
    pub dependencies: Vec<DepUrl>,
    #[serde(default, alias = "optional_build_requires")]
    pub optional_build_requires: Vec<DepUrl>,
    #[serde(default, alias = "optional_host_requires")]
    pub optional_host_requires: Vec<DepUrl>,
    #[serde(default, alias = "optional_dependencies")]
    pub optional_dependencies: Vec<DepUrl>,
}

#[derive(Deserialize)]
struct PyProject {
    external: Option<External>,
}

impl External {
    /// Reads the `[external]` table of a `pyproject.toml` file.
    pub fn from_pyproject_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| DepmapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pyproject_toml(&text, &path.display().to_string())
    }

    /// Parses the `[external]` table out of `pyproject.toml` text.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::Schema`] when the text is not valid TOML, when
    /// an identifier does not parse, or when there is no `[external]` table.
    pub fn from_pyproject_toml(text: &str, source_label: &str) -> Result<Self> {
        let schema_error = |message: String| DepmapError::Schema {
            document: "pyproject",
            source_label: source_label.to_string(),
            message,
        };
        let pyproject: PyProject =
            toml::from_str(text).map_err(|e| schema_error(e.message().to_string()))?;
        pyproject
            .external
            .ok_or_else(|| schema_error("no [external] table".to_string()))
    }

    /// Identifiers in one category.
    pub fn category(&self, category: ExternalCategory) -> &[DepUrl] {
        match category {
            ExternalCategory::BuildRequires => &self.build_requires,
            ExternalCategory::HostRequires => &self.host_requires,
            ExternalCategory::Dependencies => &self.dependencies,
            ExternalCategory::OptionalBuildRequires => &self.optional_build_requires,
            ExternalCategory::OptionalHostRequires => &self.optional_host_requires,
            ExternalCategory::OptionalDependencies => &self.optional_dependencies,
        }
    }

    /// Identifiers across `categories` in category order; empty means all.
    pub fn iter<'s>(
        &'s self,
        categories: &[ExternalCategory],
    ) -> impl Iterator<Item = &'s DepUrl> + use<'s> {
        let categories = if categories.is_empty() {
            ExternalCategory::all()
        } else {
            categories.to_vec()
        };
        categories
            .into_iter()
            .flat_map(move |category| self.category(category).iter())
    }

    pub fn is_empty(&self) -> bool {
        ExternalCategory::iter().all(|c| self.category(c).is_empty())
    }

    /// Canonical identifier strings for every non-empty category.
    pub fn to_normalized(&self) -> Vec<(ExternalCategory, Vec<String>)> {
        ExternalCategory::iter()
            .filter(|c| !self.category(*c).is_empty())
            .map(|c| (c, self.category(c).iter().map(DepUrl::to_string).collect()))
            .collect()
    }

    /// Mapped specifiers for every non-empty selected category.
    pub fn to_mapped(
        &self,
        ecosystem: &str,
        mapping: &Mapping,
        options: &MapOptions<'_>,
    ) -> Result<Vec<(ExternalCategory, Vec<String>)>> {
        options
            .selected()
            .into_iter()
            .filter(|c| !self.category(*c).is_empty())
            .map(|c| {
                let single = options.clone().categories(&[c]);
                Ok((c, self.map_dependencies(ecosystem, mapping, &single)?))
            })
            .collect()
    }

    /// Maps every selected dependency onto `mapping`'s specifiers.
    ///
    /// The first matching entry with specifiers wins for each identifier. A
    /// virtual C or C++ compiler in a build category also pulls in the build
    /// specifiers of [`PYTHON_DEV_ID`]. The result has no duplicates.
    ///
    /// ## Errors
    ///
    /// - [`DepmapError::NotFound`] when no package manager can be selected.
    /// - [`DepmapError::UnmappedDependency`] for an unmapped identifier in a
    ///   required category.
    /// - [`DepmapError::UnsupportedOperator`] when the configured behaviour is
    ///   [`UnsupportedConstraintsBehaviour::Error`].
    pub fn map_dependencies(
        &self,
        ecosystem: &str,
        mapping: &Mapping,
        options: &MapOptions<'_>,
    ) -> Result<Vec<String>> {
        let manager = mapping.select_package_manager(options.package_manager.as_deref())?;

        let mut specs: Vec<String> = Vec::new();
        let mut include_python_dev = false;

        for category in options.selected() {
            let specs_category = category.specs_category();
            for dep in self.category(category) {
                if specs_category == Category::Build && dep.is_c_family_compiler() {
                    include_python_dev = true;
                }

                let dep_str = dep.to_string();
                let groups = self.entry_groups(&dep_str, specs_category, manager, mapping, options)?;

                match groups.into_iter().find(|groups| !groups.is_empty()) {
                    Some(groups) => specs.extend(groups.into_iter().flatten()),
                    None => {
                        if category.is_required() {
                            return Err(DepmapError::UnmappedDependency {
                                category: category.to_string(),
                                dep_url: dep_str,
                                ecosystem: ecosystem.to_string(),
                            });
                        }
                        warn!(
                            %category,
                            dep_url = %dep_str,
                            ecosystem,
                            "optional dependency does not have any mappings"
                        );
                    }
                }
            }
        }

        if include_python_dev {
            let python = mapping.entries_by_id(PYTHON_DEV_ID, &resolve_options(Category::Build, options));
            match python.first() {
                Some(entry) => specs.extend(entry.specs.build.iter().cloned()),
                None => warn!(ecosystem, "no Python development package mapped for C/C++ builds"),
            }
        }

        let mut unique: Vec<String> = Vec::with_capacity(specs.len());
        for spec in specs {
            if !unique.contains(&spec) {
                unique.push(spec);
            }
        }
        Ok(unique)
    }

    /// One install command covering every selected dependency.
    pub fn install_command(
        &self,
        ecosystem: &str,
        mapping: &Mapping,
        options: &MapOptions<'_>,
    ) -> Result<Vec<String>> {
        let specs = self.map_dependencies(ecosystem, mapping, options)?;
        let manager = mapping.select_package_manager(options.package_manager.as_deref())?;
        Ok(manager.render_install_command(&specs))
    }

    /// Checks identifiers against the registry.
    ///
    /// Reports identifiers the registry does not know and identifiers that
    /// are not canonical, suggesting the canonical ids they provide. Each
    /// finding is logged as a warning and returned.
    pub fn validate(&self, registry: &Registry) -> Vec<String> {
        let mut findings = Vec::new();

        for dep in self.iter(&[]) {
            let id = dep.base().to_string();
            if !registry.contains(&id) {
                findings.push(format!("'{id}' is not recognized in the central registry"));
            }
            if !registry.canonical_entries().any(|d| d.id == id) {
                let suggestions: Vec<&str> = registry.provided_by(&id).collect();
                let mut finding = format!("'{id}' is not using a canonical reference");
                if !suggestions.is_empty() {
                    finding.push_str(&format!("; try one of: {}", suggestions.join(", ")));
                }
                findings.push(finding);
            }
        }

        for finding in &findings {
            warn!("{finding}");
        }
        findings
    }

    /// Groups per matching entry, applying the unsupported-constraint policy.
    fn entry_groups(
        &self,
        dep_url: &str,
        category: Category,
        manager: &PackageManager,
        mapping: &Mapping,
        options: &MapOptions<'_>,
    ) -> Result<Vec<Vec<Vec<String>>>> {
        let resolve = resolve_options(category, options);
        match mapping.specs_by_entry(dep_url, &manager.name, &resolve) {
            Err(err @ DepmapError::UnsupportedOperator { .. }) => {
                match options.unsupported_constraints {
                    UnsupportedConstraintsBehaviour::Error => return Err(err),
                    UnsupportedConstraintsBehaviour::Warn => {
                        warn!(dep_url, "{err}; ignoring the version constraint");
                    }
                    UnsupportedConstraintsBehaviour::Ignore => {}
                }
                mapping.specs_by_entry(dep_url, &manager.name, &resolve.with_version(false))
            }
            other => other,
        }
    }
}

fn resolve_options<'a>(category: Category, options: &MapOptions<'a>) -> ResolveOptions<'a> {
    let resolve = ResolveOptions::default().categories(&[category]);
    match options.registry {
        Some(registry) => resolve.registry(registry),
        None => resolve,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYPROJECT: &str = r#"
        [project]
        name = "example"

        [external]
        build-requires = ["dep:virtual/compiler/c"]
        host_requires = ["dep:generic/zlib@>=1.2"]
        optional-dependencies = ["dep:generic/libyaml"]
    "#;

    #[test]
    fn test_reads_kebab_and_snake_keys() {
        let external = External::from_pyproject_toml(PYPROJECT, "pyproject.toml").unwrap();
        assert_eq!(external.build_requires.len(), 1);
        assert_eq!(external.host_requires.len(), 1);
        assert_eq!(external.optional_dependencies.len(), 1);
        assert!(external.dependencies.is_empty());
    }

    #[test]
    fn test_missing_table_is_schema_error() {
        let err = External::from_pyproject_toml("[project]\nname = 'x'", "p").unwrap_err();
        assert!(err.to_string().contains("no [external] table"));
    }

    #[test]
    fn test_bad_identifier_is_rejected() {
        let text = "[external]\nbuild-requires = ['pkg:generic/zlib']";
        assert!(matches!(
            External::from_pyproject_toml(text, "p"),
            Err(DepmapError::Schema { .. })
        ));
    }

    #[test]
    fn test_iter_follows_category_order() {
        let external = External::from_pyproject_toml(PYPROJECT, "p").unwrap();
        let ids: Vec<String> = external.iter(&[]).map(DepUrl::to_string).collect();
        assert_eq!(
            ids,
            vec![
                "dep:virtual/compiler/c",
                "dep:generic/zlib@>=1.2",
                "dep:generic/libyaml"
            ]
        );
        assert_eq!(
            external.iter(&[ExternalCategory::OptionalDependencies]).count(),
            1
        );
    }

    #[test]
    fn test_to_normalized_skips_empty_categories() {
        let external = External::from_pyproject_toml(PYPROJECT, "p").unwrap();
        let normalized = external.to_normalized();
        let names: Vec<String> = normalized.iter().map(|(c, _)| c.to_string()).collect();
        assert_eq!(
            names,
            vec!["build-requires", "host-requires", "optional-dependencies"]
        );
    }

    #[test]
    fn test_category_keys() {
        assert_eq!(
            ExternalCategory::from_key("optional_host_requires"),
            Some(ExternalCategory::OptionalHostRequires)
        );
        assert_eq!(
            ExternalCategory::from_key("build-requires"),
            Some(ExternalCategory::BuildRequires)
        );
        assert_eq!(ExternalCategory::from_key("nope"), None);
        assert!(ExternalCategory::Dependencies.is_required());
        assert!(!ExternalCategory::OptionalDependencies.is_required());
        assert_eq!(
            ExternalCategory::OptionalHostRequires.specs_category(),
            Category::Host
        );
    }
}
