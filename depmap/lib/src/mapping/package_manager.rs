//! Package-manager descriptors and command rendering.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::version::{self, SpecifierSyntax};
use crate::Result;
use crate::template::PLACEHOLDER;

/// Token prepended to commands that need elevated privileges.
pub const ELEVATION_PREFIX: &str = "sudo";

/// How install commands treat more than one specifier group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MultipleSpecifiers {
    /// Every group goes into one command.
    #[default]
    Always,
    /// Unversioned groups go into one command; versioned ones get a command
    /// each.
    NameOnly,
    /// One command per group.
    Never,
}

/// An argument template with a `{}` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub command: Vec<String>,
    #[serde(default)]
    pub requires_elevation: bool,
    #[serde(default)]
    pub multiple_specifiers: MultipleSpecifiers,
}

impl CommandTemplate {
    fn prefix(&self) -> Vec<String> {
        if self.requires_elevation {
            vec![ELEVATION_PREFIX.to_string()]
        } else {
            Vec::new()
        }
    }

    fn placeholder_count(&self) -> usize {
        self.command.iter().filter(|arg| *arg == PLACEHOLDER).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commands {
    pub install: CommandTemplate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<CommandTemplate>,
}

/// A package manager declared by a mapping document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPackageManager")]
pub struct PackageManager {
    pub name: String,
    pub commands: Commands,
    pub specifier_syntax: SpecifierSyntax,
}

/// Wire form that also accepts the older top-level `install_command` list.
#[derive(Deserialize)]
struct RawPackageManager {
    name: String,
    #[serde(default)]
    commands: Option<Commands>,
    #[serde(default)]
    install_command: Option<Vec<String>>,
    #[serde(default)]
    requires_elevation: bool,
    #[serde(default)]
    specifier_syntax: SpecifierSyntax,
}

impl TryFrom<RawPackageManager> for PackageManager {
    type Error = String;

    fn try_from(raw: RawPackageManager) -> std::result::Result<Self, Self::Error> {
        let commands = match (raw.commands, raw.install_command) {
            (Some(commands), _) => commands,
            (None, Some(command)) => Commands {
                install: CommandTemplate {
                    command,
                    requires_elevation: raw.requires_elevation,
                    multiple_specifiers: MultipleSpecifiers::default(),
                },
                query: None,
            },
            (None, None) => {
                return Err(format!(
                    "package manager '{}' declares no install command",
                    raw.name
                ));
            }
        };

        Ok(Self {
            name: raw.name,
            commands,
            specifier_syntax: raw.specifier_syntax,
        })
    }
}

impl PackageManager {
    pub fn install(&self) -> &CommandTemplate {
        &self.commands.install
    }

    pub fn query(&self) -> Option<&CommandTemplate> {
        self.commands.query.as_ref()
    }

    pub fn multiple_specifiers(&self) -> MultipleSpecifiers {
        self.commands.install.multiple_specifiers
    }

    /// Rewrites `name` with `version` in this manager's specifier syntax.
    pub fn versioned_specifiers(&self, name: &str, version: &str) -> Result<Vec<String>> {
        version::translate(name, version, &self.specifier_syntax)
    }

    /// Builds an install command with `tokens` spliced in at the placeholder.
    ///
    /// ## Examples
    ///
    /// ```
    /// use depmap_lib::mapping::PackageManager;
    ///
    /// let dnf: PackageManager = serde_json::from_str(r#"{
    ///     "name": "dnf",
    ///     "commands": {"install": {"command": ["dnf", "install", "{}"], "requires_elevation": true}}
    /// }"#).unwrap();
    ///
    /// let cmd = dnf.render_install_command(&["libyaml".to_string()]);
    /// assert_eq!(cmd, vec!["sudo", "dnf", "install", "libyaml"]);
    /// ```
    pub fn render_install_command(&self, tokens: &[String]) -> Vec<String> {
        let install = self.install();
        let mut cmd = install.prefix();
        for arg in &install.command {
            if arg == PLACEHOLDER {
                cmd.extend(tokens.iter().cloned());
            } else {
                cmd.push(arg.clone());
            }
        }
        cmd
    }

    /// Renders install commands for a list of specifier groups.
    ///
    /// A group is one dependency's tokens and is never split across commands.
    /// `versioned` says whether the groups carry version constraints, which
    /// matters for [`MultipleSpecifiers::NameOnly`].
    pub fn render_install_commands(
        &self,
        groups: &[Vec<String>],
        versioned: bool,
    ) -> Vec<Vec<String>> {
        if groups.is_empty() {
            return Vec::new();
        }

        let batch = match self.multiple_specifiers() {
            MultipleSpecifiers::Always => true,
            MultipleSpecifiers::NameOnly => !versioned,
            MultipleSpecifiers::Never => false,
        };

        if batch {
            let tokens: Vec<String> = groups.iter().flatten().cloned().collect();
            vec![self.render_install_command(&tokens)]
        } else {
            groups
                .iter()
                .map(|group| self.render_install_command(group))
                .collect()
        }
    }

    /// Builds one query command per specifier.
    ///
    /// Without a query template the result is a single empty command, which
    /// means querying is not supported.
    pub fn render_query_commands(&self, specifiers: &[String]) -> Vec<Vec<String>> {
        let Some(query) = self.query() else {
            return vec![Vec::new()];
        };

        specifiers
            .iter()
            .map(|spec| {
                let mut cmd = query.prefix();
                cmd.extend(query.command.iter().map(|arg| arg.replace(PLACEHOLDER, spec)));
                cmd
            })
            .collect()
    }

    /// Semantic problems with this descriptor.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let count = self.install().placeholder_count();
        if count != 1 {
            problems.push(format!(
                "package manager '{}': install command must contain exactly one '{PLACEHOLDER}' (found {count})",
                self.name
            ));
        }
        if let Some(query) = self.query() {
            if !query.command.iter().any(|arg| arg.contains(PLACEHOLDER)) {
                problems.push(format!(
                    "package manager '{}': query command has no '{PLACEHOLDER}'",
                    self.name
                ));
            }
        }
        problems
    }
}
