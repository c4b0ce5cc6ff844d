//! User configuration.
//!
//! ## Location
//!
//! The file is `config.toml` inside `$DEPMAP_CONFIG_DIR` when that variable
//! is set, and inside `<config dir>/depmap` otherwise (for example
//! `~/.config/depmap/config.toml` on Linux). A missing file means defaults.
//!
//! ## Example
//!
//! ```toml
//! preferred_ecosystem = "fedora"
//! preferred_package_manager = "dnf"
//! unsupported_constraints_behaviour = "ignore"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::debug;

use crate::{DepmapError, Result};

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "DEPMAP_CONFIG_DIR";

const APP_DIR_NAME: &str = "depmap";
const CONFIG_FILE_NAME: &str = "config.toml";

/// What to do when a version constraint cannot be expressed in the target
/// ecosystem.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UnsupportedConstraintsBehaviour {
    /// Fail the resolution.
    Error,
    /// Log a warning and drop the version.
    #[default]
    Warn,
    /// Drop the version silently.
    Ignore,
}

/// The user configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Config {
    pub preferred_ecosystem: Option<String>,
    pub preferred_package_manager: Option<String>,
    /// Path or URL of a mapping document.
    pub preferred_mapping: Option<String>,
    pub unsupported_constraints_behaviour: UnsupportedConstraintsBehaviour,
}

/// File form; the behaviour stays a string so bad values get a helpful error.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    preferred_ecosystem: String,
    preferred_package_manager: String,
    preferred_mapping: String,
    unsupported_constraints_behaviour: Option<String>,
}

impl Config {
    /// The directory holding the configuration file, if one can be determined.
    pub fn directory() -> Option<PathBuf> {
        match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
            _ => dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME)),
        }
    }

    /// The configuration file path, if one can be determined.
    pub fn file_path() -> Option<PathBuf> {
        Self::directory().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// Loads the user configuration, falling back to defaults when no file
    /// exists.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::Config`] when the file exists but is invalid.
    pub fn load_user_config() -> Result<Self> {
        match Self::file_path() {
            Some(path) if path.is_file() => Self::from_path(&path),
            _ => {
                debug!("no user config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Loads a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| DepmapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|message| DepmapError::Config {
            path: path.to_path_buf(),
            message,
        })?;
        debug!(path = %path.display(), "loaded user config");
        Ok(config)
    }

    fn from_toml(text: &str) -> std::result::Result<Self, String> {
        let raw: RawConfig = toml::from_str(text).map_err(|e| e.message().to_string())?;

        if !raw.preferred_mapping.is_empty() && !raw.preferred_ecosystem.is_empty() {
            return Err(
                "'preferred_mapping' cannot be set with 'preferred_ecosystem' too; pick one"
                    .to_string(),
            );
        }

        let unsupported_constraints_behaviour = match raw.unsupported_constraints_behaviour {
            None => UnsupportedConstraintsBehaviour::default(),
            Some(value) => value.parse().map_err(|_| {
                let valid: Vec<String> = UnsupportedConstraintsBehaviour::iter()
                    .map(|b| b.to_string())
                    .collect();
                format!(
                    "'unsupported_constraints_behaviour' must be one of {}, found '{value}'",
                    valid.join(", ")
                )
            })?,
        };

        Ok(Self {
            preferred_ecosystem: non_empty(raw.preferred_ecosystem),
            preferred_package_manager: non_empty(raw.preferred_package_manager),
            preferred_mapping: non_empty(raw.preferred_mapping),
            unsupported_constraints_behaviour,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_fields_are_read() {
        let config = Config::from_toml(
            r#"
            preferred_ecosystem = "fedora"
            preferred_package_manager = "dnf"
            unsupported_constraints_behaviour = "error"
            "#,
        )
        .unwrap();
        assert_eq!(config.preferred_ecosystem.as_deref(), Some("fedora"));
        assert_eq!(config.preferred_package_manager.as_deref(), Some("dnf"));
        assert_eq!(
            config.unsupported_constraints_behaviour,
            UnsupportedConstraintsBehaviour::Error
        );
    }

    #[test]
    fn test_mapping_and_ecosystem_are_exclusive() {
        let err = Config::from_toml(
            r#"
            preferred_ecosystem = "fedora"
            preferred_mapping = "local.mapping.json"
            "#,
        )
        .unwrap_err();
        assert!(err.contains("pick one"));
    }

    #[test]
    fn test_bad_behaviour_lists_valid_values() {
        let err = Config::from_toml(r#"unsupported_constraints_behaviour = "explode""#)
            .unwrap_err();
        assert!(err.contains("error, warn, ignore"));
        assert!(err.contains("explode"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(Config::from_toml("colour = true").is_err());
    }

    #[test]
    #[serial]
    fn test_env_var_overrides_directory() {
        let dir = tempfile::tempdir().unwrap();
        let original = std::env::var_os(CONFIG_DIR_ENV);
        // SAFETY: serialized with every other test touching this variable.
        unsafe { std::env::set_var(CONFIG_DIR_ENV, dir.path()) };

        assert_eq!(Config::directory().unwrap(), dir.path());
        assert_eq!(Config::load_user_config().unwrap(), Config::default());

        std::fs::write(
            dir.path().join("config.toml"),
            "preferred_mapping = 'https://example.com/m.json'",
        )
        .unwrap();
        let config = Config::load_user_config().unwrap();
        assert_eq!(
            config.preferred_mapping.as_deref(),
            Some("https://example.com/m.json")
        );

        std::fs::write(dir.path().join("config.toml"), "preferred_ecosystem = 1").unwrap();
        assert!(matches!(
            Config::load_user_config(),
            Err(DepmapError::Config { .. })
        ));

        match original {
            Some(value) => unsafe { std::env::set_var(CONFIG_DIR_ENV, value) },
            None => unsafe { std::env::remove_var(CONFIG_DIR_ENV) },
        }
    }
}
