use std::path::PathBuf;

/// Error types for the depmap library.
///
/// Covers identifier parsing, document loading and validation, and the
/// resolution failures raised while mapping dependencies onto an ecosystem.
#[derive(Debug, thiserror::Error)]
pub enum DepmapError {
    /// A dependency identifier could not be parsed.
    #[error("invalid dependency identifier '{input}': {reason}")]
    Parse { input: String, reason: String },

    /// A loaded document does not have the expected structure.
    #[error("{document} document from {source_label} failed validation: {message}")]
    Schema {
        document: &'static str,
        source_label: String,
        message: String,
    },

    /// A local document could not be read.
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A remote document could not be retrieved.
    #[error("could not fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// A document pointer could not be resolved against its base URL.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    /// A named ecosystem or package manager does not exist.
    ///
    /// The `kind` field names what was looked up (e.g. "ecosystem",
    /// "package manager").
    #[error("{kind} '{name}' not found; choose one of: {}", .available.join(", "))]
    NotFound {
        kind: &'static str,
        name: String,
        available: Vec<String>,
    },

    /// A required dependency has no mapping in the target ecosystem.
    #[error("[{category}] '{dep_url}' does not have any mappings in '{ecosystem}'")]
    UnmappedDependency {
        category: String,
        dep_url: String,
        ecosystem: String,
    },

    /// A version constraint uses an operator the target syntax cannot express.
    #[error(
        "package '{package}' has unsupported operator '{operator}' in constraint '{constraint}'; supported: {}",
        list_or_none(.supported)
    )]
    UnsupportedOperator {
        package: String,
        constraint: String,
        operator: String,
        supported: Vec<String>,
    },

    /// The user configuration file is invalid.
    #[error("config file '{}' has errors: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// An identifier cannot be converted to the requested representation.
    #[error("cannot convert '{dep_url}': {reason}")]
    Conversion { dep_url: String, reason: String },
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Convenience Result type for depmap operations.
pub type Result<T> = std::result::Result<T, DepmapError>;
