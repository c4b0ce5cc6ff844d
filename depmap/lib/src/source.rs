//! Loading of registry, catalog and mapping documents.
//!
//! Documents come from a local path or a remote URL. Remote fetches use a
//! blocking HTTP client and are only compiled in with the `network` feature.
//! Without it, loading a URL fails with [`DepmapError::Fetch`].
//!
//! Structural validation is typed deserialization: a document that does not
//! fit its record type is reported as [`DepmapError::Schema`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::{DepmapError, Result};

/// Default location of the central registry of dependency identifiers.
pub const DEFAULT_REGISTRY_URL: &str = concat!(
    "https://raw.githubusercontent.com/jaimergp/external-metadata-mappings/main",
    "/data/registry.json"
);

/// Default location of the known-ecosystems catalog.
pub const DEFAULT_ECOSYSTEMS_URL: &str = concat!(
    "https://raw.githubusercontent.com/jaimergp/external-metadata-mappings/main",
    "/data/known-ecosystems.json"
);

/// Default mapping location; `{}` is replaced with the ecosystem name.
pub const DEFAULT_MAPPING_URL_TEMPLATE: &str = concat!(
    "https://raw.githubusercontent.com/jaimergp/external-metadata-mappings/main",
    "/data/{}.mapping.json"
);

/// Where a document is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentSource {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// An `http` or `https` URL.
    Url(Url),
}

impl DocumentSource {
    /// Classifies `text` as a URL when it parses with an HTTP(S) scheme, or a
    /// path otherwise.
    ///
    /// ## Examples
    ///
    /// ```
    /// use depmap_lib::DocumentSource;
    ///
    /// assert!(matches!(DocumentSource::parse("https://example.com/x.json"), DocumentSource::Url(_)));
    /// assert!(matches!(DocumentSource::parse("data/x.json"), DocumentSource::Path(_)));
    /// ```
    pub fn parse(text: &str) -> Self {
        match parse_http_url(text) {
            Some(url) => DocumentSource::Url(url),
            None => DocumentSource::Path(PathBuf::from(text)),
        }
    }

    /// The default mapping location for an ecosystem name.
    pub fn default_mapping(ecosystem: &str) -> Self {
        Self::parse(&DEFAULT_MAPPING_URL_TEMPLATE.replace("{}", ecosystem))
    }

    /// Resolves a pointer found inside another document.
    ///
    /// URLs and absolute paths are returned as-is. Relative paths are joined
    /// onto the directory of a path source, or resolved against a URL source
    /// with the usual relative-reference rules.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::InvalidUrl`] when the pointer cannot be resolved
    /// against a URL.
    pub fn join(&self, pointer: &str) -> Result<Self> {
        match (self, Self::parse(pointer)) {
            (DocumentSource::Path(base), DocumentSource::Path(rel)) if rel.is_relative() => {
                let dir = base.parent().unwrap_or_else(|| Path::new(""));
                Ok(DocumentSource::Path(dir.join(rel)))
            }
            (DocumentSource::Url(base), DocumentSource::Path(rel)) if rel.is_relative() => base
                .join(pointer)
                .map(DocumentSource::Url)
                .map_err(|source| DepmapError::InvalidUrl {
                    url: pointer.to_string(),
                    source,
                }),
            (_, resolved) => Ok(resolved),
        }
    }

    /// Reads the raw text of the document.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::Io`] for unreadable files and
    /// [`DepmapError::Fetch`] for failed remote requests.
    pub fn read_text(&self) -> Result<String> {
        match self {
            DocumentSource::Path(path) => {
                debug!(path = %path.display(), "reading document");
                std::fs::read_to_string(path).map_err(|source| DepmapError::Io {
                    path: path.clone(),
                    source,
                })
            }
            DocumentSource::Url(url) => {
                debug!(%url, "fetching document");
                fetch_text(url)
            }
        }
    }

    /// Reads and deserializes the document into `T`.
    ///
    /// `document` names the document kind for error messages.
    pub(crate) fn load<T: DeserializeOwned>(&self, document: &'static str) -> Result<T> {
        let text = self.read_text()?;
        parse_document(&text, document, &self.to_string())
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Path(path) => write!(f, "{}", path.display()),
            DocumentSource::Url(url) => f.write_str(url.as_str()),
        }
    }
}

impl From<&str> for DocumentSource {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        DocumentSource::Path(path)
    }
}

impl From<&Path> for DocumentSource {
    fn from(path: &Path) -> Self {
        DocumentSource::Path(path.to_path_buf())
    }
}

/// Whether `text` is an absolute URL with an HTTP(S) scheme.
pub fn is_url(text: &str) -> bool {
    parse_http_url(text).is_some()
}

fn parse_http_url(text: &str) -> Option<Url> {
    Url::parse(text)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Deserializes document text, reporting structural mismatches as schema errors.
pub(crate) fn parse_document<T: DeserializeOwned>(
    text: &str,
    document: &'static str,
    source_label: &str,
) -> Result<T> {
    serde_json::from_str(text).map_err(|e| DepmapError::Schema {
        document,
        source_label: source_label.to_string(),
        message: e.to_string(),
    })
}

#[cfg(feature = "network")]
fn fetch_text(url: &Url) -> Result<String> {
    let fetch_error = |message: String| DepmapError::Fetch {
        url: url.to_string(),
        message,
    };

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("depmap-lib/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| fetch_error(e.to_string()))?;

    let response = client
        .get(url.clone())
        .send()
        .map_err(|e| fetch_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(format!("HTTP status {status}")));
    }

    response.text().map_err(|e| fetch_error(e.to_string()))
}

#[cfg(not(feature = "network"))]
fn fetch_text(url: &Url) -> Result<String> {
    Err(DepmapError::Fetch {
        url: url.to_string(),
        message: "network support is disabled (enable the `network` feature)".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(text: &str) -> DocumentSource {
        DocumentSource::Url(Url::parse(text).unwrap())
    }

    #[test]
    fn test_classifies_sources() {
        assert_eq!(
            DocumentSource::parse("http://example.com/a.json"),
            url("http://example.com/a.json")
        );
        assert_eq!(
            DocumentSource::parse("/tmp/a.json"),
            DocumentSource::Path(PathBuf::from("/tmp/a.json"))
        );
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert_eq!(
            DocumentSource::parse("HTTPS://example.com/x.json"),
            url("https://example.com/x.json")
        );
        assert!(is_url("HTTP://example.com"));
    }

    #[test]
    fn test_default_mapping_substitutes_ecosystem() {
        let source = DocumentSource::default_mapping("fedora");
        assert_eq!(
            source.to_string(),
            "https://raw.githubusercontent.com/jaimergp/external-metadata-mappings/main/data/fedora.mapping.json"
        );
    }

    #[test]
    fn test_join_resolves_relative_paths_against_parent() {
        let base = DocumentSource::Path(PathBuf::from("/data/known-ecosystems.json"));
        assert_eq!(
            base.join("fedora.mapping.json").unwrap(),
            DocumentSource::Path(PathBuf::from("/data/fedora.mapping.json"))
        );
        assert_eq!(
            base.join("/abs/x.json").unwrap(),
            DocumentSource::Path(PathBuf::from("/abs/x.json"))
        );
        assert_eq!(
            base.join("https://example.com/x.json").unwrap(),
            url("https://example.com/x.json")
        );
    }

    #[test]
    fn test_join_resolves_relative_paths_against_url() {
        let base = url("https://example.com/data/catalog.json");
        assert_eq!(
            base.join("x.mapping.json").unwrap(),
            url("https://example.com/data/x.mapping.json")
        );
    }

    #[test]
    fn test_join_drops_the_base_query() {
        let base = url("https://example.com/data/catalog.json?ref=feature/x");
        assert_eq!(
            base.join("fedora.mapping.json").unwrap(),
            url("https://example.com/data/fedora.mapping.json")
        );
    }

    #[test]
    fn test_join_normalizes_parent_segments() {
        let base = url("https://example.com/data/catalog.json");
        assert_eq!(
            base.join("../mappings/fedora.mapping.json").unwrap().to_string(),
            "https://example.com/mappings/fedora.mapping.json"
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let source = DocumentSource::Path(PathBuf::from("/definitely/not/here.json"));
        assert!(matches!(source.read_text(), Err(DepmapError::Io { .. })));
    }

    #[test]
    fn test_structural_mismatch_is_schema_error() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Doc {
            definitions: Vec<String>,
        }

        let err = parse_document::<Doc>("{}", "registry", "inline").unwrap_err();
        assert!(matches!(err, DepmapError::Schema { document: "registry", .. }));
    }

    #[cfg(not(feature = "network"))]
    #[test]
    fn test_urls_fail_without_network_feature() {
        let source = url("https://example.com/x.json");
        assert!(matches!(source.read_text(), Err(DepmapError::Fetch { .. })));
    }
}
