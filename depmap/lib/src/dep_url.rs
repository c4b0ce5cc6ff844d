//! Dependency identifiers (`dep:` URLs).
//!
//! A [`DepUrl`] is a package-URL derivative used by PEP 725 `[external]`
//! metadata. It differs from a plain package URL in three ways:
//!
//! - The scheme is `dep:`, not `pkg:`.
//! - The version field (`@...`) may hold a comma-separated version range.
//! - A `virtual` type names an abstract capability. Its namespace must be
//!   `compiler` or `interface`, and its name is case-normalized to lowercase.
//!
//! ## Grammar
//!
//! ```text
//! dep:<type>[/<namespace>]/<name>[@<version>][?<key>=<value>&...][#<subpath>]
//! ```
//!
//! The canonical string form never percent-encodes anything, and qualifiers
//! are rendered sorted by key, so `parse(s).to_string() == s` for every
//! canonical `s`.
//!
//! ## Examples
//!
//! ```
//! use depmap_lib::DepUrl;
//!
//! let url = DepUrl::parse("dep:generic/llvm@<22,>=21").unwrap();
//! assert_eq!(url.kind(), "generic");
//! assert_eq!(url.name(), "llvm");
//! assert_eq!(url.version(), Some("<22,>=21"));
//! assert_eq!(url.to_string(), "dep:generic/llvm@<22,>=21");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{DepmapError, Result};

/// The scheme every dependency identifier starts with.
pub const SCHEME: &str = "dep";

/// The type reserved for abstract capabilities.
pub const VIRTUAL_TYPE: &str = "virtual";

/// Namespaces accepted for `dep:virtual/*` identifiers.
pub const VIRTUAL_NAMESPACES: [&str; 2] = ["compiler", "interface"];

/// Names of the virtual compilers that pull in the Python development package.
const C_FAMILY_COMPILERS: [&str; 4] = ["c", "c++", "cxx", "cpp"];

/// Characters that mark a version as a range rather than a literal version.
const RANGE_CHARS: &[char] = &['<', '>', '=', '!', '~', '*'];

// Nothing is percent-encoded, so these would change how the string splits.
const RESERVED_IN_TYPE: &[char] = &['/', '?', '#'];
const RESERVED_IN_NAMESPACE: &[char] = &['?', '#'];
const RESERVED_IN_NAME: &[char] = &['/', '@', '?', '#'];
const RESERVED_IN_VERSION: &[char] = &['/', '?', '#'];
const RESERVED_IN_QUALIFIER_KEY: &[char] = &['=', '&', '#'];
const RESERVED_IN_QUALIFIER_VALUE: &[char] = &['&', '#'];

/// A parsed `dep:` identifier.
///
/// Immutable once built. Equality is structural over every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DepUrl {
    kind: String,
    namespace: Option<String>,
    name: String,
    version: Option<String>,
    qualifiers: BTreeMap<String, String>,
    subpath: Option<String>,
}

impl DepUrl {
    /// Builds an identifier from its required components.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::Parse`] when `kind` or `name` is empty, when a
    /// component contains a character that would not survive a round trip
    /// through the string form (such as `@` or `/` in the name), or when a
    /// virtual identifier uses a namespace other than `compiler`/`interface`.
    ///
    /// ## Examples
    ///
    /// ```
    /// use depmap_lib::DepUrl;
    ///
    /// let url = DepUrl::new("virtual", Some("compiler"), "C").unwrap();
    /// assert_eq!(url.to_string(), "dep:virtual/compiler/c");
    /// ```
    pub fn new(kind: &str, namespace: Option<&str>, name: &str) -> Result<Self> {
        let label = match namespace {
            Some(ns) => format!("{SCHEME}:{kind}/{ns}/{name}"),
            None => format!("{SCHEME}:{kind}/{name}"),
        };
        Self::from_parts(
            kind,
            namespace.and_then(non_empty),
            name,
            None,
            BTreeMap::new(),
            None,
        )
        .map_err(|reason| DepmapError::Parse {
            input: label,
            reason,
        })
    }

    /// Parses an identifier from its string form.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::Parse`] when the `dep:` scheme is missing, when
    /// the type or name is absent, when a qualifier is malformed, or when a
    /// virtual identifier uses an invalid namespace.
    ///
    /// ## Examples
    ///
    /// ```
    /// use depmap_lib::DepUrl;
    ///
    /// assert!(DepUrl::parse("dep:virtual/compiler/c").is_ok());
    /// assert!(DepUrl::parse("pkg:generic/zlib").is_err());
    /// assert!(DepUrl::parse("dep:virtual/not-valid/name").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let fail = |reason: String| DepmapError::Parse {
            input: text.to_string(),
            reason,
        };

        let (scheme, rest) = text
            .split_once(':')
            .ok_or_else(|| fail(format!("missing '{SCHEME}:' scheme")))?;
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return Err(fail(format!(
                "scheme must be '{SCHEME}', found '{scheme}'"
            )));
        }

        let rest = rest.trim_start_matches('/');
        let (rest, subpath) = match rest.split_once('#') {
            Some((head, tail)) => (head, non_empty(tail.trim_matches('/'))),
            None => (rest, None),
        };
        let (rest, qualifiers) = match rest.split_once('?') {
            Some((head, tail)) => (head, parse_qualifiers(tail).map_err(&fail)?),
            None => (rest, BTreeMap::new()),
        };
        let rest = rest.trim_end_matches('/');

        // The version lives in the final path segment, so an '@' inside a
        // namespace never splits the identifier.
        let last_segment_start = rest.rfind('/').map_or(0, |idx| idx + 1);
        let (path, version) = match rest[last_segment_start..].find('@') {
            Some(at) => {
                let at = last_segment_start + at;
                (&rest[..at], non_empty(&rest[at + 1..]))
            }
            None => (rest, None),
        };

        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(fail("missing type".to_string()));
        }
        let kind = segments.remove(0);
        let name = segments
            .pop()
            .ok_or_else(|| fail("missing name".to_string()))?;
        let namespace = non_empty(&segments.join("/"));

        Self::from_parts(kind, namespace, name, version, qualifiers, subpath).map_err(fail)
    }

    fn from_parts(
        kind: &str,
        namespace: Option<String>,
        name: &str,
        version: Option<String>,
        qualifiers: BTreeMap<String, String>,
        subpath: Option<String>,
    ) -> std::result::Result<Self, String> {
        let kind = kind.trim().to_ascii_lowercase();
        if kind.is_empty() {
            return Err("missing type".to_string());
        }
        if name.trim().is_empty() {
            return Err("missing name".to_string());
        }
        check_reserved("type", &kind, RESERVED_IN_TYPE)?;
        check_reserved("name", name, RESERVED_IN_NAME)?;
        if let Some(ns) = &namespace {
            check_reserved("namespace", ns, RESERVED_IN_NAMESPACE)?;
            if ns.split('/').any(str::is_empty) {
                return Err(format!("namespace '{ns}' has an empty segment"));
            }
        }
        if let Some(version) = &version {
            check_reserved("version", version, RESERVED_IN_VERSION)?;
        }

        let (namespace, name) = if kind == VIRTUAL_TYPE {
            let namespace = namespace.map(|ns| ns.to_lowercase());
            match namespace.as_deref() {
                Some(ns) if VIRTUAL_NAMESPACES.contains(&ns) => {}
                _ => {
                    return Err(format!(
                        "'{SCHEME}:{VIRTUAL_TYPE}/*' only accepts {} as namespace",
                        VIRTUAL_NAMESPACES
                            .iter()
                            .map(|ns| format!("'{ns}'"))
                            .collect::<Vec<_>>()
                            .join(" or ")
                    ));
                }
            }
            (namespace, name.to_lowercase())
        } else {
            (namespace, name.to_string())
        };

        Ok(Self {
            kind,
            namespace,
            name,
            version,
            qualifiers,
            subpath,
        })
    }

    /// Returns a copy with the given version or version range. An empty
    /// version clears it.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::Parse`] when the version contains `/`, `?`
    /// or `#`.
    pub fn with_version(mut self, version: impl Into<String>) -> Result<Self> {
        let version = version.into();
        check_reserved("version", &version, RESERVED_IN_VERSION)
            .map_err(|reason| self.builder_error(reason))?;
        self.version = non_empty(&version);
        Ok(self)
    }

    /// Returns a copy with the given qualifier set. Keys are lowercased.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::Parse`] for an empty key or value, or one that
    /// contains a qualifier separator.
    pub fn with_qualifier(mut self, key: &str, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        check_qualifier(key, &value).map_err(|reason| self.builder_error(reason))?;
        self.qualifiers.insert(key.to_ascii_lowercase(), value);
        Ok(self)
    }

    /// Returns a copy with the given subpath.
    #[must_use]
    pub fn with_subpath(mut self, subpath: &str) -> Self {
        self.subpath = non_empty(subpath.trim_matches('/'));
        self
    }

    /// Returns a copy without version information.
    #[must_use]
    pub fn without_version(&self) -> Self {
        Self {
            version: None,
            ..self.clone()
        }
    }

    /// The identifier without version, qualifiers or subpath.
    ///
    /// This is the form mapping entries and registry definitions are keyed on.
    #[must_use]
    pub fn base(&self) -> Self {
        Self {
            version: None,
            qualifiers: BTreeMap::new(),
            subpath: None,
            ..self.clone()
        }
    }

    fn builder_error(&self, reason: String) -> DepmapError {
        DepmapError::Parse {
            input: self.to_string(),
            reason,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn qualifiers(&self) -> &BTreeMap<String, String> {
        &self.qualifiers
    }

    pub fn subpath(&self) -> Option<&str> {
        self.subpath.as_deref()
    }

    /// Whether this identifier names an abstract capability (`dep:virtual/*`).
    pub fn is_virtual(&self) -> bool {
        self.kind == VIRTUAL_TYPE
    }

    /// Whether this is a virtual C or C++ compiler.
    ///
    /// Building against these compilers also needs the Python development
    /// package of the target ecosystem.
    pub fn is_c_family_compiler(&self) -> bool {
        self.is_virtual()
            && self.namespace.as_deref() == Some("compiler")
            && C_FAMILY_COMPILERS.contains(&self.name.as_str())
    }

    /// Renders a package URL (`pkg:`), moving a version range into a `vers`
    /// qualifier.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::Conversion`] for virtual identifiers, which have
    /// no package URL equivalent.
    ///
    /// ## Examples
    ///
    /// ```
    /// use depmap_lib::DepUrl;
    ///
    /// let url = DepUrl::parse("dep:generic/llvm@>=20").unwrap();
    /// assert_eq!(url.to_purl_string().unwrap(), "pkg:generic/llvm?vers=vers:pypi/>=20");
    /// ```
    pub fn to_purl_string(&self) -> Result<String> {
        if self.is_virtual() {
            return Err(DepmapError::Conversion {
                dep_url: self.to_string(),
                reason: "virtual identifiers have no package URL equivalent".to_string(),
            });
        }

        let mut purl = self.clone();
        if self.version.as_deref().is_some_and(is_range) {
            purl.version = None;
            purl.qualifiers
                .insert("vers".to_string(), self.version_as_vers());
        }
        Ok(purl.render("pkg"))
    }

    /// Renders the Core Metadata form: `pkg:type/ns/name (vers)`.
    ///
    /// Virtual identifiers keep the `dep:` scheme.
    pub fn to_core_metadata_string(&self) -> String {
        let scheme = if self.is_virtual() { SCHEME } else { "pkg" };
        let mut out = format!("{scheme}:{}", self.kind);
        if let Some(ns) = &self.namespace {
            out.push('/');
            out.push_str(ns);
        }
        out.push('/');
        out.push_str(&self.name);
        if self.version.is_some() {
            out.push_str(&format!(" ({})", self.version_as_vers()));
        }
        out
    }

    fn version_as_vers(&self) -> String {
        match self.version.as_deref() {
            Some(version) if is_range(version) => {
                let vers_type = match self.kind.as_str() {
                    "generic" | "virtual" | "pypi" => "pypi",
                    other => other,
                };
                format!("vers:{vers_type}/{version}")
            }
            Some(version) => version.to_string(),
            None => String::new(),
        }
    }

    fn render(&self, scheme: &str) -> String {
        let mut out = format!("{scheme}:{}", self.kind);
        if let Some(ns) = &self.namespace {
            out.push('/');
            out.push_str(ns);
        }
        out.push('/');
        out.push_str(&self.name);
        if let Some(version) = &self.version {
            out.push('@');
            out.push_str(version);
        }
        if !self.qualifiers.is_empty() {
            out.push('?');
            let pairs: Vec<String> = self
                .qualifiers
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            out.push_str(&pairs.join("&"));
        }
        if let Some(subpath) = &self.subpath {
            out.push('#');
            out.push_str(subpath);
        }
        out
    }
}

/// Splits `text` at the first `@` of its last path segment, returning the
/// identifier without version and the version, if any.
///
/// Works on raw strings so lookups do not need a full parse.
pub fn split_version(text: &str) -> (&str, Option<&str>) {
    let last_segment_start = text.rfind('/').map_or(0, |idx| idx + 1);
    match text[last_segment_start..].find('@') {
        Some(at) => {
            let at = last_segment_start + at;
            let version = &text[at + 1..];
            (&text[..at], (!version.is_empty()).then_some(version))
        }
        None => (text, None),
    }
}

fn is_range(version: &str) -> bool {
    version.contains(RANGE_CHARS)
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn check_reserved(
    component: &str,
    value: &str,
    reserved: &[char],
) -> std::result::Result<(), String> {
    match value.chars().find(|c| reserved.contains(c)) {
        Some(c) => Err(format!("{component} '{value}' must not contain '{c}'")),
        None => Ok(()),
    }
}

fn check_qualifier(key: &str, value: &str) -> std::result::Result<(), String> {
    if key.is_empty() {
        return Err(format!("qualifier '{key}={value}' has an empty key"));
    }
    if value.is_empty() {
        return Err(format!("qualifier '{key}' has an empty value"));
    }
    check_reserved("qualifier key", key, RESERVED_IN_QUALIFIER_KEY)?;
    check_reserved("qualifier value", value, RESERVED_IN_QUALIFIER_VALUE)
}

fn parse_qualifiers(raw: &str) -> std::result::Result<BTreeMap<String, String>, String> {
    let mut qualifiers = BTreeMap::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("qualifier '{pair}' is missing '='"))?;
        if key.is_empty() {
            return Err(format!("qualifier '{pair}' has an empty key"));
        }
        if value.is_empty() {
            continue;
        }
        check_qualifier(key, value)?;
        qualifiers.insert(key.to_ascii_lowercase(), value.to_string());
    }
    Ok(qualifiers)
}

impl fmt::Display for DepUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(SCHEME))
    }
}

impl FromStr for DepUrl {
    type Err = DepmapError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for DepUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DepUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
