//! Version constraint translation.
//!
//! Dependency identifiers carry versions in a PEP 440-like form: a
//! comma-separated list of `<operator><version>` constraints, or a bare
//! version meaning an exact match. Each package manager describes its own
//! specifier syntax with templates; [`translate`] rewrites a version
//! expression into that syntax.
//!
//! ## Examples
//!
//! ```
//! use depmap_lib::mapping::{SpecifierSyntax, translate};
//!
//! let syntax: SpecifierSyntax = serde_json::from_str(r#"{
//!     "name_only": ["{name}"],
//!     "exact_version": ["{name}=={version}"],
//!     "version_ranges": {
//!         "equal": "=={version}",
//!         "greater_than": ">{version}",
//!         "greater_than_equal": ">={version}",
//!         "less_than": "<{version}",
//!         "less_than_equal": "<={version}",
//!         "not_equal": "!={version}",
//!         "and": ",",
//!         "syntax": ["{name}{ranges}"]
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(translate("llvm", "20", &syntax).unwrap(), vec!["llvm==20"]);
//! assert_eq!(translate("llvm", "<22,>=21", &syntax).unwrap(), vec!["llvm<22,>=21"]);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tracing::info;

use crate::template::fill;
use crate::{DepmapError, Result};

/// Characters that mark an expression as already carrying an operator.
const OPERATOR_LEAD_CHARS: [char; 5] = ['=', '>', '<', '!', '~'];

// ============================================================================
// Operators
// ============================================================================

/// A version comparison operator.
///
/// `Display` and `FromStr` use the operator symbol.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
pub enum Operator {
    /// `===`, also used internally for a bare version.
    #[strum(serialize = "===")]
    Exact,
    /// `~=`, the compatible-release operator.
    #[strum(serialize = "~=")]
    Compatible,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = ">=")]
    GreaterThanEqual,
    #[strum(serialize = "<=")]
    LessThanEqual,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = "<")]
    LessThan,
}

impl Operator {
    /// The key of this operator's template in a `version_ranges` table.
    ///
    /// `None` for the exact and compatible-release operators, which have no
    /// range template.
    pub fn range_key(self) -> Option<&'static str> {
        match self {
            Operator::Exact | Operator::Compatible => None,
            Operator::Equal => Some("equal"),
            Operator::NotEqual => Some("not_equal"),
            Operator::GreaterThanEqual => Some("greater_than_equal"),
            Operator::LessThanEqual => Some("less_than_equal"),
            Operator::GreaterThan => Some("greater_than"),
            Operator::LessThan => Some("less_than"),
        }
    }

    pub fn symbol(self) -> &'static str {
        self.into()
    }
}

/// One `<operator><version>` constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub operator: Operator,
    pub version: String,
}

impl Constraint {
    /// Parses a single constraint such as `>=1.2`.
    ///
    /// Two-character operators are tried before their one-character prefixes,
    /// so `>=1` is never read as `>` followed by `=1`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let invalid = |reason: &str| DepmapError::Parse {
            input: text.to_string(),
            reason: reason.to_string(),
        };

        let mut operators: Vec<Operator> = Operator::iter().collect();
        operators.sort_by_key(|op| std::cmp::Reverse(op.symbol().len()));

        let operator = operators
            .into_iter()
            .find(|op| text.starts_with(op.symbol()))
            .ok_or_else(|| invalid("constraint has no recognised operator"))?;

        let version = text[operator.symbol().len()..].trim();
        if version.is_empty() {
            return Err(invalid("constraint has no version"));
        }

        Ok(Self {
            operator,
            version: version.to_string(),
        })
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)
    }
}

/// Splits a version expression into constraints.
///
/// A constraint that does not start with an operator character is a bare
/// version and becomes an [`Operator::Exact`] constraint.
pub fn parse_constraints(expression: &str) -> Result<Vec<Constraint>> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(DepmapError::Parse {
            input: expression.to_string(),
            reason: "empty version expression".to_string(),
        });
    }

    expression
        .split(',')
        .map(|part| {
            let part = part.trim();
            if part.starts_with(OPERATOR_LEAD_CHARS) {
                Constraint::parse(part)
            } else {
                Constraint::parse(&format!("{}{part}", Operator::Exact))
            }
        })
        .collect()
}

// ============================================================================
// Specifier syntax
// ============================================================================

/// How a package manager spells package specifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecifierSyntax {
    /// Templates with a `{name}` slot, used when no version applies.
    #[serde(default = "default_name_only")]
    pub name_only: Vec<String>,
    /// Templates with `{name}` and `{version}` slots for a pinned version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact_version: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_ranges: Option<VersionRanges>,
}

impl Default for SpecifierSyntax {
    fn default() -> Self {
        Self {
            name_only: default_name_only(),
            exact_version: None,
            version_ranges: None,
        }
    }
}

fn default_name_only() -> Vec<String> {
    vec!["{name}".to_string()]
}

/// Per-operator templates for version ranges.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VersionRanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_equal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than_equal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than_equal: Option<String>,
    /// Joins mapped constraints into one `{ranges}` value. `None` means the
    /// package manager has no in-band conjunction, and each constraint is
    /// rendered on its own.
    #[serde(default)]
    pub and: Option<String>,
    /// Templates with `{name}` and `{ranges}` slots.
    pub syntax: Vec<String>,
}

impl VersionRanges {
    /// The template for `operator`, if this table has one.
    pub fn template(&self, operator: Operator) -> Option<&str> {
        let slot = match operator {
            Operator::Exact | Operator::Compatible => return None,
            Operator::Equal => &self.equal,
            Operator::NotEqual => &self.not_equal,
            Operator::GreaterThan => &self.greater_than,
            Operator::GreaterThanEqual => &self.greater_than_equal,
            Operator::LessThan => &self.less_than,
            Operator::LessThanEqual => &self.less_than_equal,
        };
        slot.as_deref()
    }

    /// Symbols of the operators this table can express.
    pub fn supported_operators(&self) -> Vec<String> {
        Operator::iter()
            .filter(|op| self.template(*op).is_some())
            .map(|op| op.symbol().to_string())
            .collect()
    }
}

// ============================================================================
// Translation
// ============================================================================

/// Rewrites `version` for package `name` into the given specifier syntax.
///
/// A single exact constraint uses the `exact_version` templates, or the
/// `name_only` templates when the syntax has none. Anything else goes through
/// the `version_ranges` table.
///
/// ## Errors
///
/// - [`DepmapError::Parse`] for a malformed version expression.
/// - [`DepmapError::UnsupportedOperator`] when a range constraint uses `===`
///   or `~=`, or an operator the syntax has no template for.
pub fn translate(name: &str, version: &str, syntax: &SpecifierSyntax) -> Result<Vec<String>> {
    let constraints = parse_constraints(version)?;

    if let [only] = constraints.as_slice() {
        if only.operator == Operator::Exact {
            return Ok(translate_exact(name, &only.version, syntax));
        }
    }

    translate_ranges(name, &constraints, syntax)
}

fn translate_exact(name: &str, version: &str, syntax: &SpecifierSyntax) -> Vec<String> {
    let slots = [("name", name), ("version", version)];
    match syntax.exact_version.as_deref() {
        Some(templates) if !templates.is_empty() => {
            templates.iter().map(|t| fill(t, &slots)).collect()
        }
        _ => {
            info!(
                package = name,
                version, "exact versions not supported, using name-only syntax"
            );
            syntax.name_only.iter().map(|t| fill(t, &slots)).collect()
        }
    }
}

fn translate_ranges(
    name: &str,
    constraints: &[Constraint],
    syntax: &SpecifierSyntax,
) -> Result<Vec<String>> {
    let ranges = syntax.version_ranges.as_ref();
    let unsupported = |constraint: &Constraint| DepmapError::UnsupportedOperator {
        package: name.to_string(),
        constraint: constraint.to_string(),
        operator: constraint.operator.to_string(),
        supported: ranges.map(VersionRanges::supported_operators).unwrap_or_default(),
    };

    let mut mapped = Vec::with_capacity(constraints.len());
    for constraint in constraints {
        let template = ranges
            .and_then(|r| r.template(constraint.operator))
            .ok_or_else(|| unsupported(constraint))?;
        mapped.push(fill(
            template,
            &[("name", name), ("version", &constraint.version)],
        ));
    }

    // `mapped` is non-empty only when a table exists.
    let Some(ranges) = ranges else {
        return Ok(Vec::new());
    };

    let result = match &ranges.and {
        Some(joiner) => {
            let joined = mapped.join(joiner);
            ranges
                .syntax
                .iter()
                .map(|t| fill(t, &[("name", name), ("ranges", &joined)]))
                .collect()
        }
        None => ranges
            .syntax
            .iter()
            .flat_map(|t| {
                mapped
                    .iter()
                    .map(move |range| fill(t, &[("name", name), ("ranges", range)]))
            })
            .collect(),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn conda() -> SpecifierSyntax {
        serde_json::from_str(
            r#"{
                "name_only": ["{name}"],
                "exact_version": ["{name}=={version}"],
                "version_ranges": {
                    "equal": "=={version}",
                    "greater_than": ">{version}",
                    "greater_than_equal": ">={version}",
                    "less_than": "<{version}",
                    "less_than_equal": "<={version}",
                    "not_equal": "!={version}",
                    "and": ",",
                    "syntax": ["{name}{ranges}"]
                }
            }"#,
        )
        .unwrap()
    }

    /// One argument per range boundary, like pkg-config style managers.
    fn exploded() -> SpecifierSyntax {
        serde_json::from_str(
            r#"{
                "name_only": ["{name}"],
                "exact_version": null,
                "version_ranges": {
                    "greater_than_equal": "{name} >= {version}",
                    "less_than": "{name} < {version}",
                    "and": null,
                    "syntax": ["--pkg", "{ranges}"]
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_operator_symbols_round_trip() {
        for op in Operator::iter() {
            assert_eq!(op.symbol().parse::<Operator>().unwrap(), op);
        }
    }

    #[test]
    fn test_constraint_prefers_longest_operator() {
        let c = Constraint::parse(">=1.2").unwrap();
        assert_eq!(c.operator, Operator::GreaterThanEqual);
        assert_eq!(c.version, "1.2");

        let c = Constraint::parse("===1.0").unwrap();
        assert_eq!(c.operator, Operator::Exact);
    }

    #[test]
    fn test_constraint_rejects_missing_version() {
        assert!(matches!(
            Constraint::parse(">="),
            Err(DepmapError::Parse { .. })
        ));
    }

    #[test]
    fn test_bare_version_is_exact() {
        let constraints = parse_constraints("20").unwrap();
        assert_eq!(
            constraints,
            vec![Constraint {
                operator: Operator::Exact,
                version: "20".to_string()
            }]
        );
    }

    #[test]
    fn test_exact_version_uses_exact_templates() {
        assert_eq!(translate("llvm", "20", &conda()).unwrap(), vec!["llvm==20"]);
    }

    #[test]
    fn test_single_range_constraint() {
        assert_eq!(translate("llvm", ">20", &conda()).unwrap(), vec!["llvm>20"]);
    }

    #[test]
    fn test_multiple_constraints_are_joined() {
        assert_eq!(
            translate("llvm", "<22,>=21", &conda()).unwrap(),
            vec!["llvm<22,>=21"]
        );
    }

    #[test]
    fn test_double_equals_takes_range_path() {
        assert_eq!(translate("llvm", "==20", &conda()).unwrap(), vec!["llvm==20"]);
    }

    #[traced_test]
    #[test]
    fn test_exact_degrades_to_name_only() {
        assert_eq!(translate("zlib", "1.3", &exploded()).unwrap(), vec!["zlib"]);
        assert!(logs_contain("exact versions not supported"));
    }

    #[test]
    fn test_missing_and_explodes_constraints() {
        assert_eq!(
            translate("zlib", ">=1.2,<2", &exploded()).unwrap(),
            vec!["--pkg", "--pkg", "zlib >= 1.2", "zlib < 2"]
        );
    }

    #[test]
    fn test_compatible_release_is_unsupported() {
        let err = translate("llvm", "~=20.1", &conda()).unwrap_err();
        match err {
            DepmapError::UnsupportedOperator {
                package, operator, ..
            } => {
                assert_eq!(package, "llvm");
                assert_eq!(operator, "~=");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_exact_inside_range_is_unsupported() {
        assert!(matches!(
            translate("llvm", ">=20,21", &conda()),
            Err(DepmapError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn test_operator_without_template_is_unsupported() {
        let err = translate("zlib", "!=1.2", &exploded()).unwrap_err();
        match err {
            DepmapError::UnsupportedOperator { supported, .. } => {
                assert_eq!(supported, vec![">=", "<"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_no_range_table_is_unsupported() {
        let syntax = SpecifierSyntax::default();
        assert!(matches!(
            translate("zlib", ">1", &syntax),
            Err(DepmapError::UnsupportedOperator { supported, .. }) if supported.is_empty()
        ));
    }
}
