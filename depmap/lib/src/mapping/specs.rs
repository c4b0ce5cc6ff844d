//! Specifier sets attached to mapping entries.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// A specifier category: what the package is needed for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Build,
    Host,
    Run,
}

impl Category {
    /// All three categories, in `build`, `host`, `run` order.
    pub fn all() -> Vec<Category> {
        Category::iter().collect()
    }
}

/// A string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Per-category specifiers as written in a document. Missing keys mean none.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategorySpecs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<OneOrMany>,
}

/// The `specs` field as written: one specifier, a list applied to every
/// category, or a per-category table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSpecs {
    One(String),
    Many(Vec<String>),
    ByCategory(CategorySpecs),
}

impl RawSpecs {
    /// Whether this value declares nothing at all.
    ///
    /// A per-category table with any key present counts as declared, even if
    /// the lists are empty.
    pub fn is_empty(&self) -> bool {
        match self {
            RawSpecs::One(s) => s.is_empty(),
            RawSpecs::Many(v) => v.is_empty(),
            RawSpecs::ByCategory(c) => c.build.is_none() && c.host.is_none() && c.run.is_none(),
        }
    }
}

/// Normalized specifiers: exactly one list per category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Specs {
    pub build: Vec<String>,
    pub host: Vec<String>,
    pub run: Vec<String>,
}

impl Specs {
    pub fn get(&self, category: Category) -> &[String] {
        match category {
            Category::Build => &self.build,
            Category::Host => &self.host,
            Category::Run => &self.run,
        }
    }

    /// Whether every category is empty.
    pub fn is_empty(&self) -> bool {
        self.build.is_empty() && self.host.is_empty() && self.run.is_empty()
    }

    /// Specifiers across `categories`, de-duplicated in first-seen order.
    pub fn collect(&self, categories: &[Category]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for spec in categories.iter().flat_map(|c| self.get(*c)) {
            if !out.contains(spec) {
                out.push(spec.clone());
            }
        }
        out
    }
}

impl From<RawSpecs> for Specs {
    fn from(raw: RawSpecs) -> Self {
        match raw {
            RawSpecs::One(s) => {
                let all = vec![s];
                Specs {
                    build: all.clone(),
                    host: all.clone(),
                    run: all,
                }
            }
            RawSpecs::Many(all) => Specs {
                build: all.clone(),
                host: all.clone(),
                run: all,
            },
            RawSpecs::ByCategory(c) => {
                let list = |v: Option<OneOrMany>| v.map(OneOrMany::into_vec).unwrap_or_default();
                Specs {
                    build: list(c.build),
                    host: list(c.host),
                    run: list(c.run),
                }
            }
        }
    }
}

impl From<Specs> for RawSpecs {
    fn from(specs: Specs) -> Self {
        RawSpecs::ByCategory(CategorySpecs {
            build: Some(OneOrMany::Many(specs.build)),
            host: Some(OneOrMany::Many(specs.host)),
            run: Some(OneOrMany::Many(specs.run)),
        })
    }
}
