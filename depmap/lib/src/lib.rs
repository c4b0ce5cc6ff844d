//! Maps PEP 725 external dependency identifiers (`dep:` URLs) onto the
//! package specifiers and install commands of a target ecosystem.
//!
//! The pieces, leaves first:
//!
//! - [`DepUrl`] parses and renders identifiers.
//! - [`Registry`] indexes canonical identifiers and their aliases.
//! - [`Ecosystems`] points each known ecosystem at its mapping document.
//! - [`Mapping`] resolves identifiers to specifiers, translates version
//!   constraints and renders commands.
//! - [`External`] aggregates a `pyproject.toml` `[external]` table.
//!
//! Nothing here runs commands. Callers get argument vectors back and decide
//! what to do with them.
//!
//! ## Examples
//!
//! ```
//! use depmap_lib::{Mapping, ResolveOptions};
//!
//! let mapping = Mapping::from_json(r#"{
//!     "name": "example",
//!     "package_managers": [{
//!         "name": "pm",
//!         "commands": {"install": {"command": ["pm", "install", "{}"]}}
//!     }],
//!     "mappings": [{"id": "dep:generic/zlib", "specs": ["zlib", "zlib-dev"]}]
//! }"#).unwrap();
//!
//! let commands = mapping
//!     .install_commands_for("dep:generic/zlib", "pm", &ResolveOptions::default())
//!     .unwrap();
//! assert_eq!(commands, vec![vec!["pm", "install", "zlib", "zlib-dev"]]);
//! ```

pub mod cache;
pub mod config;
pub mod dep_url;
pub mod ecosystems;
pub mod error;
pub mod external;
pub mod mapping;
pub mod registry;
pub mod source;
pub mod template;

pub use cache::DocumentCache;
pub use config::{Config, UnsupportedConstraintsBehaviour};
pub use dep_url::DepUrl;
pub use ecosystems::Ecosystems;
pub use error::{DepmapError, Result};
pub use external::{External, ExternalCategory, MapOptions};
pub use mapping::{Category, Mapping, PackageManager, ResolveOptions};
pub use registry::Registry;
pub use source::DocumentSource;
