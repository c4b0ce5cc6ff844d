//! Command line front end for `depmap-lib`.
//!
//! Reads `[external]` tables, resolves single identifiers and lists the
//! ecosystem catalog. Commands are printed, never run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{WrapErr, eyre};
use depmap_lib::mapping::mapping_location;
use depmap_lib::source::DEFAULT_ECOSYSTEMS_URL;
use depmap_lib::{
    Category, Config, DepUrl, DocumentCache, DocumentSource, External, MapOptions, Mapping,
    Registry, ResolveOptions,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod output;

/// Map PEP 725 external dependencies onto ecosystem packages
#[derive(Parser, Debug)]
#[command(name = "depmap", version, about, after_help = AFTER_HELP)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Ecosystem catalog to read (path or URL)
    #[arg(long, value_name = "SOURCE", global = true, default_value = DEFAULT_ECOSYSTEMS_URL)]
    catalog: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the [external] table of a project
    Show {
        /// Project directory or pyproject.toml file
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// What to print
        #[arg(long, value_enum, default_value_t = OutputFormat::Raw)]
        output: OutputFormat,

        /// Check identifiers against the central registry
        #[arg(long)]
        validate: bool,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Resolve one dependency identifier
    Resolve {
        /// Identifier, optionally with a version (e.g. dep:generic/zlib@>=1.2)
        #[arg(value_name = "DEP_URL")]
        dep_url: String,

        /// Restrict to these specifier categories (repeatable)
        #[arg(long, value_name = "CATEGORY")]
        category: Vec<Category>,

        /// Print install commands instead of specifiers
        #[arg(long, conflicts_with = "query")]
        install: bool,

        /// Print query commands instead of specifiers
        #[arg(long)]
        query: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// List the ecosystems in the catalog
    Ecosystems {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Where mappings come from. Explicit flags win over the config file.
#[derive(Args, Debug)]
struct TargetArgs {
    /// Ecosystem name from the catalog
    #[arg(long, conflicts_with = "mapping")]
    ecosystem: Option<String>,

    /// Package manager to render commands for
    #[arg(long)]
    package_manager: Option<String>,

    /// Mapping document (ecosystem name, path or URL)
    #[arg(long, value_name = "SOURCE")]
    mapping: Option<String>,

    /// Registry document used for validation and alias lookups (path or URL)
    #[arg(long, value_name = "SOURCE")]
    registry: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// The [external] table as written
    Raw,
    /// Canonical identifiers per category
    Normalized,
    /// Mapped specifiers per category
    Mapped,
    /// All mapped specifiers on one shell-quoted line
    MappedList,
    /// The install command on one shell-quoted line
    Command,
}

const AFTER_HELP: &str = "\
ECOSYSTEM SELECTION:
  The first of these that is set picks the mapping:
    --mapping, --ecosystem, the ecosystem owning --package-manager,
    preferred_mapping and preferred_ecosystem from the config file.

  The config file is $DEPMAP_CONFIG_DIR/config.toml, or depmap/config.toml
  under the platform config directory.

  Examples:
    depmap show . --output command --package-manager dnf
    depmap resolve 'dep:generic/zlib@>=1.2' --ecosystem conda-forge --install
    depmap ecosystems
";

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load_user_config()?;
    let cache = DocumentCache::new(DocumentSource::parse(&cli.catalog));

    match cli.command {
        Command::Show {
            path,
            output,
            validate,
            target,
        } => show(&cache, &config, &path, output, validate, &target),
        Command::Resolve {
            dep_url,
            category,
            install,
            query,
            json,
            target,
        } => {
            let mode = if install {
                ResolveMode::Install
            } else if query {
                ResolveMode::Query
            } else {
                ResolveMode::Specifiers
            };
            resolve(&cache, &config, &dep_url, &category, mode, json, &target)
        }
        Command::Ecosystems { json } => {
            let catalog = cache.ecosystems()?;
            output::print_ecosystems(&catalog, json)
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "info".to_string(),
            _ => "debug".to_string(),
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .init();
}

// ============================================================================
// Mapping selection
// ============================================================================

/// A selected mapping and the ecosystem name used in messages.
struct Selection {
    ecosystem: String,
    mapping: Arc<Mapping>,
    package_manager: Option<String>,
}

fn select_mapping(
    cache: &DocumentCache,
    config: &Config,
    target: &TargetArgs,
) -> color_eyre::Result<Selection> {
    let package_manager = target
        .package_manager
        .clone()
        .or_else(|| config.preferred_package_manager.clone());

    let (ecosystem, mapping) = if let Some(text) = &target.mapping {
        from_location(cache, text)?
    } else if let Some(name) = &target.ecosystem {
        (name.clone(), cache.mapping_for_ecosystem(name)?)
    } else if let Some(pm) = &target.package_manager {
        let name = cache.find_ecosystem_for_package_manager(pm)?;
        info!(ecosystem = %name, package_manager = %pm, "detected ecosystem for package manager");
        let mapping = cache.mapping_for_ecosystem(&name)?;
        (name, mapping)
    } else if let Some(text) = &config.preferred_mapping {
        from_location(cache, text)?
    } else if let Some(name) = &config.preferred_ecosystem {
        (name.clone(), cache.mapping_for_ecosystem(name)?)
    } else {
        return Err(eyre!(
            "no ecosystem selected; pass --ecosystem, --package-manager or --mapping, \
             or set one in the config file"
        ));
    };

    debug!(%ecosystem, "selected mapping");
    Ok(Selection {
        ecosystem,
        mapping,
        package_manager,
    })
}

fn from_location(
    cache: &DocumentCache,
    text: &str,
) -> color_eyre::Result<(String, Arc<Mapping>)> {
    let mapping = cache.mapping_from(&mapping_location(text))?;
    let ecosystem = mapping.name().unwrap_or(text).to_string();
    Ok((ecosystem, mapping))
}

fn load_registry(source: Option<&str>) -> color_eyre::Result<Registry> {
    let registry = match source {
        Some(text) => Registry::load(&DocumentSource::parse(text))?,
        None => Registry::from_default()?,
    };
    Ok(registry)
}

// ============================================================================
// show
// ============================================================================

fn pyproject_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join("pyproject.toml")
    } else {
        path.to_path_buf()
    }
}

fn show(
    cache: &DocumentCache,
    config: &Config,
    path: &Path,
    format: OutputFormat,
    validate: bool,
    target: &TargetArgs,
) -> color_eyre::Result<()> {
    let file = pyproject_path(path);
    let text = std::fs::read_to_string(&file)
        .wrap_err_with(|| format!("could not read {}", file.display()))?;
    let external = External::from_pyproject_toml(&text, &file.display().to_string())?;

    let registry = if validate || target.registry.is_some() {
        Some(load_registry(target.registry.as_deref())?)
    } else {
        None
    };
    if let Some(registry) = registry.as_ref().filter(|_| validate) {
        // findings are logged as warnings
        external.validate(registry);
    }

    match format {
        OutputFormat::Raw => return output::print_raw(&text),
        OutputFormat::Normalized => return output::print_normalized(&external),
        _ => {}
    }

    let selection = select_mapping(cache, config, target)?;
    let mut options = MapOptions::default()
        .unsupported_constraints(config.unsupported_constraints_behaviour);
    if let Some(pm) = &selection.package_manager {
        options = options.package_manager(pm.clone());
    }
    if let Some(registry) = &registry {
        options = options.registry(registry);
    }

    let (ecosystem, mapping) = (selection.ecosystem.as_str(), selection.mapping.as_ref());
    match format {
        OutputFormat::Mapped => {
            output::print_mapped(&external.to_mapped(ecosystem, mapping, &options)?)
        }
        OutputFormat::MappedList => {
            output::print_line(&external.map_dependencies(ecosystem, mapping, &options)?);
            Ok(())
        }
        OutputFormat::Command => {
            output::print_line(&external.install_command(ecosystem, mapping, &options)?);
            Ok(())
        }
        OutputFormat::Raw | OutputFormat::Normalized => Ok(()),
    }
}

// ============================================================================
// resolve
// ============================================================================

#[derive(Clone, Copy, Debug)]
enum ResolveMode {
    Specifiers,
    Install,
    Query,
}

fn resolve(
    cache: &DocumentCache,
    config: &Config,
    dep_url: &str,
    categories: &[Category],
    mode: ResolveMode,
    json: bool,
    target: &TargetArgs,
) -> color_eyre::Result<()> {
    DepUrl::parse(dep_url)?;

    let selection = select_mapping(cache, config, target)?;
    let mapping = selection.mapping.as_ref();
    let manager = mapping
        .select_package_manager(selection.package_manager.as_deref())?
        .name
        .clone();

    let registry = target
        .registry
        .as_deref()
        .map(|source| load_registry(Some(source)))
        .transpose()?;
    let mut options = ResolveOptions::default().categories(categories);
    if let Some(registry) = &registry {
        options = options.registry(registry);
    }

    let lines = match mode {
        ResolveMode::Specifiers => mapping.specs_for(dep_url, &manager, &options)?,
        ResolveMode::Install => mapping.install_commands_for(dep_url, &manager, &options)?,
        ResolveMode::Query => mapping.query_commands_for(dep_url, &manager, &options)?,
    };
    if lines.is_empty() {
        info!(dep_url, ecosystem = %selection.ecosystem, "no mappings found");
    }
    output::print_lines(&lines, json)
}
