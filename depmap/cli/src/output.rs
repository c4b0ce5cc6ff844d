//! Rendering for the `depmap` subcommands.
//!
//! Tables go out as TOML, single lines as shell-quoted words so they can be
//! used in `$(...)` substitutions.

use depmap_lib::{Ecosystems, External, ExternalCategory};
use serde::Serialize;

/// Prints the `[external]` table of `pyproject` exactly as parsed.
pub fn print_raw(pyproject: &str) -> color_eyre::Result<()> {
    let mut document: toml::Table = toml::from_str(pyproject)?;
    let mut wrapper = toml::Table::new();
    if let Some(external) = document.remove("external") {
        wrapper.insert("external".to_string(), external);
    }
    print!("{}", toml::to_string(&wrapper)?);
    Ok(())
}

/// Prints canonical identifiers per non-empty category.
pub fn print_normalized(external: &External) -> color_eyre::Result<()> {
    print_mapped(&external.to_normalized())
}

/// Prints per-category strings as an `[external]` table.
pub fn print_mapped(categories: &[(ExternalCategory, Vec<String>)]) -> color_eyre::Result<()> {
    let mut table = toml::Table::new();
    for (category, values) in categories {
        let values = values.iter().cloned().map(toml::Value::String).collect();
        table.insert(category.to_string(), toml::Value::Array(values));
    }
    let mut wrapper = toml::Table::new();
    wrapper.insert("external".to_string(), toml::Value::Table(table));
    print!("{}", toml::to_string(&wrapper)?);
    Ok(())
}

/// Prints `words` as one shell-quoted line.
pub fn print_line(words: &[String]) {
    println!("{}", shell_words::join(words));
}

/// Prints specifier groups or commands, one per line or as a JSON array.
pub fn print_lines(lines: &[Vec<String>], json: bool) -> color_eyre::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(lines)?);
    } else {
        for line in lines {
            print_line(line);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct EcosystemRow<'a> {
    name: &'a str,
    mapping: String,
}

/// Prints each catalog ecosystem with where its mapping lives.
pub fn print_ecosystems(catalog: &Ecosystems, json: bool) -> color_eyre::Result<()> {
    let mut rows = Vec::new();
    for name in catalog.names() {
        rows.push(EcosystemRow {
            name,
            mapping: catalog.mapping_source(name)?.to_string(),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for row in &rows {
        println!("{:<width$}  {}", row.name, row.mapping);
    }
    Ok(())
}
