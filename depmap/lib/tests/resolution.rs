use depmap_lib::mapping::MultipleSpecifiers;
use depmap_lib::{Category, DepmapError, ResolveOptions};
use tracing_test::traced_test;


// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_registry_fixture_loads_and_validates() {
    let registry = fixtures::registry();
    assert!(registry.schema().is_some());
    assert_eq!(registry.all_entries().count(), 10);
    assert!(registry.validate().is_ok());
}

#[test]
fn test_registry_splits_canonical_and_aliases() {
    let registry = fixtures::registry();
    let aliases: Vec<&str> = registry.alias_entries().map(|d| d.id.as_str()).collect();
    assert_eq!(
        aliases,
        vec![
            "dep:generic/gcc",
            "dep:github/yaml/libyaml",
            "dep:github/apache/arrow"
        ]
    );
    // gcc only provides a virtual id, so it is canonical too
    assert!(registry.canonical_entries().any(|d| d.id == "dep:generic/gcc"));
    assert!(!registry.canonical_entries().any(|d| d.id == "dep:github/apache/arrow"));
}

// ============================================================================
// Entry lookup
// ============================================================================

#[test]
fn test_alias_widening_returns_canonical_and_alias_entries() {
    let registry = fixtures::registry();
    let fedora = fixtures::mapping("fedora");

    let plain = fedora.entries_by_id("dep:generic/libyaml", &ResolveOptions::default());
    assert_eq!(plain.len(), 1);

    let options = ResolveOptions::default().registry(&registry);
    let widened = fedora.entries_by_id("dep:generic/libyaml", &options);
    let ids: Vec<&str> = widened.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["dep:generic/libyaml", "dep:github/yaml/libyaml"]);
}

#[test]
fn test_alias_lookup_finds_canonical_entry() {
    let registry = fixtures::registry();
    let conda = fixtures::mapping("conda-forge");
    let options = ResolveOptions::default().registry(&registry);

    let entries = conda.entries_by_id("dep:github/apache/arrow", &options);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "dep:generic/arrow");
    assert_eq!(entries[0].specs.run, vec!["libarrow"]);
}

#[test]
fn test_specs_from_inherits_flat_list() {
    let fedora = fixtures::mapping("fedora");
    let entries = fedora.entries_by_id("dep:generic/libyaml", &ResolveOptions::default());
    assert_eq!(entries[0].specs.build, vec!["libyaml", "libyaml-devel"]);
    assert_eq!(entries[0].specs.host, vec!["libyaml", "libyaml-devel"]);
}

#[test]
fn test_only_mapped_drops_empty_entries() {
    let conda = fixtures::mapping("conda-forge");
    let options = ResolveOptions::default().only_mapped(true);
    assert!(conda.entries_by_id("dep:generic/openmp", &options).is_empty());
    assert_eq!(
        conda
            .entries_by_id("dep:generic/openmp", &ResolveOptions::default())
            .len(),
        1
    );
}

#[test]
fn test_fixture_mappings_validate() {
    assert!(fixtures::mapping("conda-forge").validate().is_ok());
    assert!(fixtures::mapping("fedora").validate().is_ok());
}

// ============================================================================
// Specifiers
// ============================================================================

#[test]
fn test_specifiers_are_deduplicated_across_categories() {
    let conda = fixtures::mapping("conda-forge");
    let groups = conda
        .specs_for("dep:generic/zlib", "conda", &ResolveOptions::default())
        .unwrap();
    assert_eq!(groups, vec![vec!["zlib"], vec!["libzlib"]]);
}

#[test]
fn test_conda_version_translation() {
    let conda = fixtures::mapping("conda-forge");
    let options = ResolveOptions::default();
    let specs = |url: &str| conda.specs_for(url, "conda", &options).unwrap();

    assert_eq!(specs("dep:generic/llvm@20"), vec![vec!["llvm==20"]]);
    assert_eq!(specs("dep:generic/llvm@>20"), vec![vec!["llvm>20"]]);
    assert_eq!(specs("dep:generic/llvm@<22,>=21"), vec![vec!["llvm<22,>=21"]]);
}

#[test]
fn test_dnf_exploded_ranges_stay_in_one_group() {
    let fedora = fixtures::mapping("fedora");
    let options = ResolveOptions::default().categories(&[Category::Build]);
    let groups = fedora
        .specs_for("dep:generic/zlib@>=1.2,<2", "dnf", &options)
        .unwrap();
    assert_eq!(groups, vec![vec!["zlib-devel >= 1.2", "zlib-devel < 2"]]);
}

#[test]
fn test_unsupported_operator_names_package_and_alternatives() {
    let conda = fixtures::mapping("conda-forge");
    let err = conda
        .specs_for("dep:generic/llvm@~=20.1", "conda", &ResolveOptions::default())
        .unwrap_err();
    match err {
        DepmapError::UnsupportedOperator {
            package,
            operator,
            supported,
            ..
        } => {
            assert_eq!(package, "llvm");
            assert_eq!(operator, "~=");
            assert!(supported.contains(&">=".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[traced_test]
#[test]
fn test_exact_version_degrades_without_exact_syntax() {
    let fedora = fixtures::mapping("fedora");
    let options = ResolveOptions::default().categories(&[Category::Run]);
    let groups = fedora
        .specs_for("dep:generic/zlib@1.3", "dnf-single", &options)
        .unwrap();
    assert_eq!(groups, vec![vec!["zlib"]]);
    assert!(logs_contain("exact versions not supported"));
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn test_install_command_batches_with_always() {
    let fedora = fixtures::mapping("fedora");
    let dnf = fedora.get_package_manager("dnf").unwrap();
    assert_eq!(dnf.multiple_specifiers(), MultipleSpecifiers::Always);

    let commands = fedora
        .install_commands_for("dep:generic/zlib", "dnf", &ResolveOptions::default())
        .unwrap();
    assert_eq!(
        commands,
        vec![vec!["sudo", "dnf", "install", "-y", "zlib-devel", "zlib"]]
    );
}

#[test]
fn test_install_command_splits_with_never() {
    let fedora = fixtures::mapping("fedora");
    let commands = fedora
        .install_commands_for("dep:generic/zlib", "dnf-single", &ResolveOptions::default())
        .unwrap();
    assert_eq!(
        commands,
        vec![
            vec!["sudo", "dnf", "install", "-y", "zlib-devel"],
            vec!["sudo", "dnf", "install", "-y", "zlib"],
        ]
    );
}

#[test]
fn test_install_command_with_exploded_ranges() {
    let fedora = fixtures::mapping("fedora");
    let options = ResolveOptions::default().categories(&[Category::Run]);
    let commands = fedora
        .install_commands_for("dep:generic/zlib@>=1.2,<2", "dnf", &options)
        .unwrap();
    assert_eq!(
        commands,
        vec![vec!["sudo", "dnf", "install", "-y", "zlib >= 1.2", "zlib < 2"]]
    );
}

#[test]
fn test_query_commands_use_bare_names() {
    let conda = fixtures::mapping("conda-forge");
    let commands = conda
        .query_commands_for("dep:generic/zlib@>=1.2", "conda", &ResolveOptions::default())
        .unwrap();
    assert_eq!(
        commands,
        vec![
            vec!["conda", "list", "-f", "zlib"],
            vec!["conda", "list", "-f", "libzlib"],
        ]
    );
}

#[test]
fn test_query_without_template_is_single_empty_command() {
    let fedora = fixtures::mapping("fedora");
    let commands = fedora
        .query_commands_for("dep:generic/zlib", "dnf-single", &ResolveOptions::default())
        .unwrap();
    assert_eq!(commands, vec![Vec::<String>::new()]);
}

#[test]
fn test_unknown_identifier_renders_nothing() {
    let conda = fixtures::mapping("conda-forge");
    let commands = conda
        .install_commands_for("dep:generic/nothing-here", "conda", &ResolveOptions::default())
        .unwrap();
    assert!(commands.is_empty());
}

// ============================================================================
// Catalog and cache
// ============================================================================

#[test]
fn test_cache_resolves_relative_mapping_paths() {
    let cache = fixtures::cache();
    let names: Vec<String> = cache
        .ecosystems()
        .unwrap()
        .names()
        .map(str::to_string)
        .collect();
    assert_eq!(names, vec!["fedora", "conda-forge"]);

    let fedora = cache.mapping_for_ecosystem("fedora").unwrap();
    assert_eq!(fedora.name(), Some("fedora"));
}

#[test]
fn test_cache_finds_ecosystem_for_package_manager() {
    let cache = fixtures::cache();
    assert_eq!(
        cache.find_ecosystem_for_package_manager("conda").unwrap(),
        "conda-forge"
    );
    assert_eq!(
        cache.find_ecosystem_for_package_manager("dnf-single").unwrap(),
        "fedora"
    );
    assert!(matches!(
        cache.find_ecosystem_for_package_manager("pacman"),
        Err(DepmapError::NotFound { .. })
    ));
}
