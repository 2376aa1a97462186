//! Integration test: walk → extract → rank → render on real file trees.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use carto_core::{CartoConfig, SilentSink};
use carto_map::engine::RepoMapper;
use carto_map::tokens::CharCounter;
use carto_map::walker::Language;
use carto_map::{map_repository, SearchOptions, TagKind};
use tempfile::TempDir;

/// A small polyglot repository with one cross-file reference per language.
fn fixture_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("core.py"),
        "def shared_helper():\n    pass\n",
    )
    .unwrap();
    fs::write(dir.path().join("app.py"), "shared_helper()\n").unwrap();
    fs::write(dir.path().join("lib.rs"), "pub fn render_widget() {}\n").unwrap();
    fs::write(
        dir.path().join("main.rs"),
        "fn main() {\n    render_widget();\n}\n",
    )
    .unwrap();
    fs::write(dir.path().join("util.js"), "function formatLabel() {}\n").unwrap();
    fs::write(dir.path().join("index.js"), "formatLabel();\n").unwrap();
    fs::write(dir.path().join("README.md"), "# Fixture\n").unwrap();
    dir
}

#[test]
fn end_to_end_on_own_sources() {
    let crate_root = Path::new(env!("CARGO_MANIFEST_DIR"));

    // Step 1: Walk
    let files = carto_map::walker::walk_repo(crate_root).unwrap();
    let rust_count = files
        .iter()
        .filter(|f| f.language == Language::Rust)
        .count();
    assert!(
        rust_count > 5,
        "should find this crate's own sources: {rust_count}"
    );

    // Step 2: Extract tags from every file
    let mut names = Vec::new();
    for file in &files {
        let tags = carto_map::extract::file_tags(&file.path, &file.rel_path).unwrap();
        names.extend(tags.into_iter().map(|t| t.name));
    }
    assert!(
        names.iter().any(|n| n == "RepoMapper"),
        "should tag the mapper type itself"
    );

    // Step 3: Full map, without writing a cache into the source tree
    let mut config = CartoConfig::default();
    config.cache.persistent = false;
    let (map, report) =
        map_repository(crate_root, config, &[], Arc::new(SilentSink)).unwrap();

    let map = map.unwrap();
    assert!(map.contains(".rs:"), "map should list Rust files");
    assert!(map.contains("(Rank value:"));
    assert!(
        report.definition_matches > 50,
        "own sources carry many definitions: {}",
        report.definition_matches
    );
    assert!(report.excluded.is_empty());
}

#[test]
fn polyglot_fixture_maps_every_language() {
    let dir = fixture_repo();
    let (map, report) = map_repository(
        dir.path(),
        CartoConfig::default(),
        &[],
        Arc::new(SilentSink),
    )
    .unwrap();

    let map = map.unwrap();
    assert!(map.contains("core.py:"));
    assert!(map.contains("lib.rs:"));
    assert!(map.contains("util.js:"));
    assert!(map.contains("README.md:"), "important files get a mention");
    assert!(map.contains("def shared_helper():"));

    // shared_helper, render_widget, main, formatLabel
    assert_eq!(report.definition_matches, 4);
    assert_eq!(report.reference_matches, 3);
    assert_eq!(report.total_files_considered, 7);
}

#[test]
fn priority_files_rank_first() {
    let dir = fixture_repo();
    let chat = vec![dir.path().join("core.py")];
    let (map, _) = map_repository(
        dir.path(),
        CartoConfig::default(),
        &chat,
        Arc::new(SilentSink),
    )
    .unwrap();

    let map = map.unwrap();
    let core_at = map.find("core.py:").unwrap();
    let lib_at = map.find("lib.rs:").unwrap();
    assert!(
        core_at < lib_at,
        "priority file should outrank unrelated files"
    );
}

#[test]
fn repeated_runs_are_byte_identical_and_reuse_the_cache() {
    let dir = fixture_repo();

    let (first, first_report) = map_repository(
        dir.path(),
        CartoConfig::default(),
        &[],
        Arc::new(SilentSink),
    )
    .unwrap();

    // The first run persisted tags next to the repository.
    let mapper = RepoMapper::new(
        dir.path(),
        CartoConfig::default(),
        Box::new(CharCounter),
        Arc::new(SilentSink),
    );
    assert!(mapper.tag_cache().is_persistent());
    assert_eq!(mapper.tag_cache().entry_count(), 7);

    let (second, second_report) = map_repository(
        dir.path(),
        CartoConfig::default(),
        &[],
        Arc::new(SilentSink),
    )
    .unwrap();

    assert_eq!(first, second);
    assert_eq!(first_report, second_report);
    assert!(first.is_some());
}

#[test]
fn search_spans_the_whole_repository() {
    let dir = fixture_repo();
    let mut mapper = RepoMapper::new(
        dir.path(),
        CartoConfig::default(),
        Box::new(CharCounter),
        Arc::new(SilentSink),
    );

    let results = mapper
        .search("shared_helper", &SearchOptions::default())
        .unwrap();

    assert_eq!(results.len(), 2, "one definition, one call site");
    assert_eq!(results[0].kind, TagKind::Def);
    assert_eq!(results[0].file, "core.py");
    assert_eq!(results[1].kind, TagKind::Ref);
    assert_eq!(results[1].file, "app.py");

    let json = serde_json::to_string(&results).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(parsed.is_array());
}
