//! Identifier search.
//!
//! Case-insensitive substring search over extracted tag names, with a few
//! lines of file context per hit. Definitions sort before references, and
//! within a kind, names where the query matches earlier come first.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::snippet::render_lines;
use crate::tags::{Tag, TagKind};

/// Knobs for [`search_tags`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub max_results: usize,
    pub context_lines: usize,
    pub include_definitions: bool,
    pub include_references: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 50,
            context_lines: 2,
            include_definitions: true,
            include_references: true,
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub file: String,
    pub line: u32,
    pub name: String,
    pub kind: TagKind,
    pub context: String,
}

/// Search tags by name.
///
/// Results are capped at `max_results` before context is rendered, and
/// hits whose file cannot be read any more are dropped.
///
/// # Examples
///
/// ```
/// use carto_map::search::{search_tags, SearchOptions};
///
/// let results = search_tags(&[], "config", &SearchOptions::default());
/// assert!(results.is_empty());
/// ```
pub fn search_tags(tags: &[Tag], query: &str, options: &SearchOptions) -> Vec<SearchResult> {
    let query_lower = query.to_lowercase();

    let mut matched: Vec<(&Tag, usize)> = Vec::new();
    for tag in tags {
        let Some(pos) = tag.name.to_lowercase().find(&query_lower) else {
            continue;
        };
        let keep = match tag.kind {
            TagKind::Def => options.include_definitions,
            TagKind::Ref => options.include_references,
        };
        if keep {
            matched.push((tag, pos));
        }
    }

    matched.sort_by_key(|(tag, pos)| (tag.kind != TagKind::Def, *pos));
    matched.truncate(options.max_results);

    let mut contents: BTreeMap<&Path, Option<String>> = BTreeMap::new();
    let mut results = Vec::new();
    for (tag, _) in matched {
        let content = contents.entry(tag.path.as_path()).or_insert_with(|| {
            std::fs::read(&tag.path)
                .ok()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        });
        let Some(code) = content else {
            continue;
        };
        let context = render_lines(code, &[tag.line], options.context_lines);
        if context.is_empty() {
            continue;
        }
        results.push(SearchResult {
            file: tag.rel_str(),
            line: tag.line,
            name: tag.name.clone(),
            kind: tag.kind,
            context,
        });
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tag_at(path: &Path, rel: &str, line: u32, name: &str, kind: TagKind) -> Tag {
        Tag {
            path: path.to_path_buf(),
            rel_path: PathBuf::from(rel),
            line,
            name: name.to_string(),
            kind,
        }
    }

    fn sample_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("app.py");
        std::fs::write(
            &path,
            "import os\n\nclass Config:\n    pass\n\ndef load_config():\n    return Config()\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn matches_are_case_insensitive_substrings() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_file(&dir);
        let tags = vec![
            tag_at(&path, "app.py", 3, "Config", TagKind::Def),
            tag_at(&path, "app.py", 6, "load_config", TagKind::Def),
            tag_at(&path, "app.py", 1, "os", TagKind::Ref),
        ];

        let results = search_tags(&tags, "CONFIG", &SearchOptions::default());
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Config", "load_config"]);
    }

    #[test]
    fn definitions_sort_before_references() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_file(&dir);
        let tags = vec![
            tag_at(&path, "app.py", 7, "Config", TagKind::Ref),
            tag_at(&path, "app.py", 3, "Config", TagKind::Def),
        ];

        let results = search_tags(&tags, "config", &SearchOptions::default());
        assert_eq!(results[0].kind, TagKind::Def);
        assert_eq!(results[1].kind, TagKind::Ref);
    }

    #[test]
    fn earlier_match_position_wins_within_a_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_file(&dir);
        let tags = vec![
            tag_at(&path, "app.py", 6, "load_config", TagKind::Def),
            tag_at(&path, "app.py", 3, "Config", TagKind::Def),
        ];

        let results = search_tags(&tags, "config", &SearchOptions::default());
        assert_eq!(results[0].name, "Config");
        assert_eq!(results[1].name, "load_config");
    }

    #[test]
    fn kind_filters_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_file(&dir);
        let tags = vec![
            tag_at(&path, "app.py", 3, "Config", TagKind::Def),
            tag_at(&path, "app.py", 7, "Config", TagKind::Ref),
        ];

        let defs_only = SearchOptions {
            include_references: false,
            ..SearchOptions::default()
        };
        let results = search_tags(&tags, "config", &defs_only);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, TagKind::Def);

        let refs_only = SearchOptions {
            include_definitions: false,
            ..SearchOptions::default()
        };
        let results = search_tags(&tags, "config", &refs_only);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, TagKind::Ref);
    }

    #[test]
    fn results_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_file(&dir);
        let tags: Vec<Tag> = (1..=7)
            .map(|i| tag_at(&path, "app.py", i, "Config", TagKind::Def))
            .collect();

        let capped = SearchOptions {
            max_results: 3,
            ..SearchOptions::default()
        };
        assert_eq!(search_tags(&tags, "config", &capped).len(), 3);
    }

    #[test]
    fn context_covers_surrounding_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_file(&dir);
        let tags = vec![tag_at(&path, "app.py", 3, "Config", TagKind::Def)];

        let results = search_tags(&tags, "Config", &SearchOptions::default());
        let context = &results[0].context;
        assert!(context.contains("class Config:"), "{context}");
        assert!(context.contains("import os"), "line 1 within context: {context}");
        assert!(context.contains("   5\u{2502}"), "line 5 within context: {context}");
        assert!(!context.contains("load_config"), "line 6 out of range: {context}");
    }

    #[test]
    fn hits_in_unreadable_files_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone.py");
        let tags = vec![tag_at(&gone, "gone.py", 1, "Config", TagKind::Def)];
        assert!(search_tags(&tags, "config", &SearchOptions::default()).is_empty());
    }
}
