//! Token-budgeted repository maps ranked by cross-file references.
//!
//! Extracts definition and reference tags with tree-sitter, links files into
//! a petgraph reference graph, ranks them with personalized PageRank, and
//! binary-searches for the largest rendered map that fits a token budget.
//! Tag extraction is memoized in a SQLite cache keyed by file modification
//! time, so repeated maps of an unchanged repository skip parsing entirely.

pub mod budget;
pub mod cache;
pub mod engine;
pub mod extract;
pub mod graph;
pub mod important;
pub mod rank;
pub mod render;
pub mod report;
pub mod score;
pub mod search;
pub mod snippet;
pub mod tags;
pub mod tokens;
pub mod walker;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use carto_core::{CartoConfig, OutputSink, Result};

pub use engine::RepoMapper;
pub use report::FileReport;
pub use search::{SearchOptions, SearchResult};
pub use tags::{ScoredTag, Tag, TagKind};

/// Generate a map of the repository at `root` in one call.
///
/// Walks the repository for source files, treats `chat_files` as priority
/// files, and maps everything else. Callers that need mention boosts,
/// verbose overviews, or cache control should drive [`RepoMapper`] directly.
///
/// # Errors
///
/// Returns an error when the root cannot be walked or the token vocabulary
/// fails to load.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use carto_core::{CartoConfig, SilentSink};
/// use carto_map::map_repository;
///
/// let dir = tempfile::tempdir()?;
/// let (map, report) = map_repository(dir.path(), CartoConfig::default(), &[], Arc::new(SilentSink))?;
/// assert!(map.is_none());
/// assert_eq!(report.total_files_considered, 0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn map_repository(
    root: &Path,
    config: CartoConfig,
    chat_files: &[PathBuf],
    sink: Arc<dyn OutputSink>,
) -> Result<(Option<String>, FileReport)> {
    let counter = Box::new(tokens::TiktokenCounter::new()?);
    let mut mapper = RepoMapper::new(root, config, counter, sink);

    let chat_set: BTreeSet<PathBuf> = chat_files
        .iter()
        .map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                root.join(p)
            }
        })
        .collect();
    let other: Vec<PathBuf> = mapper
        .find_source_files()?
        .into_iter()
        .map(|f| f.path)
        .filter(|p| !chat_set.contains(p))
        .collect();

    Ok(mapper.generate_map(chat_files, &other, &BTreeSet::new(), &BTreeSet::new()))
}
