use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single symbol occurrence extracted from source code.
///
/// Tags come in two kinds: definitions (a symbol is declared here) and
/// references (a symbol is used here). Definitions are what a map renders;
/// references exist only to build edges in the cross-file reference graph.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use carto_map::tags::{Tag, TagKind};
///
/// let tag = Tag {
///     path: PathBuf::from("/repo/src/main.rs"),
///     rel_path: PathBuf::from("src/main.rs"),
///     line: 1,
///     name: "main".into(),
///     kind: TagKind::Def,
/// };
/// assert_eq!(tag.kind, TagKind::Def);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Absolute path to the file containing the symbol.
    pub path: PathBuf,
    /// Path relative to the repository root.
    pub rel_path: PathBuf,
    /// Line number of the occurrence (1-indexed).
    pub line: u32,
    /// Identifier text.
    pub name: String,
    /// Whether the symbol is declared or used here.
    pub kind: TagKind,
}

impl Tag {
    /// The relative path as a displayable string.
    pub fn rel_str(&self) -> String {
        self.rel_path.to_string_lossy().into_owned()
    }
}

/// Distinguishes definition sites from reference sites.
///
/// # Examples
///
/// ```
/// use carto_map::tags::TagKind;
///
/// let kind: TagKind = serde_json::from_str("\"def\"").unwrap();
/// assert_eq!(kind, TagKind::Def);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// The symbol is declared at this location.
    Def,
    /// The symbol is used at this location.
    Ref,
}

/// A definition tag paired with its computed importance score.
///
/// Produced by the scorer, consumed by the budget selector and renderer.
/// Lists of scored tags are always ordered by score descending, with
/// first-seen order preserved on ties.
#[derive(Debug, Clone)]
pub struct ScoredTag {
    /// File importance multiplied by the tag's boosts.
    pub score: f64,
    /// The underlying definition tag.
    pub tag: Tag,
}
