//! Tool implementations for the Carto MCP server.
//!
//! Two tools are exposed: `repo_map` and `search_identifiers`. Each builds a
//! fresh mapping engine for the resolved repository root and returns JSON
//! via `CallToolResult`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars, tool, tool_router, ErrorData as McpError,
};
use serde::{Deserialize, Serialize};

use carto_core::{CartoConfig, SilentSink};
use carto_map::tokens::{CharCounter, TiktokenCounter};
use carto_map::{FileReport, RepoMapper, SearchOptions, SearchResult};

/// Token budget used when the client omits or zeroes `token_limit`.
const DEFAULT_TOKEN_LIMIT: usize = 8192;

/// MCP server exposing repository map tools.
///
/// # Examples
///
/// ```
/// use carto_mcp::tools::CartoServer;
/// use std::path::PathBuf;
///
/// let server = CartoServer::new(PathBuf::from("."));
/// ```
#[derive(Clone)]
pub struct CartoServer {
    pub(crate) root: PathBuf,
    pub(crate) tool_router: ToolRouter<Self>,
}

// --- Parameter structs ---

/// Parameters for the `repo_map` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RepoMapParams {
    /// Repository path (default: server's configured root).
    pub path: Option<String>,
    /// Repo-relative files to rank highest (the current working set).
    pub priority_files: Option<Vec<String>>,
    /// Repo-relative candidate files; defaults to walking the whole root.
    pub other_files: Option<Vec<String>>,
    /// Token budget for the map (default: 8192).
    pub token_limit: Option<usize>,
    /// Skip files the reference graph considers disconnected.
    pub exclude_unranked: Option<bool>,
    /// Re-extract tags even when the cache is fresh.
    pub force_refresh: Option<bool>,
    /// Repo-relative files mentioned in conversation (mid-level boost).
    pub mentioned_files: Option<Vec<String>>,
    /// Identifier names mentioned in conversation (boosts their definitions).
    pub mentioned_idents: Option<Vec<String>>,
    /// Model context window size; widens the budget when no priority files
    /// are given.
    pub max_context_window: Option<usize>,
}

/// Parameters for the `search_identifiers` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchIdentifiersParams {
    /// Repository path (default: server's configured root).
    pub path: Option<String>,
    /// Identifier substring to match, case-insensitive.
    pub query: String,
    /// Maximum results (default: 50).
    pub max_results: Option<usize>,
    /// Context lines around each hit (default: 2).
    pub context_lines: Option<usize>,
    /// Include definition tags (default: true).
    pub include_definitions: Option<bool>,
    /// Include reference tags (default: true).
    pub include_references: Option<bool>,
}

// --- Response structs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RepoMapResponse {
    map: String,
    report: FileReport,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    results: Vec<SearchResult>,
    total: usize,
}

fn mcp_err(msg: impl Into<String>) -> McpError {
    McpError::internal_error(msg.into(), None)
}

#[tool_router]
impl CartoServer {
    /// Create a new server rooted at the given repository path.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            tool_router: Self::tool_router(),
        }
    }

    fn resolve_path(&self, path: &Option<String>) -> Result<PathBuf, McpError> {
        let canonical_root = self.root.canonicalize().map_err(|e| {
            mcp_err(format!(
                "Failed to access configured repository root {}: {e}",
                self.root.display()
            ))
        })?;

        let requested = match path {
            Some(p) => {
                let input = PathBuf::from(p);
                if input.is_absolute() {
                    input
                } else {
                    canonical_root.join(input)
                }
            }
            None => canonical_root.clone(),
        };

        let canonical_requested = requested.canonicalize().map_err(|e| {
            mcp_err(format!(
                "Failed to resolve path {}: {e}",
                requested.display()
            ))
        })?;

        if !canonical_requested.starts_with(&canonical_root) {
            return Err(mcp_err(format!(
                "Path {} is outside the configured repository {}",
                canonical_requested.display(),
                canonical_root.display()
            )));
        }

        Ok(canonical_requested)
    }

    #[tool(
        name = "repo_map",
        description = "Generate a token-budgeted structural map of the repository: the highest-ranked definitions across files, ranked by cross-file references. Priority files, mentioned files, and mentioned identifiers steer the ranking. Use this to understand codebase structure before making changes."
    )]
    pub async fn repo_map(
        &self,
        Parameters(params): Parameters<RepoMapParams>,
    ) -> Result<CallToolResult, McpError> {
        let root = self.resolve_path(&params.path)?;
        if !root.is_dir() {
            return Err(mcp_err(format!(
                "Project root is not a directory: {}",
                root.display()
            )));
        }

        let mut token_limit = params.token_limit.unwrap_or(DEFAULT_TOKEN_LIMIT);
        if token_limit == 0 {
            token_limit = DEFAULT_TOKEN_LIMIT;
        }

        let mut config = CartoConfig::default();
        config.map.map_tokens = token_limit;
        config.map.exclude_unranked = params.exclude_unranked.unwrap_or(false);
        config.map.max_context_window = params.max_context_window;

        let priority: Vec<PathBuf> = params
            .priority_files
            .unwrap_or_default()
            .iter()
            .map(|f| root.join(f))
            .collect();
        let other_files = params.other_files;
        let mentioned_files: BTreeSet<String> =
            params.mentioned_files.unwrap_or_default().into_iter().collect();
        let mentioned_idents: BTreeSet<String> =
            params.mentioned_idents.unwrap_or_default().into_iter().collect();
        let force_refresh = params.force_refresh.unwrap_or(false);

        // The engine owns a rusqlite connection (Send but not Sync), so the
        // whole pipeline moves into a blocking task.
        let response = tokio::task::spawn_blocking(move || {
            let counter = TiktokenCounter::new()
                .map_err(|e| mcp_err(format!("Failed to load token vocabulary: {e}")))?;
            let mut mapper = RepoMapper::new(
                &root,
                config,
                Box::new(counter),
                Arc::new(SilentSink),
            )
            .with_force_refresh(force_refresh);

            let other: Vec<PathBuf> = match other_files {
                Some(files) if !files.is_empty() => {
                    files.iter().map(|f| root.join(f)).collect()
                }
                _ => mapper
                    .find_source_files()
                    .map_err(|e| mcp_err(format!("Failed to walk repository: {e}")))?
                    .into_iter()
                    .map(|f| f.path)
                    .collect(),
            };
            let priority_set: BTreeSet<PathBuf> = priority.iter().cloned().collect();
            let other: Vec<PathBuf> = other
                .into_iter()
                .filter(|p| !priority_set.contains(p))
                .collect();

            if priority.is_empty() && other.is_empty() {
                return Ok(RepoMapResponse {
                    map: "No files found to generate a map.".to_string(),
                    report: FileReport::default(),
                });
            }

            let (map, report) =
                mapper.generate_map(&priority, &other, &mentioned_files, &mentioned_idents);
            Ok::<_, McpError>(RepoMapResponse {
                map: map.unwrap_or_else(|| "No repository map could be generated.".to_string()),
                report,
            })
        })
        .await
        .map_err(|e| mcp_err(format!("Map task failed: {e}")))??;

        let json = serde_json::to_string_pretty(&response).map_err(|e| mcp_err(e.to_string()))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        name = "search_identifiers",
        description = "Search the repository for identifiers by name substring, case-insensitively. Returns definitions and references with surrounding source context, definitions first. Use this to locate a symbol before reading the file."
    )]
    pub async fn search_identifiers(
        &self,
        Parameters(params): Parameters<SearchIdentifiersParams>,
    ) -> Result<CallToolResult, McpError> {
        let root = self.resolve_path(&params.path)?;

        let defaults = SearchOptions::default();
        let options = SearchOptions {
            max_results: params.max_results.unwrap_or(defaults.max_results),
            context_lines: params.context_lines.unwrap_or(defaults.context_lines),
            include_definitions: params
                .include_definitions
                .unwrap_or(defaults.include_definitions),
            include_references: params
                .include_references
                .unwrap_or(defaults.include_references),
        };
        let query = params.query;

        let response = tokio::task::spawn_blocking(move || {
            let mut mapper = RepoMapper::new(
                &root,
                CartoConfig::default(),
                Box::new(CharCounter),
                Arc::new(SilentSink),
            );
            let results = mapper
                .search(&query, &options)
                .map_err(|e| mcp_err(format!("Search failed: {e}")))?;
            let total = results.len();
            Ok::<_, McpError>(SearchResponse { results, total })
        })
        .await
        .map_err(|e| mcp_err(format!("Search task failed: {e}")))??;

        let json = serde_json::to_string_pretty(&response).map_err(|e| mcp_err(e.to_string()))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn resolve_path_accepts_relative_in_root() {
        let repo = tempfile::tempdir().unwrap();
        let src_dir = repo.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();

        let server = CartoServer::new(repo.path().to_path_buf());
        let resolved = server.resolve_path(&Some("src".to_string())).unwrap();

        assert_eq!(resolved, src_dir.canonicalize().unwrap());
    }

    #[test]
    fn resolve_path_accepts_absolute_in_root() {
        let repo = tempfile::tempdir().unwrap();
        let nested_dir = repo.path().join("nested");
        fs::create_dir_all(&nested_dir).unwrap();

        let server = CartoServer::new(repo.path().to_path_buf());
        let resolved = server
            .resolve_path(&Some(nested_dir.display().to_string()))
            .unwrap();

        assert_eq!(resolved, nested_dir.canonicalize().unwrap());
    }

    #[test]
    fn resolve_path_rejects_parent_escape() {
        let repo = tempfile::tempdir().unwrap();
        fs::create_dir_all(repo.path().join("safe")).unwrap();

        let server = CartoServer::new(repo.path().to_path_buf());
        let err = server.resolve_path(&Some("../".to_string())).unwrap_err();

        assert!(err.message.contains("outside the configured repository"));
    }

    #[test]
    fn resolve_path_rejects_absolute_outside_root() {
        let repo = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();

        let server = CartoServer::new(repo.path().to_path_buf());
        let err = server
            .resolve_path(&Some(outside.path().display().to_string()))
            .unwrap_err();

        assert!(err.message.contains("outside the configured repository"));
    }
}
