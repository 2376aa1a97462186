//! MCP server interface exposing repository maps to IDEs and agents.
//!
//! Implements a Model Context Protocol server using rmcp that exposes
//! `repo_map` and `search_identifiers` tools over stdio transport for
//! integration with Cursor, Windsurf, Claude Desktop, and VS Code Copilot.
//!
//! # Examples
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), carto_core::CartoError> {
//! carto_mcp::server::run_server(PathBuf::from(".")).await?;
//! # Ok(())
//! # }
//! ```

pub mod server;
pub mod tools;
