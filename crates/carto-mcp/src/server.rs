//! MCP server setup and lifecycle.
//!
//! Provides [`run_server`] which starts the stdio-based MCP server,
//! registering the map and search tools and blocking until the client
//! disconnects.

use std::path::PathBuf;

use carto_core::CartoError;
use rmcp::{model::*, tool_handler, transport::stdio, ServerHandler, ServiceExt};

use crate::tools::CartoServer;

const SERVER_INSTRUCTIONS: &str = "\
Carto builds ranked, token-budgeted repository maps. Use these tools to understand codebases:\n\
- repo_map: Get a structural map of the repository, ranked by cross-file references, \
with optional priority files and mentioned identifiers to steer the ranking\n\
- search_identifiers: Find definitions and references of identifiers by name substring";

#[tool_handler]
impl ServerHandler for CartoServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "carto".to_string(),
                title: Some("Carto Repository Maps".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some(
                    "Token-budgeted repository maps ranked by cross-file references".to_string(),
                ),
                icons: None,
                website_url: None,
            },
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
        }
    }
}

/// Start the MCP server on stdio transport.
///
/// This is called by the `carto mcp` CLI subcommand. It blocks until the
/// client closes stdin.
///
/// # Errors
///
/// Returns [`CartoError`] if the server fails to initialize or encounters
/// a transport error.
///
/// # Examples
///
/// ```no_run
/// use std::path::PathBuf;
///
/// # async fn example() -> Result<(), carto_core::CartoError> {
/// carto_mcp::server::run_server(PathBuf::from(".")).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server(root: PathBuf) -> Result<(), CartoError> {
    let server = CartoServer::new(root);
    let service = server
        .serve(stdio())
        .await
        .map_err(|e| CartoError::Config(format!("MCP server failed to start: {e}")))?;

    service
        .waiting()
        .await
        .map_err(|e| CartoError::Config(format!("MCP server error: {e}")))?;

    Ok(())
}
