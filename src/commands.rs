use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::config::credentials::CredentialStatus;
use crate::mcp::McpServer;
use crate::mcp::tools::{PROCESS_DOCUMENT_TOOL, ProcessDocumentHandler, SERVER_INSTRUCTIONS};
use crate::veryfi::{DocumentType, VeryfiClient};

/// Build the MCP server with the `process_document` tool registered
#[inline]
pub async fn build_server(config: &Config) -> Result<McpServer> {
    let client = Arc::new(VeryfiClient::new(config).context("Failed to create Veryfi client")?);

    let server = McpServer::new(
        "veryfi-mcp".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    )
    .context("Failed to create MCP server")?
    .with_instructions(SERVER_INSTRUCTIONS);

    server
        .register_tool(
            ProcessDocumentHandler::tool_definition(),
            ProcessDocumentHandler::new(client),
        )
        .await
        .with_context(|| format!("Failed to register {PROCESS_DOCUMENT_TOOL} tool"))?;

    Ok(server)
}

/// Serve MCP over stdio until the client disconnects or Ctrl+C is received
#[inline]
pub async fn serve_mcp(config: &Config) -> Result<()> {
    info!(
        "Starting veryfi-mcp {} (API: {}, timeout: {}s)",
        env!("CARGO_PKG_VERSION"),
        config.api.base_url,
        config.api.timeout_secs
    );

    // Missing credentials are reported per call, so the server still starts
    if !config.credentials.is_complete() {
        warn!(
            "Veryfi credentials are incomplete; tool calls will fail until they are set. Run 'veryfi-mcp check' for details"
        );
    }

    let server = Arc::new(build_server(config).await?);
    info!("MCP server initialized with tools: {}", PROCESS_DOCUMENT_TOOL);

    tokio::select! {
        result = Arc::clone(&server).serve_stdio() => {
            if let Err(e) = result {
                error!("MCP server error: {}", e);
                return Err(e);
            }
            info!("MCP server stopped normally");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt signal, shutting down");
        }
    }

    Ok(())
}

/// Submit one document and print the extracted JSON to stdout
#[inline]
pub async fn process_file(config: &Config, file: &Path, document_type: DocumentType) -> Result<()> {
    let client = VeryfiClient::new(config).context("Failed to create Veryfi client")?;

    let result = client.process_document(file, document_type).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Print the effective settings and the state of each credential
#[inline]
pub fn check_credentials(config: &Config) -> Result<()> {
    println!("Veryfi API: {}", config.api.base_url);
    println!("Request timeout: {}s", config.api.timeout_secs);
    println!();
    println!("Credentials:");

    for (name, status) in config.credentials.status() {
        let marker = if status == CredentialStatus::Set {
            "✅"
        } else {
            "❌"
        };
        println!("  {marker} {name}: {}", status.as_str());
    }

    if let Some(diagnostic) = config.credentials.diagnose() {
        println!();
        println!("{diagnostic}");
        bail!("Veryfi credentials are incomplete");
    }

    println!();
    println!("All credentials are set.");
    Ok(())
}
