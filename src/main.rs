use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;
use veryfi_mcp::commands::{check_credentials, process_file, serve_mcp};
use veryfi_mcp::config::{Config, load_dotenv};
use veryfi_mcp::veryfi::DocumentType;

#[derive(Parser)]
#[command(name = "veryfi-mcp")]
#[command(about = "MCP server exposing Veryfi receipt, invoice and purchase order extraction")]
#[command(version)]
struct Cli {
    /// Override the Veryfi request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio (default)
    Serve,
    /// Process a single document and print the extracted JSON
    Process {
        /// Path of the document to upload
        file: PathBuf,
        /// Kind of document being processed
        #[arg(long, value_enum, default_value_t = DocumentType::Receipt)]
        document_type: DocumentType,
    },
    /// Show which Veryfi credentials are configured
    Check,
}

#[tokio::main]
async fn main() {
    // stdout carries the MCP protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    load_dotenv();

    let mut config = Config::from_env()?;
    if let Some(timeout) = cli.timeout {
        config.api.set_timeout_secs(timeout)?;
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            serve_mcp(&config).await?;
        }
        Commands::Process {
            file,
            document_type,
        } => {
            process_file(&config, &file, document_type).await?;
        }
        Commands::Check => {
            check_credentials(&config)?;
        }
    }

    Ok(())
}
