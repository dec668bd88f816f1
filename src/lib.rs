use thiserror::Error;

pub type Result<T> = std::result::Result<T, VeryfiError>;

#[derive(Error, Debug)]
pub enum VeryfiError {
    /// One or more Veryfi credentials are missing or blank. Carries the full
    /// diagnostic produced by [`config::Credentials::diagnose`].
    #[error("{0}")]
    Credentials(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Veryfi API returned HTTP {status}: {body}")]
    RemoteService { status: u16, body: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Failed to decode Veryfi response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod mcp;
pub mod veryfi;
