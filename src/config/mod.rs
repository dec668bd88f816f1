// Configuration management module
// Settings and credentials are read once from the environment at startup and
// passed around explicitly from there.

pub mod credentials;
pub mod settings;


pub use credentials::{AuthHeaders, CredentialStatus, Credentials};
pub use settings::{ApiConfig, Config, ConfigError};

/// Load a `.env` file from the working directory or the nearest ancestor
/// containing one. Variables already set in the process environment are not
/// overridden. Returns the path of the loaded file, if any.
#[inline]
pub fn load_dotenv() -> Option<std::path::PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
            None
        }
    }
}
