use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] shopfloor_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Profile '{0}' is not signed in. Run `shopfloor auth login --email <email> --password <password>`.")]
    NotSignedIn(String),
    #[error("Sync failed: {0}")]
    SyncFailed(String),
    #[error("Refusing to clear synced transactions without confirmation. Re-run with --yes.")]
    ConfirmationRequired,
}

impl From<shopfloor_core::auth::AuthError> for CliError {
    fn from(error: shopfloor_core::auth::AuthError) -> Self {
        Self::Auth(error.to_string())
    }
}

impl From<shopfloor_core::config::ConfigError> for CliError {
    fn from(error: shopfloor_core::config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}
