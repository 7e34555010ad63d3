//! Error types for shopfloor-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::offline::PayloadError;
use crate::workorder::TransitionError;

/// Result type alias using shopfloor-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shopfloor-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure (DNS, connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No session is available to authenticate the request
    #[error("Not authenticated. Sign in first.")]
    Unauthenticated,

    /// The backend rejected the bearer token; the session was ended
    #[error("Session expired or revoked. Sign in again.")]
    Unauthorized,

    /// Non-2xx response from the backend
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Session provider failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Payload failed boundary validation
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Illegal work-order lifecycle transition
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 2xx response whose body has the wrong shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for errors that ended the current session.
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Unauthorized)
    }
}
