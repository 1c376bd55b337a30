//! Error types for the GynDNS service
//!
//! Request-scoped variants (`Unauthenticated` through `StoreUnavailable`) are
//! handled at the front-end boundary and translated into protocol responses.
//! `Fatal` is the only variant that escalates to the supervisor.

use thiserror::Error;

use crate::access::AuthError;

/// Result type alias for GynDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the GynDNS service
#[derive(Error, Debug)]
pub enum Error {
    /// No credentials, or an empty username or password
    #[error("No credentials were found")]
    Unauthenticated,

    /// Unknown user or wrong password
    #[error(transparent)]
    InvalidCredentials(#[from] AuthError),

    /// Hostname is not covered by any of the user's patterns
    #[error("User {username} is not allowed to update {hostname}")]
    Unauthorized {
        /// Authenticated user
        username: String,
        /// Requested hostname
        hostname: String,
    },

    /// Missing or unparseable request input
    #[error("{0}")]
    BadRequest(String),

    /// Hostname has no published address
    #[error("Hostname {0} not found")]
    NotFound(String),

    /// The record store could not serve the request
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// A listener cannot bind or keep serving
    #[error("Fatal error in {listener} listener: {message}")]
    Fatal {
        /// Listener name ("dns" or "http")
        listener: String,
        /// What went wrong
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors outside of a listener
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a bad request error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a fatal listener error
    pub fn fatal(listener: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fatal {
            listener: listener.into(),
            message: message.into(),
        }
    }

    /// Create an authorization error
    pub fn unauthorized(username: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self::Unauthorized {
            username: username.into(),
            hostname: hostname.into(),
        }
    }

    /// Whether this error must bring the whole service down
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}
