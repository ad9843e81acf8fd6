//! # Error Taxonomy
//!
//! Every fallible operation in the relay returns a [`SwanError`]. The
//! variants map one-to-one onto the failure classes a caller can act on:
//! a denied caller, a bad parameter, a bad payload, a misbehaving access
//! node, an unreachable access node, a half-configured deployment, or a
//! signing failure.
//!
//! Nothing here is retried. The first error is terminal for the request
//! that produced it; the HTTP layer decides what the caller gets to see.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SwanError>;

/// Errors produced by the relay pipeline.
#[derive(Debug, Error)]
pub enum SwanError {
    /// The access gate rejected the caller.
    #[error("Not authorized")]
    Authorization,

    /// A publisher-supplied parameter is missing or malformed.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The decrypted payload could not be decoded.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A downstream call answered with a non-success status.
    ///
    /// The message format matches what operators grep for in the logs of
    /// older deployments, so keep it stable.
    #[error("API call '{url}' returned '{status}' and '{body}'")]
    Upstream {
        /// Full URL of the downstream call.
        url: String,
        /// HTTP status code returned.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },

    /// The downstream call never produced a response.
    #[error("network error calling '{url}': {reason}")]
    Network {
        /// Full URL of the downstream call.
        url: String,
        /// Transport-level failure description.
        reason: String,
    },

    /// The deployment is missing something an operator has to set up.
    #[error("{0}")]
    Configuration(String),

    /// Signing or serializing a token failed.
    #[error("encoding failed: {0}")]
    Encoding(String),
}

/// Coarse classification of a [`SwanError`], used for metrics labels and
/// status mapping without matching on payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authorization,
    InvalidParameter,
    Validation,
    Upstream,
    Network,
    Configuration,
    Encoding,
}

impl ErrorKind {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authorization => "authorization",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::Validation => "validation",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Network => "network",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Encoding => "encoding",
        }
    }
}

impl SwanError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SwanError::Authorization => ErrorKind::Authorization,
            SwanError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            SwanError::Validation(_) => ErrorKind::Validation,
            SwanError::Upstream { .. } => ErrorKind::Upstream,
            SwanError::Network { .. } => ErrorKind::Network,
            SwanError::Configuration(_) => ErrorKind::Configuration,
            SwanError::Encoding(_) => ErrorKind::Encoding,
        }
    }

    /// Shorthand for an [`SwanError::InvalidParameter`].
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        SwanError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
