//! Centralized transport error type shared by the contract testing crates.
//!
//! Every outbound HTTP call (provider replay, provider-state setup, broker
//! publishing) funnels its failures through [`CommonError`], which knows
//! whether the failure happened at the network level or after a response
//! was received.

use thiserror::Error;

/// Common error type for outbound calls.
#[derive(Error, Debug)]
pub enum CommonError {
    /// HTTP request failed after a connection was made
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote side could not be reached
    #[error("Service unreachable: {0}")]
    Unreachable(String),

    /// The remote side did not answer in time
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The remote side answered with an unexpected status
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code returned
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CommonError {
    /// Classify a reqwest error into the network-level variants where possible.
    ///
    /// Connection failures become [`CommonError::Unreachable`], timeouts become
    /// [`CommonError::Timeout`]; anything else stays [`CommonError::Http`].
    #[must_use]
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Http(err)
        }
    }

    /// Check if this error means the remote side was never reached.
    ///
    /// # Examples
    ///
    /// ```
    /// use contract_common::CommonError;
    ///
    /// let err = CommonError::Unreachable("connection refused".to_string());
    /// assert!(err.is_network_failure());
    ///
    /// let err = CommonError::InvalidInput("bad url".to_string());
    /// assert!(!err.is_network_failure());
    /// ```
    #[must_use]
    pub const fn is_network_failure(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }

    /// Create an unexpected status error.
    #[must_use]
    pub fn unexpected_status(status: u16, body: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            status,
            body: body.into(),
        }
    }

    /// Create an invalid input error with the given message.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
