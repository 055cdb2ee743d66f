//! Contract error types using thiserror 2.0.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, reading or writing contracts.
#[derive(Error, Debug)]
pub enum PactError {
    /// The contract document is unreadable or misses required fields
    #[error("Malformed contract {path}: {reason}")]
    MalformedContract {
        /// Where the document came from
        path: String,
        /// What was wrong with it
        reason: String,
    },

    /// No contract file at the given path
    #[error("Contract not found: {}", .0.display())]
    ContractNotFound(PathBuf),

    /// A consumer or provider name that cannot form a contract file name
    #[error("Invalid {role} name '{name}': {reason}")]
    InvalidParticipant {
        /// `consumer` or `provider`
        role: &'static str,
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Two interactions share a description
    #[error("Duplicate interaction description: {0}")]
    DuplicateInteraction(String),

    /// A matching rule cannot be evaluated or rendered
    #[error("Invalid matcher at {path}: {reason}")]
    InvalidMatcher {
        /// Location of the matcher inside the interaction
        path: String,
        /// Why the matcher is unusable
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for contract operations.
pub type PactResult<T> = Result<T, PactError>;

impl PactError {
    /// Create a malformed contract error.
    #[must_use]
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedContract {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid matcher error.
    #[must_use]
    pub fn invalid_matcher(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMatcher {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error means the contract could not be loaded at all.
    #[must_use]
    pub const fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedContract { .. } | Self::ContractNotFound(_) | Self::Serialization(_)
        )
    }
}
