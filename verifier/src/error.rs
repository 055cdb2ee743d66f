//! Verifier and broker error types using thiserror 2.0.

use crate::config::ConfigError;
use contract_common::CommonError;
use contract_pact::{PactError, VerificationFailure};
use thiserror::Error;

/// Errors that stop a verification run.
#[derive(Error, Debug)]
pub enum VerifierError {
    /// The contract could not be loaded; nothing was replayed
    #[error("Failed to load contract: {0}")]
    ContractLoad(#[source] PactError),

    /// The contract could not be fetched from the broker
    #[error("Failed to fetch contract from broker: {0}")]
    ContractFetch(#[source] BrokerError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// HTTP client setup failed
    #[error("HTTP client error: {0}")]
    Client(#[from] CommonError),

    /// The run completed with failing interactions
    #[error("Verification failed:\n{0}")]
    VerificationFailed(#[from] VerificationFailure),
}

/// Result type for verifier operations.
pub type VerifierResult<T> = Result<T, VerifierError>;

/// Errors from broker calls.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Transport or status failure
    #[error(transparent)]
    Transport(#[from] CommonError),

    /// The broker document lacks the pact version link
    #[error("Broker response has no pb:pact-version link")]
    MissingPactVersion,

    /// The broker returned a contract that cannot be parsed
    #[error(transparent)]
    InvalidContract(#[from] PactError),

    /// A broker URL could not be built
    #[error("Invalid broker URL: {0}")]
    InvalidUrl(String),
}

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

impl BrokerError {
    /// Check if the broker could not be reached at all.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_network_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_contract_load_display() {
        let err = VerifierError::ContractLoad(PactError::ContractNotFound(PathBuf::from("pacts/a-b.json")));
        assert_eq!(
            err.to_string(),
            "Failed to load contract: Contract not found: pacts/a-b.json"
        );
    }

    #[test]
    fn test_broker_unreachable() {
        let err = BrokerError::Transport(CommonError::Unreachable("refused".to_string()));
        assert!(err.is_unreachable());
        assert!(!BrokerError::MissingPactVersion.is_unreachable());
        assert!(!BrokerError::Transport(CommonError::unexpected_status(404, "")).is_unreachable());
    }
}
