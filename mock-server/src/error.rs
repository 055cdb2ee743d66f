//! Mock server error types using thiserror 2.0.

use contract_pact::PactError;
use thiserror::Error;

/// Errors that fail a consumer-side contract test.
#[derive(Error, Debug)]
pub enum MockServerError {
    /// Declared interactions never received a matching request
    #[error("Interaction(s) never requested: {}", .0.join(", "))]
    UnmatchedInteraction(Vec<String>),

    /// Requests arrived that matched no interaction
    #[error("Unexpected request(s): {}", .0.join(", "))]
    UnexpectedRequest(Vec<String>),

    /// The test body itself failed
    #[error("Consumer test failed: {0}")]
    TestBody(String),

    /// The listener could not be bound
    #[error("Failed to bind mock server: {0}")]
    Bind(#[source] std::io::Error),

    /// The server task ended abnormally
    #[error("Mock server stopped unexpectedly: {0}")]
    Server(String),

    /// Building or persisting the contract failed
    #[error(transparent)]
    Contract(#[from] PactError),
}

/// Result type for mock server operations.
pub type MockServerResult<T> = Result<T, MockServerError>;

impl MockServerError {
    /// Check if the error reports a contract violation by the consumer code.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::UnmatchedInteraction(_) | Self::UnexpectedRequest(_)
        )
    }
}
