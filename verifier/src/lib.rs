//! Provider-side contract verification.
//!
//! Provides:
//! - Replay of contract interactions against a running provider
//! - Provider state dispatch (provider side) and setup calls (verifier side)
//! - Pact Broker retrieval and best-effort result publishing
//! - Environment-driven configuration

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broker;
pub mod config;
pub mod error;
pub mod provider_state;
pub mod verifier;

pub use broker::{BrokerClient, LatestPact, PublishReport, StepOutcome, publish_best_effort};
pub use config::{
    BrokerAuth, BrokerConfig, ConfigError, VerifierConfig, default_provider_version,
    tracing_config_from_lookup,
};
pub use error::{BrokerError, BrokerResult, VerifierError, VerifierResult};
pub use provider_state::{
    PROVIDER_STATES_PATH, ProviderStateClient, ProviderStateDispatcher, ProviderStateRequest,
    StateFuture, StateOutcome,
};
pub use verifier::{ContractSource, VerificationPhase, Verifier};
