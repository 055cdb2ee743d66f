//! Consumer-driven contract model and matching engine.
//!
//! Provides:
//! - Contract and interaction types with embedded matching rules
//! - Structural matching of observed requests/responses against expectations
//! - An atomic, file-backed contract store and contract locators
//! - Per-interaction verdicts and run aggregation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod contract;
pub mod error;
pub mod locator;
pub mod matcher;
pub mod matching;
pub mod store;
pub mod verification;

pub use contract::{
    Contract, ContractMetadata, Interaction, PactSpecification, Participant, Request, Response,
};
pub use error::{PactError, PactResult};
pub use locator::{AncestorSearch, ContractLocator, FixedPath, locate_contract};
pub use matcher::Matcher;
pub use matching::{
    Mismatch, MismatchKind, ObservedRequest, ObservedResponse, match_request, match_response,
    match_value, parse_body,
};
pub use store::ContractStore;
pub use verification::{FailureKind, VerificationFailure, VerificationRun, VerificationVerdict};
