//! Consumer-side mock server for contract tests.
//!
//! Provides:
//! - A fluent builder declaring expected interactions
//! - A local HTTP server that answers from those interactions
//! - Recording of exercised interactions into the contract store

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod server;

pub use builder::{MockServerContext, PactBuilder, PactConfig, RequestBuilder, ResponseBuilder};
pub use error::{MockServerError, MockServerResult};
pub use server::{MockServer, MockServerReport, UnexpectedRequest};
