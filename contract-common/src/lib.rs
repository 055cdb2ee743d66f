//! Shared plumbing for the contract testing crates.
//!
//! This crate provides centralized implementations for:
//! - A transport/serialization error type with failure classification
//! - HTTP client configuration and building
//! - Tracing subscriber initialization

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod tracing_config;

pub use error::CommonError;
pub use http::{HttpConfig, build_http_client};
pub use tracing_config::{TracingConfig, init_tracing, try_init_tracing};
