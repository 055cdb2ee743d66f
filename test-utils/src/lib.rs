//! Shared test utilities for the contract testing crates.
//!
//! This crate provides:
//! - Proptest strategies for contracts, interactions and matchers
//! - Fixtures for the BulkUsers sample contract
//! - A runnable sample provider with provider state support

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
