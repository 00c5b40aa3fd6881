//! Shared test material for the Portico workspace.
//!
//! This crate provides:
//! - the address-book fixture schema and sample data every scenario
//!   test runs on ([`fixtures`])
//! - `proptest` strategies and reference implementations ([`generators`])
//!
//! The cross-crate scenario tests themselves live in this crate's
//! `tests/` directory; the fixtures are public so demos can reuse them.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;
