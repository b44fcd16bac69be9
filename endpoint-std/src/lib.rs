//! Std socket environment for endpoints.
//!
//! This provides the [`Environment`](endpoint_api::Environment) endpoints run on outside of tests,
//! using the platform's blocking BSD socket calls.

#![forbid(unsafe_code)]

mod environment;

pub use endpoint_api::{Error, Result};
pub use environment::SystemEnvironment;
