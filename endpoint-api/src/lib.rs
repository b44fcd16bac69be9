//! The endpoint environment contract.
//!
//! Everything an endpoint needs from the operating system goes through [`Environment`]. The
//! types shared between the environment, the endpoints and the facades live here as well.

#![forbid(unsafe_code)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod address;
mod environment;
mod error;
#[cfg(any(test, feature = "test-suites"))]
pub mod mock;

pub use address::{AddressBuffer, AddressFamily, parse_ipv4};
pub use environment::{Backlog, Domain, Environment, Protocol, ResourceId, Type};
pub use error::{Error, Result};

#[doc(hidden)]
#[cfg(any(test, feature = "test-suites"))]
pub mod test_suite;
