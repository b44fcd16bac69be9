//! Socket endpoints with explicit ownership transfer.
//!
//! A [`Handle`] owns one socket and closes it exactly once. An [`Endpoint`] adds the address the
//! socket was configured with, [`TcpEndpoint`] and [`UdpEndpoint`] are the IPv4 kinds. The
//! [`Client`] and [`Server`] facades hold one endpoint per slot and, when reconfigured with a new
//! endpoint type, decide whether the installed socket is carried over or a new one is allocated.
//!
//! Everything is generic over the [`Environment`] the sockets come from. With the default `std`
//! feature, [`SystemEnvironment`] provides real sockets and [`global`] holds process-wide
//! facades.
//!
//! # Features
//!
//! - `std`: The operating system environment and the process-wide facades. Default: enabled.

#![forbid(unsafe_code)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod config;
mod endpoint;
mod facade;
#[cfg(feature = "std")]
pub mod global;
mod handle;

pub use config::ServerConfig;
pub use endpoint::{
    Datagram, Endpoint, EndpointKind, Ipv4Endpoint, SocketKind, Stream, TcpEndpoint, UdpEndpoint,
};
pub use facade::{Client, Server};
pub use handle::Handle;

#[doc(inline)]
pub use endpoint_api::{
    AddressBuffer, AddressFamily, Backlog, Domain, Environment, Error, Protocol, ResourceId,
    Result, Type, parse_ipv4,
};
#[doc(inline)]
#[cfg(feature = "std")]
pub use endpoint_std::SystemEnvironment;
