//! Errors returned by endpoint operations.

use std::net::{AddrParseError, SocketAddrV4};

use crate::{Backlog, ResourceId};

/// A result with the [`Error`] error.
pub type Result<T> = core::result::Result<T, Error>;

/// An error that may happen while operating on an endpoint.
///
/// Every variant except [`Error::InvalidAddress`] wraps the cause reported by the
/// [`Environment`](crate::Environment).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The textual address is not a dotted-decimal IPv4 address.
    #[error("invalid IPv4 address {address:?}")]
    InvalidAddress {
        /// The rejected text.
        address: String,
        /// Why parsing failed.
        #[source]
        source: AddrParseError,
    },

    /// The environment could not allocate a socket.
    #[error("no socket available")]
    ResourceExhausted(#[source] std::io::Error),

    /// Binding the socket failed.
    #[error("failed to bind to {address}")]
    BindFailed {
        /// The address the socket was bound to.
        address: SocketAddrV4,
        /// The environment's cause.
        #[source]
        source: std::io::Error,
    },

    /// Connecting the socket failed.
    #[error("failed to connect to {address}")]
    ConnectFailed {
        /// The remote address.
        address: SocketAddrV4,
        /// The environment's cause.
        #[source]
        source: std::io::Error,
    },

    /// Marking the socket as passive failed.
    #[error("failed to listen with backlog {backlog}")]
    ListenFailed {
        /// The requested backlog.
        backlog: Backlog,
        /// The environment's cause.
        #[source]
        source: std::io::Error,
    },

    /// Closing the socket failed.
    #[error("failed to close socket {id}")]
    ReleaseFailed {
        /// The socket that failed to close. It is no longer owned by anyone.
        id: ResourceId,
        /// The environment's cause.
        #[source]
        source: std::io::Error,
    },

    /// Querying the socket's local address failed.
    #[error("failed to query local address")]
    AddressQueryFailed(#[source] std::io::Error),
}
