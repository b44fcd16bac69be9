//! The contract between endpoints and the operating system.
//!
//! To get started, see [`Environment`].

use std::fmt::{self, Debug, Display, Formatter};
use std::net::SocketAddrV4;

use serde::{Deserialize, Serialize};

/// Socket primitives an endpoint is built from.
///
/// Every call is blocking. An implementation owns no state for the sockets it hands out: each
/// [`Environment::Resource`] is owned by exactly one caller, and handing it back to
/// [`Environment::close`] consumes it, so a resource cannot be closed twice.
///
/// Implementations are cheap to clone, every endpoint keeps its own copy.
///
/// # Example
///
/// ```no_run
/// use endpoint_api::{Backlog, Domain, Environment, Protocol, Type};
/// use std::net::{Ipv4Addr, SocketAddrV4};
///
/// fn listen_on_loopback<E: Environment>(env: &E) -> std::io::Result<E::Resource> {
///     let resource = env.acquire(Domain::Ipv4, Type::Stream, Some(Protocol::Tcp))?;
///     env.bind(&resource, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))?;
///     env.listen(&resource, Backlog::MAX)?;
///     Ok(resource)
/// }
/// ```
pub trait Environment: Clone + Debug + Send + 'static {
    /// An owned socket.
    type Resource: Debug + Send + 'static;

    /// Allocates a new socket.
    fn acquire(
        &self,
        domain: Domain,
        ty: Type,
        protocol: Option<Protocol>,
    ) -> std::io::Result<Self::Resource>;

    /// Binds the socket to a local address.
    fn bind(&self, resource: &Self::Resource, address: SocketAddrV4) -> std::io::Result<()>;

    /// Connects the socket to a remote address.
    fn connect(&self, resource: &Self::Resource, address: SocketAddrV4) -> std::io::Result<()>;

    /// Marks a bound socket as passively accepting connections.
    fn listen(&self, resource: &Self::Resource, backlog: Backlog) -> std::io::Result<()>;

    /// Returns the local address the socket is bound to.
    fn local_address(&self, resource: &Self::Resource) -> std::io::Result<SocketAddrV4>;

    /// Closes the socket.
    ///
    /// The resource is gone afterwards, even if an error is returned.
    fn close(&self, resource: Self::Resource) -> std::io::Result<()>;

    /// Returns the numeric identifier of the socket.
    fn id(&self, resource: &Self::Resource) -> ResourceId;
}

/// The communication domain of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Domain {
    /// `AF_INET`.
    Ipv4,
}

/// The type of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// `SOCK_STREAM`.
    Stream,
    /// `SOCK_DGRAM`.
    Datagram,
}

/// The protocol of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// `IPPROTO_TCP`.
    Tcp,
    /// `IPPROTO_UDP`.
    Udp,
}

/// The numeric identifier of a socket, a file descriptor on Unix platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(i32);

impl ResourceId {
    /// Wraps a raw identifier.
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The maximum number of pending connections a listening socket queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Backlog(u32);

impl Backlog {
    /// The system-wide maximum, `SOMAXCONN`.
    pub const MAX: Self = Self(libc::SOMAXCONN as u32);

    /// Creates a backlog.
    ///
    /// Values above what the platform supports are clamped by the platform.
    pub const fn new(backlog: u32) -> Self {
        Self(backlog)
    }

    /// Returns the backlog.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the backlog as the `int` the platform's `listen` expects, saturating.
    pub fn as_raw(self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }
}

impl Default for Backlog {
    fn default() -> Self {
        Self::MAX
    }
}

impl Display for Backlog {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<u32> for Backlog {
    fn from(backlog: u32) -> Self {
        Self(backlog)
    }
}
