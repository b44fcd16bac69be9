//! IPv4 endpoints built on a [`Handle`].
//!
//! [`Endpoint`] is the capability the facades drive, [`EndpointKind`] adds the constructors the
//! reuse algorithm needs. [`TcpEndpoint`] and [`UdpEndpoint`] are the concrete types.

use std::fmt::{self, Debug, Formatter};
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::net::SocketAddrV4;

use endpoint_api::{
    AddressBuffer, Backlog, Domain, Environment, Error, Protocol, ResourceId, Result, Type,
    parse_ipv4,
};

use crate::Handle;

/// A socket together with the address it was configured with.
///
/// # Example
///
/// ```no_run
/// use endpoint::{Endpoint, SystemEnvironment, TcpEndpoint};
///
/// # fn main() -> endpoint::Result<()> {
/// let mut endpoint = TcpEndpoint::new(SystemEnvironment::new());
/// endpoint.create()?;
/// endpoint.bind("127.0.0.1", 8080)?;
/// endpoint.listen(Default::default())?;
/// assert_eq!(endpoint.address().to_string(), "127.0.0.1:8080");
/// # Ok(())
/// # }
/// ```
pub trait Endpoint<E: Environment>: Debug + Send {
    /// Allocates the socket for this kind of endpoint, closing the one owned before.
    fn create(&mut self) -> Result<()>;

    /// Binds the socket and stores `address` on success.
    fn bind_to(&mut self, address: SocketAddrV4) -> Result<()>;

    /// Connects the socket and stores `address` on success.
    fn connect_to(&mut self, address: SocketAddrV4) -> Result<()>;

    /// Marks the bound socket as passively accepting connections.
    fn listen(&self, backlog: Backlog) -> Result<()>;

    /// Returns the stored address, empty if none was ever stored.
    fn address(&self) -> AddressBuffer;

    /// Returns the address the socket is actually bound to.
    fn local_address(&self) -> Result<SocketAddrV4>;

    /// Returns the identifier of the owned socket.
    fn resource_id(&self) -> Option<ResourceId>;

    /// Detaches the owned socket without closing it.
    fn take_ownership(&mut self) -> Option<E::Resource>;

    /// Parses `address` and binds to it, see [`Endpoint::bind_to`].
    fn bind(&mut self, address: &str, port: u16) -> Result<()> {
        self.bind_to(parse_ipv4(address, port)?)
    }

    /// Parses `address` and connects to it, see [`Endpoint::connect_to`].
    fn connect(&mut self, address: &str, port: u16) -> Result<()> {
        self.connect_to(parse_ipv4(address, port)?)
    }
}

/// An [`Endpoint`] the facades can construct.
pub trait EndpointKind<E: Environment>: Endpoint<E> + Sized + 'static {
    /// Allocates a fresh socket preloaded with `address`.
    fn open(env: E, address: SocketAddrV4) -> Result<Self>;

    /// Takes over an already allocated socket preloaded with `address`.
    fn adopt(env: E, resource: E::Resource, address: SocketAddrV4) -> Self;
}

/// The socket type and protocol of an [`Ipv4Endpoint`].
pub trait SocketKind: 'static {
    /// Socket type passed to [`Environment::acquire`].
    const TYPE: Type;

    /// Protocol passed to [`Environment::acquire`].
    const PROTOCOL: Protocol;
}

/// TCP streams.
#[derive(Debug)]
pub enum Stream {}

impl SocketKind for Stream {
    const TYPE: Type = Type::Stream;
    const PROTOCOL: Protocol = Protocol::Tcp;
}

/// UDP datagrams.
#[derive(Debug)]
pub enum Datagram {}

impl SocketKind for Datagram {
    const TYPE: Type = Type::Datagram;
    const PROTOCOL: Protocol = Protocol::Udp;
}

/// An IPv4 TCP endpoint.
pub type TcpEndpoint<E> = Ipv4Endpoint<E, Stream>;

/// An IPv4 UDP endpoint.
pub type UdpEndpoint<E> = Ipv4Endpoint<E, Datagram>;

/// An IPv4 endpoint of socket kind `K`.
pub struct Ipv4Endpoint<E: Environment, K> {
    handle: Handle<E>,
    address: AddressBuffer,
    kind: PhantomData<fn() -> K>,
}

impl<E: Environment, K: SocketKind> Ipv4Endpoint<E, K> {
    /// Creates an endpoint without a socket or address.
    ///
    /// Call [`Endpoint::create`] before binding or connecting.
    pub fn new(env: E) -> Self {
        Self {
            handle: Handle::new(env),
            address: AddressBuffer::EMPTY,
            kind: PhantomData,
        }
    }

    /// Allocates a socket preloaded with the textual `address`.
    ///
    /// The address is validated first, nothing is allocated if it is invalid.
    pub fn with_address(env: E, address: &str, port: u16) -> Result<Self> {
        let address = parse_ipv4(address, port)?;
        <Self as EndpointKind<E>>::open(env, address)
    }

    /// Takes over `resource`, preloaded with the textual `address`.
    ///
    /// If the address is invalid, `resource` is closed before the error is returned.
    pub fn adopted(env: E, resource: E::Resource, address: &str, port: u16) -> Result<Self> {
        let handle = Handle::adopt(env, resource);
        let address = parse_ipv4(address, port)?;
        Ok(Self {
            handle,
            address: address.into(),
            kind: PhantomData,
        })
    }

    /// Returns the handle owning the socket.
    pub fn handle(&self) -> &Handle<E> {
        &self.handle
    }

    /// Moves socket and address into a new endpoint, leaving this one unowned and empty.
    pub fn take(&mut self) -> Self {
        Self {
            handle: self.handle.take(),
            address: std::mem::take(&mut self.address),
            kind: PhantomData,
        }
    }

    fn resource(&self) -> std::io::Result<&E::Resource> {
        self.handle.resource().ok_or_else(|| {
            std::io::Error::new(ErrorKind::InvalidInput, "endpoint does not own a socket")
        })
    }
}

impl<E: Environment, K: SocketKind> Endpoint<E> for Ipv4Endpoint<E, K> {
    fn create(&mut self) -> Result<()> {
        self.handle
            .acquire(Domain::Ipv4, K::TYPE, Some(K::PROTOCOL))
    }

    fn bind_to(&mut self, address: SocketAddrV4) -> Result<()> {
        self.resource()
            .and_then(|resource| self.handle.environment().bind(resource, address))
            .map_err(|source| Error::BindFailed { address, source })?;
        tracing::debug!(id = ?self.handle.id(), %address, "bound");

        self.address = address.into();
        Ok(())
    }

    fn connect_to(&mut self, address: SocketAddrV4) -> Result<()> {
        self.resource()
            .and_then(|resource| self.handle.environment().connect(resource, address))
            .map_err(|source| Error::ConnectFailed { address, source })?;
        tracing::debug!(id = ?self.handle.id(), %address, "connected");

        self.address = address.into();
        Ok(())
    }

    fn listen(&self, backlog: Backlog) -> Result<()> {
        self.resource()
            .and_then(|resource| self.handle.environment().listen(resource, backlog))
            .map_err(|source| Error::ListenFailed { backlog, source })?;
        tracing::debug!(id = ?self.handle.id(), %backlog, "listening");
        Ok(())
    }

    fn address(&self) -> AddressBuffer {
        self.address
    }

    fn local_address(&self) -> Result<SocketAddrV4> {
        self.resource()
            .and_then(|resource| self.handle.environment().local_address(resource))
            .map_err(Error::AddressQueryFailed)
    }

    fn resource_id(&self) -> Option<ResourceId> {
        self.handle.id()
    }

    fn take_ownership(&mut self) -> Option<E::Resource> {
        self.handle.take_ownership()
    }
}

impl<E: Environment, K: SocketKind> EndpointKind<E> for Ipv4Endpoint<E, K> {
    fn open(env: E, address: SocketAddrV4) -> Result<Self> {
        let mut endpoint = Self::new(env);
        endpoint.create()?;
        endpoint.address = address.into();
        Ok(endpoint)
    }

    fn adopt(env: E, resource: E::Resource, address: SocketAddrV4) -> Self {
        Self {
            handle: Handle::adopt(env, resource),
            address: address.into(),
            kind: PhantomData,
        }
    }
}

impl<E: Environment, K: SocketKind> Debug for Ipv4Endpoint<E, K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ipv4Endpoint")
            .field("type", &K::TYPE)
            .field("id", &self.handle.id())
            .field("address", &self.address)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io::ErrorKind;
    use std::net::{Ipv4Addr, SocketAddrV4};

    use endpoint_api::mock::{Call, MockEnvironment, Operation};
    use endpoint_api::{AddressBuffer, AddressFamily, Backlog, Domain, Environment, Error, Type};
    use pretty_assertions::assert_eq;

    use super::{Endpoint, EndpointKind, TcpEndpoint, UdpEndpoint};

    #[test]
    fn fresh_endpoint_is_empty() {
        let env = MockEnvironment::new();
        let endpoint = TcpEndpoint::new(env.clone());

        assert_eq!(endpoint.resource_id(), None);
        assert!(endpoint.address().is_empty());
        assert_eq!(env.calls(), []);
    }

    #[test]
    fn create_allocates_tcp_stream() {
        let env = MockEnvironment::new();
        let mut endpoint = TcpEndpoint::new(env.clone());
        endpoint.create().unwrap();

        let id = endpoint.resource_id().unwrap();
        assert_eq!(env.calls(), [Call::Acquire(id, Type::Stream)]);
        // Creating does not configure an address.
        assert!(endpoint.address().is_empty());
    }

    #[test]
    fn bind_round_trips_address() {
        let env = MockEnvironment::new();
        let mut endpoint = TcpEndpoint::new(env);
        endpoint.create().unwrap();
        endpoint.bind("127.0.0.1", 8080).unwrap();

        let address = endpoint.address();
        assert_eq!(address.family(), AddressFamily::Inet);
        assert_eq!(address.port(), 8080);
        assert_eq!(address.ip(), Ipv4Addr::new(127, 0, 0, 1));
    }

    #[test]
    fn connect_round_trips_address() {
        let env = MockEnvironment::new();
        let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8080);
        env.add_peer(target);

        let mut endpoint = TcpEndpoint::new(env.clone());
        endpoint.create().unwrap();
        endpoint.connect("127.0.0.1", 8080).unwrap();

        assert_eq!(endpoint.address(), AddressBuffer::from(target));
        assert_eq!(env.peer(endpoint.resource_id().unwrap()), Some(target));
    }

    #[test]
    fn invalid_address_allocates_nothing() {
        let env = MockEnvironment::new();

        for text in ["999.999.999.999", "not-an-ip"] {
            let error = TcpEndpoint::with_address(env.clone(), text, 80).unwrap_err();
            assert!(matches!(error, Error::InvalidAddress { .. }));
        }
        assert_eq!(env.calls(), []);
    }

    #[test]
    fn invalid_address_on_bind_keeps_state() {
        let env = MockEnvironment::new();
        let mut endpoint = TcpEndpoint::new(env.clone());
        endpoint.create().unwrap();

        assert!(matches!(
            endpoint.bind("not-an-ip", 80),
            Err(Error::InvalidAddress { .. })
        ));
        assert!(endpoint.address().is_empty());
        assert_eq!(env.calls().len(), 1);
    }

    #[test]
    fn adopted_with_invalid_address_closes_resource() {
        let env = MockEnvironment::new();
        let resource = env.acquire(Domain::Ipv4, Type::Stream, None).unwrap();
        let id = resource.id();

        let error = TcpEndpoint::adopted(env.clone(), resource, "999.999.999.999", 80).unwrap_err();
        assert!(matches!(error, Error::InvalidAddress { .. }));
        assert_eq!(env.closed(), [id]);
        assert_eq!(env.open(), []);
    }

    #[test]
    fn adopted_endpoint_skips_create() {
        let env = MockEnvironment::new();
        let resource = env.acquire(Domain::Ipv4, Type::Stream, None).unwrap();
        let id = resource.id();

        let mut endpoint = TcpEndpoint::adopted(env.clone(), resource, "10.0.0.1", 1).unwrap();
        assert_eq!(endpoint.resource_id(), Some(id));
        assert_eq!(endpoint.address().to_string(), "10.0.0.1:1");

        // Binding overwrites the preloaded address.
        endpoint.bind("127.0.0.1", 8080).unwrap();
        assert_eq!(endpoint.address().to_string(), "127.0.0.1:8080");
        assert_eq!(
            env.calls(),
            [
                Call::Acquire(id, Type::Stream),
                Call::Bind(id, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8080)),
            ]
        );
    }

    #[test]
    fn open_preloads_address() {
        let env = MockEnvironment::new();
        let endpoint = TcpEndpoint::with_address(env.clone(), "127.0.0.1", 9000).unwrap();

        assert!(endpoint.resource_id().is_some());
        assert_eq!(endpoint.address().to_string(), "127.0.0.1:9000");
        // Only allocated, not bound yet.
        assert_eq!(env.calls().len(), 1);
    }

    #[test]
    fn take_transfers_socket_and_address() {
        let env = MockEnvironment::new();
        let mut source = TcpEndpoint::with_address(env.clone(), "127.0.0.1", 9000).unwrap();
        let id = source.resource_id().unwrap();

        let destination = source.take();
        assert_eq!(source.resource_id(), None);
        assert!(source.address().is_empty());
        assert_eq!(destination.resource_id(), Some(id));
        assert_eq!(destination.address().to_string(), "127.0.0.1:9000");

        drop(source);
        assert_eq!(env.closed(), []);
        drop(destination);
        assert_eq!(env.closed(), [id]);
    }

    #[test]
    fn operations_without_socket_fail() {
        let env = MockEnvironment::new();
        let mut endpoint = TcpEndpoint::new(env.clone());

        let error = endpoint.bind("127.0.0.1", 80).unwrap_err();
        assert!(
            matches!(error, Error::BindFailed { ref source, .. } if source.kind() == ErrorKind::InvalidInput)
        );
        assert!(matches!(
            endpoint.connect("127.0.0.1", 80),
            Err(Error::ConnectFailed { .. })
        ));
        assert!(matches!(
            endpoint.listen(Backlog::MAX),
            Err(Error::ListenFailed { .. })
        ));
        assert!(matches!(
            endpoint.local_address(),
            Err(Error::AddressQueryFailed(_))
        ));
        assert!(endpoint.address().is_empty());
        assert_eq!(env.calls(), []);
    }

    #[test]
    fn failed_bind_keeps_previous_address() {
        let env = MockEnvironment::new();
        let mut endpoint = TcpEndpoint::with_address(env.clone(), "127.0.0.1", 9000).unwrap();
        env.fail_next(Operation::Bind, ErrorKind::PermissionDenied);

        let error = endpoint.bind("127.0.0.1", 80).unwrap_err();
        assert!(
            matches!(error, Error::BindFailed { address, ref source } if address.port() == 80 && source.kind() == ErrorKind::PermissionDenied)
        );
        assert_eq!(endpoint.address().to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn local_address_resolves_port_zero() {
        let env = MockEnvironment::new();
        let mut endpoint = TcpEndpoint::new(env);
        endpoint.create().unwrap();
        endpoint.bind("127.0.0.1", 0).unwrap();

        assert_eq!(endpoint.address().port(), 0);
        assert_ne!(endpoint.local_address().unwrap().port(), 0);
    }

    #[test]
    fn udp_endpoint_cannot_listen() {
        let env = MockEnvironment::new();
        let mut endpoint = UdpEndpoint::new(env.clone());
        endpoint.create().unwrap();
        endpoint.bind("127.0.0.1", 0).unwrap();

        let id = endpoint.resource_id().unwrap();
        assert_eq!(env.calls()[0], Call::Acquire(id, Type::Datagram));
        assert!(matches!(
            endpoint.listen(Backlog::MAX),
            Err(Error::ListenFailed { backlog: Backlog::MAX, .. })
        ));
    }

    #[test]
    fn open_failure_is_resource_exhausted() {
        let env = MockEnvironment::new();
        env.fail_next(Operation::Acquire, ErrorKind::OutOfMemory);

        let error = <TcpEndpoint<_> as EndpointKind<_>>::open(
            env.clone(),
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, 80),
        )
        .unwrap_err();
        assert!(matches!(error, Error::ResourceExhausted(_)));
        assert_eq!(env.open(), []);
    }
}
