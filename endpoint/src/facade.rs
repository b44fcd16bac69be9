//! The client and server facades and their reuse decision.
//!
//! Each facade slot holds at most one endpoint. Reconfiguring a slot with a new endpoint type
//! either carries the installed socket over or allocates a fresh one:
//!
//! - If the installed endpoint has a non-empty [`AddressBuffer`], it was configured with an
//!   address and its socket is detached and adopted by the new endpoint, unclosed.
//! - Otherwise, including an empty slot, the new endpoint allocates its own socket and the
//!   installed one is dropped, closing its socket.
//!
//! This only looks at the address buffer. A socket that was created but never configured reads as
//! empty and is replaced. A socket configured with `0.0.0.0:0` is not empty, since the buffer
//! records the address family, and is reused.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4};

use endpoint_api::{AddressBuffer, Backlog, Environment, Error, Result, parse_ipv4};

use crate::{Endpoint, EndpointKind, ServerConfig};

type Slot<E> = Option<Box<dyn Endpoint<E>>>;

/// Replaces the endpoint in `slot` with a `T` preloaded with `address`.
fn install<'a, E, T>(
    env: &E,
    slot: &'a mut Slot<E>,
    address: SocketAddrV4,
) -> Result<&'a mut dyn Endpoint<E>>
where
    E: Environment,
    T: EndpointKind<E>,
{
    let reused = slot
        .as_deref_mut()
        .filter(|current| !current.address().is_empty())
        .and_then(|current| {
            let previous = current.address();
            current.take_ownership().inspect(|resource| {
                tracing::debug!(id = %env.id(resource), %previous, %address, "reusing socket");
            })
        });

    let endpoint = match reused {
        Some(resource) => T::adopt(env.clone(), resource, address),
        None => {
            let endpoint = T::open(env.clone(), address)?;
            tracing::debug!(id = ?endpoint.resource_id(), %address, "allocated socket");
            endpoint
        }
    };

    Ok(slot.insert(Box::new(endpoint)).as_mut())
}

/// The target of a stored address, or an error for an endpoint that never had one.
fn stored_address<E: Environment>(endpoint: &dyn Endpoint<E>) -> std::io::Result<SocketAddrV4> {
    endpoint
        .address()
        .socket_address()
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "no address configured"))
}

/// Holds the active endpoint used for outbound connections.
///
/// # Example
///
/// ```no_run
/// use endpoint::{Client, SystemEnvironment, TcpEndpoint};
///
/// # fn main() -> endpoint::Result<()> {
/// let mut client = Client::new(SystemEnvironment::new());
/// client.connect::<TcpEndpoint<_>>("127.0.0.1", 9000)?;
/// assert_eq!(client.address().unwrap().to_string(), "127.0.0.1:9000");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client<E: Environment> {
    env: E,
    active: Slot<E>,
}

impl<E: Environment> Client<E> {
    /// Creates a client without an endpoint.
    pub fn new(env: E) -> Self {
        Self { env, active: None }
    }

    /// Installs `endpoint`, dropping the one installed before.
    pub fn instantiate<T: Endpoint<E> + 'static>(&mut self, endpoint: T) {
        self.active = Some(Box::new(endpoint));
    }

    /// Replaces the active endpoint with a `T` and connects it to `address`.
    ///
    /// See the [module documentation](self) for when the installed socket is reused. An invalid
    /// address leaves the installed endpoint untouched.
    pub fn connect<T: EndpointKind<E>>(&mut self, address: &str, port: u16) -> Result<()> {
        let address = parse_ipv4(address, port)?;
        install::<E, T>(&self.env, &mut self.active, address)?.connect_to(address)
    }

    /// Connects the installed endpoint to its stored address.
    ///
    /// # Panics
    ///
    /// If no endpoint is installed.
    pub fn reconnect(&mut self) -> Result<()> {
        let Some(endpoint) = self.active.as_deref_mut() else {
            panic!("no active endpoint installed");
        };
        let address = stored_address(endpoint).map_err(|source| Error::ConnectFailed {
            address: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
            source,
        })?;
        endpoint.connect_to(address)
    }

    /// Returns the address of the active endpoint, or `None` if none is installed.
    pub fn address(&self) -> Option<AddressBuffer> {
        self.active.as_ref().map(|endpoint| endpoint.address())
    }

    /// Returns the active endpoint.
    pub fn endpoint(&self) -> Option<&dyn Endpoint<E>> {
        self.active.as_deref()
    }

    /// Removes the active endpoint.
    pub fn uninstall(&mut self) -> Option<Box<dyn Endpoint<E>>> {
        self.active.take()
    }
}

/// Holds the passive endpoint used for listening, next to a [`Client`] for outbound connections.
///
/// The two slots are independent.
#[derive(Debug)]
pub struct Server<E: Environment> {
    client: Client<E>,
    passive: Slot<E>,
    backlog: Backlog,
}

impl<E: Environment> Server<E> {
    /// Creates a server without endpoints, listening with [`Backlog::MAX`].
    pub fn new(env: E) -> Self {
        Self::with_config(env, ServerConfig::default())
    }

    /// Creates a server without endpoints.
    pub fn with_config(env: E, config: ServerConfig) -> Self {
        Self {
            client: Client::new(env),
            passive: None,
            backlog: config.backlog,
        }
    }

    /// Installs `endpoint` as the passive endpoint, dropping the one installed before.
    pub fn instantiate<T: Endpoint<E> + 'static>(&mut self, endpoint: T) {
        self.passive = Some(Box::new(endpoint));
    }

    /// Replaces the passive endpoint with a `T`, binds it to `address` and listens.
    ///
    /// See the [module documentation](self) for when the installed socket is reused. An invalid
    /// address leaves the installed endpoint untouched.
    pub fn bind<T: EndpointKind<E>>(&mut self, address: &str, port: u16) -> Result<()> {
        let address = parse_ipv4(address, port)?;
        let endpoint = install::<E, T>(&self.client.env, &mut self.passive, address)?;
        endpoint.bind_to(address)?;
        endpoint.listen(self.backlog)
    }

    /// Binds the installed passive endpoint to its stored address and listens.
    ///
    /// # Panics
    ///
    /// If no passive endpoint is installed.
    pub fn rebind(&mut self) -> Result<()> {
        let Some(endpoint) = self.passive.as_deref_mut() else {
            panic!("no passive endpoint installed");
        };
        let address = stored_address(endpoint).map_err(|source| Error::BindFailed {
            address: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
            source,
        })?;
        endpoint.bind_to(address)?;
        endpoint.listen(self.backlog)
    }

    /// Returns the address of the passive endpoint, or `None` if none is installed.
    pub fn address(&self) -> Option<AddressBuffer> {
        self.passive.as_ref().map(|endpoint| endpoint.address())
    }

    /// Returns the passive endpoint.
    pub fn endpoint(&self) -> Option<&dyn Endpoint<E>> {
        self.passive.as_deref()
    }

    /// Removes the passive endpoint.
    pub fn uninstall(&mut self) -> Option<Box<dyn Endpoint<E>>> {
        self.passive.take()
    }

    /// Returns the backlog used by the next bind.
    pub fn backlog(&self) -> Backlog {
        self.backlog
    }

    /// Sets the backlog used by the next bind.
    pub fn set_backlog(&mut self, backlog: Backlog) {
        self.backlog = backlog;
    }

    /// Returns the client holding the active endpoint.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// Returns the client holding the active endpoint.
    pub fn client_mut(&mut self) -> &mut Client<E> {
        &mut self.client
    }
}
