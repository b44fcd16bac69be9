//! An in-memory [`Environment`] for tests.
//!
//! [`MockEnvironment`] hands out numbered sockets, records every call made through it and
//! follows the same rules as a Linux socket where the endpoints depend on them: a socket is bound
//! at most once, a stream connects only to a listening address, and closing consumes the socket.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Error, ErrorKind};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Backlog, Domain, Environment, Protocol, ResourceId, Type};

/// First identifier handed out, after the standard streams.
const FIRST_ID: i32 = 3;

/// First port assigned to sockets bound to port `0`.
const FIRST_EPHEMERAL_PORT: u16 = 49152;

/// A socket owned by a [`MockEnvironment`] user.
#[derive(Debug, PartialEq, Eq)]
pub struct MockSocket {
    id: ResourceId,
}

impl MockSocket {
    /// Returns the identifier of this socket.
    pub fn id(&self) -> ResourceId {
        self.id
    }
}

/// A call made through a [`MockEnvironment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    /// A socket was allocated.
    Acquire(ResourceId, Type),
    /// A socket was bound.
    Bind(ResourceId, SocketAddrV4),
    /// A socket was connected.
    Connect(ResourceId, SocketAddrV4),
    /// A socket was marked passive.
    Listen(ResourceId, Backlog),
    /// A socket was closed.
    Close(ResourceId),
}

/// An operation a failure can be injected into, see [`MockEnvironment::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// [`Environment::acquire`].
    Acquire,
    /// [`Environment::bind`].
    Bind,
    /// [`Environment::connect`].
    Connect,
    /// [`Environment::listen`].
    Listen,
    /// [`Environment::close`].
    Close,
}

#[derive(Debug)]
struct SocketState {
    ty: Type,
    bound: Option<SocketAddrV4>,
    connected: Option<SocketAddrV4>,
    listening: Option<Backlog>,
}

#[derive(Debug)]
struct State {
    next_id: i32,
    next_port: u16,
    sockets: BTreeMap<ResourceId, SocketState>,
    peers: BTreeSet<SocketAddrV4>,
    failures: Vec<(Operation, ErrorKind)>,
    calls: Vec<Call>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            next_id: FIRST_ID,
            next_port: FIRST_EPHEMERAL_PORT,
            sockets: BTreeMap::new(),
            peers: BTreeSet::new(),
            failures: Vec::new(),
            calls: Vec::new(),
        }
    }
}

impl State {
    fn injected_failure(&mut self, operation: Operation) -> std::io::Result<()> {
        match self.failures.iter().position(|(failing, _)| *failing == operation) {
            Some(index) => Err(self.failures.remove(index).1.into()),
            None => Ok(()),
        }
    }

    fn socket(&mut self, resource: &MockSocket) -> std::io::Result<&mut SocketState> {
        self.sockets
            .get_mut(&resource.id)
            .ok_or_else(|| Error::from_raw_os_error(libc::EBADF))
    }

    fn ephemeral_port(&mut self) -> u16 {
        let port = self.next_port;
        self.next_port = self.next_port.wrapping_add(1).max(FIRST_EPHEMERAL_PORT);
        port
    }

    fn is_listening(&self, address: SocketAddrV4) -> bool {
        self.peers.contains(&address)
            || self.sockets.values().any(|socket| {
                socket.listening.is_some()
                    && socket
                        .bound
                        .is_some_and(|bound| overlaps(bound, address))
            })
    }
}

/// Returns whether two bound addresses collide, treating `0.0.0.0` as every address.
fn overlaps(a: SocketAddrV4, b: SocketAddrV4) -> bool {
    a.port() == b.port() && (a.ip() == b.ip() || a.ip().is_unspecified() || b.ip().is_unspecified())
}

/// An in-memory [`Environment`].
///
/// Clones share the same state, so a test keeps one clone to inspect what the code under test
/// did with the other.
#[derive(Debug, Clone, Default)]
pub struct MockEnvironment {
    state: Arc<Mutex<State>>,
}

impl MockEnvironment {
    /// Creates an environment without sockets.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("mock environment state poisoned")
    }

    /// Makes the next call of `operation` fail with `kind`.
    pub fn fail_next(&self, operation: Operation, kind: ErrorKind) {
        self.state().failures.push((operation, kind));
    }

    /// Registers a remote peer listening on `address`, so streams can connect to it.
    pub fn add_peer(&self, address: SocketAddrV4) {
        self.state().peers.insert(address);
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Returns the sockets that are allocated and not yet closed.
    pub fn open(&self) -> Vec<ResourceId> {
        self.state().sockets.keys().copied().collect()
    }

    /// Returns every close call made so far, in order.
    pub fn closed(&self) -> Vec<ResourceId> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Close(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Returns the backlog an open socket is listening with.
    pub fn backlog(&self, id: ResourceId) -> Option<Backlog> {
        self.state().sockets.get(&id)?.listening
    }

    /// Returns the remote address an open socket is connected to.
    pub fn peer(&self, id: ResourceId) -> Option<SocketAddrV4> {
        self.state().sockets.get(&id)?.connected
    }
}

impl Environment for MockEnvironment {
    type Resource = MockSocket;

    fn acquire(
        &self,
        domain: Domain,
        ty: Type,
        protocol: Option<Protocol>,
    ) -> std::io::Result<MockSocket> {
        let mut state = self.state();
        state.injected_failure(Operation::Acquire)?;

        let Domain::Ipv4 = domain;
        match (ty, protocol) {
            (_, None) | (Type::Stream, Some(Protocol::Tcp)) | (Type::Datagram, Some(Protocol::Udp)) => {}
            _ => return Err(Error::from_raw_os_error(libc::EPROTONOSUPPORT)),
        }

        let id = ResourceId::from_raw(state.next_id);
        state.next_id += 1;
        state.sockets.insert(
            id,
            SocketState {
                ty,
                bound: None,
                connected: None,
                listening: None,
            },
        );
        state.calls.push(Call::Acquire(id, ty));
        Ok(MockSocket { id })
    }

    fn bind(&self, resource: &MockSocket, address: SocketAddrV4) -> std::io::Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Bind(resource.id, address));
        state.injected_failure(Operation::Bind)?;

        let ty = state.socket(resource)?.ty;
        if state.socket(resource)?.bound.is_some() {
            return Err(Error::from_raw_os_error(libc::EINVAL));
        }

        let in_use = address.port() != 0
            && state.sockets.values().any(|socket| {
                socket.ty == ty && socket.bound.is_some_and(|bound| overlaps(bound, address))
            });
        if in_use {
            return Err(ErrorKind::AddrInUse.into());
        }

        let address = if address.port() == 0 {
            SocketAddrV4::new(*address.ip(), state.ephemeral_port())
        } else {
            address
        };
        state.socket(resource)?.bound = Some(address);
        Ok(())
    }

    fn connect(&self, resource: &MockSocket, address: SocketAddrV4) -> std::io::Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Connect(resource.id, address));
        state.injected_failure(Operation::Connect)?;

        let socket = state.socket(resource)?;
        if socket.ty == Type::Stream {
            if socket.connected.is_some() {
                return Err(Error::from_raw_os_error(libc::EISCONN));
            }
            if !state.is_listening(address) {
                return Err(ErrorKind::ConnectionRefused.into());
            }
        }

        let port = state.ephemeral_port();
        let socket = state.socket(resource)?;
        socket.bound.get_or_insert(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
        socket.connected = Some(address);
        Ok(())
    }

    fn listen(&self, resource: &MockSocket, backlog: Backlog) -> std::io::Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Listen(resource.id, backlog));
        state.injected_failure(Operation::Listen)?;

        let port = state.ephemeral_port();
        let socket = state.socket(resource)?;
        if socket.ty != Type::Stream {
            return Err(Error::from_raw_os_error(libc::EOPNOTSUPP));
        }
        socket
            .bound
            .get_or_insert(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        socket.listening = Some(backlog);
        Ok(())
    }

    fn local_address(&self, resource: &MockSocket) -> std::io::Result<SocketAddrV4> {
        let mut state = self.state();
        let socket = state.socket(resource)?;
        Ok(socket
            .bound
            .unwrap_or(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)))
    }

    fn close(&self, resource: MockSocket) -> std::io::Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Close(resource.id));
        // The socket is gone even if closing reports an error.
        let removed = state.sockets.remove(&resource.id);
        state.injected_failure(Operation::Close)?;
        match removed {
            Some(_) => Ok(()),
            None => Err(Error::from_raw_os_error(libc::EBADF)),
        }
    }

    fn id(&self, resource: &MockSocket) -> ResourceId {
        resource.id
    }
}
