//! Socket environment implementation for the std platform.

use std::io::ErrorKind;
use std::net::SocketAddrV4;
use std::os::fd::AsRawFd;

use endpoint_api::{Backlog, Domain, Environment, Protocol, ResourceId, Type};
use socket2::{SockAddr, Socket};

/// Implements the [`Environment`] trait with the operating system's sockets.
///
/// Resources are [`socket2::Socket`]s. A socket that is dropped without going through
/// [`Environment::close`] is still closed, but any error from closing it is lost.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl SystemEnvironment {
    /// Creates a new `SystemEnvironment`.
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnvironment {
    type Resource = Socket;

    fn acquire(
        &self,
        domain: Domain,
        ty: Type,
        protocol: Option<Protocol>,
    ) -> std::io::Result<Socket> {
        let domain = match domain {
            Domain::Ipv4 => socket2::Domain::IPV4,
            _ => return Err(std::io::Error::from_raw_os_error(libc::EAFNOSUPPORT)),
        };
        let ty = match ty {
            Type::Stream => socket2::Type::STREAM,
            Type::Datagram => socket2::Type::DGRAM,
        };
        let protocol = protocol.map(|protocol| match protocol {
            Protocol::Tcp => socket2::Protocol::TCP,
            Protocol::Udp => socket2::Protocol::UDP,
        });

        Socket::new(domain, ty, protocol)
    }

    fn bind(&self, resource: &Socket, address: SocketAddrV4) -> std::io::Result<()> {
        resource.bind(&SockAddr::from(address))
    }

    fn connect(&self, resource: &Socket, address: SocketAddrV4) -> std::io::Result<()> {
        resource.connect(&SockAddr::from(address))
    }

    fn listen(&self, resource: &Socket, backlog: Backlog) -> std::io::Result<()> {
        resource.listen(backlog.as_raw())
    }

    fn local_address(&self, resource: &Socket) -> std::io::Result<SocketAddrV4> {
        resource.local_addr()?.as_socket_ipv4().ok_or_else(|| {
            std::io::Error::new(ErrorKind::InvalidData, "socket is not bound to an IPv4 address")
        })
    }

    fn close(&self, resource: Socket) -> std::io::Result<()> {
        // Dropping the socket would discard the error from `close(2)`.
        nix::unistd::close(resource).map_err(std::io::Error::from)
    }

    fn id(&self, resource: &Socket) -> ResourceId {
        ResourceId::from_raw(resource.as_raw_fd())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};

    use endpoint_api::{Domain, Environment, Protocol, Type};

    use super::SystemEnvironment;

    #[test]
    fn resources_are_ipv4_sockets_of_the_requested_type() {
        let env = SystemEnvironment::new();
        let stream = env
            .acquire(Domain::Ipv4, Type::Stream, Some(Protocol::Tcp))
            .unwrap();
        let datagram = env.acquire(Domain::Ipv4, Type::Datagram, None).unwrap();

        assert_eq!(stream.r#type().unwrap(), socket2::Type::STREAM);
        assert_eq!(datagram.r#type().unwrap(), socket2::Type::DGRAM);
        assert_eq!(stream.domain().unwrap(), socket2::Domain::IPV4);

        env.close(stream).unwrap();
        env.close(datagram).unwrap();
    }

    #[test]
    fn id_is_the_file_descriptor() {
        let env = SystemEnvironment::new();
        let socket = env.acquire(Domain::Ipv4, Type::Stream, None).unwrap();
        let id = env.id(&socket);

        env.bind(&socket, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))
            .unwrap();
        assert_eq!(id.as_raw(), std::os::fd::AsRawFd::as_raw_fd(&socket));

        env.close(socket).unwrap();
    }

    #[test]
    fn close_frees_the_bound_address() {
        let env = SystemEnvironment::new();
        let first = env
            .acquire(Domain::Ipv4, Type::Datagram, Some(Protocol::Udp))
            .unwrap();
        env.bind(&first, SocketAddrV4::new(Ipv4Addr::new(127, 5, 1, 1), 0))
            .unwrap();
        let address = env.local_address(&first).unwrap();

        let second = env
            .acquire(Domain::Ipv4, Type::Datagram, Some(Protocol::Udp))
            .unwrap();
        let error = env.bind(&second, address).unwrap_err();
        assert_eq!(error.kind(), std::io::ErrorKind::AddrInUse);

        env.close(first).unwrap();
        env.bind(&second, address).unwrap();
        env.close(second).unwrap();
    }
}
