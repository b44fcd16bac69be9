//! The IPv4 address buffer stored by every endpoint.

use std::fmt::{self, Display, Formatter};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The address family recorded in an [`AddressBuffer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u16)]
pub enum AddressFamily {
    /// Nothing was ever stored.
    #[default]
    Unspecified = 0,

    /// IPv4.
    Inet = libc::AF_INET as u16,
}

/// The address an endpoint last bound or connected to.
///
/// The all-zero value, [`AddressBuffer::EMPTY`], means that no address was ever stored. Any
/// stored address carries [`AddressFamily::Inet`], so even `0.0.0.0:0` is not empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressBuffer {
    family: AddressFamily,
    port: u16,
    ip: Ipv4Addr,
}

impl AddressBuffer {
    /// The all-zero buffer.
    pub const EMPTY: Self = Self {
        family: AddressFamily::Unspecified,
        port: 0,
        ip: Ipv4Addr::UNSPECIFIED,
    };

    /// Returns whether this is the all-zero buffer.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Returns the address family.
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Returns the port in host byte order.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the numeric IPv4 address.
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Returns the stored socket address, or `None` for the empty buffer.
    pub fn socket_address(&self) -> Option<SocketAddrV4> {
        match self.family {
            AddressFamily::Unspecified => None,
            AddressFamily::Inet => Some(SocketAddrV4::new(self.ip, self.port)),
        }
    }
}

impl Default for AddressBuffer {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl From<SocketAddrV4> for AddressBuffer {
    fn from(address: SocketAddrV4) -> Self {
        Self {
            family: AddressFamily::Inet,
            port: address.port(),
            ip: *address.ip(),
        }
    }
}

impl Display for AddressBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.socket_address() {
            Some(address) => address.fmt(f),
            None => f.write_str("unset"),
        }
    }
}

/// Parses dotted-decimal IPv4 text and a port into a socket address.
///
/// Only the `a.b.c.d` form is accepted.
pub fn parse_ipv4(address: &str, port: u16) -> Result<SocketAddrV4> {
    let ip = Ipv4Addr::from_str(address).map_err(|source| Error::InvalidAddress {
        address: address.to_owned(),
        source,
    })?;
    Ok(SocketAddrV4::new(ip, port))
}
