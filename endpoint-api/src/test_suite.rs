#![expect(missing_docs, reason = "tests")]
#![cfg_attr(coverage_nightly, coverage(off))]
//! Test suite for [`Environment`] implementations.
//!
//! Every test binds its own port `0` listener, so the tests can run concurrently against a real
//! network stack.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4};

use crate::{Backlog, Domain, Environment, Protocol, Type};

fn stream<E: Environment>(env: &E) -> E::Resource {
    env.acquire(Domain::Ipv4, Type::Stream, Some(Protocol::Tcp))
        .unwrap()
}

pub fn test_acquire_close<E: Environment>(env: E) {
    let first = stream(&env);
    let second = env
        .acquire(Domain::Ipv4, Type::Datagram, Some(Protocol::Udp))
        .unwrap();

    assert!(env.id(&first).as_raw() >= 0);
    assert_ne!(env.id(&first), env.id(&second));

    env.close(first).unwrap();
    env.close(second).unwrap();
}

pub fn test_bind_assigns_port<E: Environment>(env: E, ip_address: &str) {
    let ip_address: Ipv4Addr = ip_address.parse().unwrap();
    let socket = stream(&env);

    assert_eq!(
        env.local_address(&socket).unwrap(),
        SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)
    );

    env.bind(&socket, SocketAddrV4::new(ip_address, 0)).unwrap();
    let local = env.local_address(&socket).unwrap();
    assert_eq!(*local.ip(), ip_address);
    assert_ne!(local.port(), 0);

    env.close(socket).unwrap();
}

pub fn test_bind_twice<E: Environment>(env: E, ip_address: &str) {
    let ip_address: Ipv4Addr = ip_address.parse().unwrap();
    let socket = stream(&env);

    env.bind(&socket, SocketAddrV4::new(ip_address, 0)).unwrap();
    assert!(env.bind(&socket, SocketAddrV4::new(ip_address, 0)).is_err());

    env.close(socket).unwrap();
}

pub fn test_address_in_use<E: Environment>(env: E, ip_address: &str) {
    let ip_address: Ipv4Addr = ip_address.parse().unwrap();
    let first = stream(&env);
    let second = stream(&env);

    env.bind(&first, SocketAddrV4::new(ip_address, 0)).unwrap();
    env.listen(&first, Backlog::MAX).unwrap();
    let address = env.local_address(&first).unwrap();

    assert_eq!(
        env.bind(&second, address).unwrap_err().kind(),
        ErrorKind::AddrInUse
    );

    env.close(first).unwrap();
    env.close(second).unwrap();
}

pub fn test_listen_connect<E: Environment>(env: E, ip_address: &str) {
    let ip_address: Ipv4Addr = ip_address.parse().unwrap();
    let server = stream(&env);
    let client = stream(&env);

    env.bind(&server, SocketAddrV4::new(ip_address, 0)).unwrap();
    env.listen(&server, Backlog::new(1)).unwrap();
    let address = env.local_address(&server).unwrap();

    env.connect(&client, address).unwrap();
    let local = env.local_address(&client).unwrap();
    assert_ne!(local.port(), 0);
    assert_ne!(local.port(), address.port());

    env.close(client).unwrap();
    env.close(server).unwrap();
}

pub fn test_connect_refused<E: Environment>(env: E, ip_address: &str) {
    let ip_address: Ipv4Addr = ip_address.parse().unwrap();

    // Reserve a port nobody listens on.
    let reserved = stream(&env);
    env.bind(&reserved, SocketAddrV4::new(ip_address, 0)).unwrap();
    let address = env.local_address(&reserved).unwrap();

    let client = stream(&env);
    assert_eq!(
        env.connect(&client, address).unwrap_err().kind(),
        ErrorKind::ConnectionRefused
    );

    env.close(client).unwrap();
    env.close(reserved).unwrap();
}

pub fn test_datagram_cannot_listen<E: Environment>(env: E, ip_address: &str) {
    let ip_address: Ipv4Addr = ip_address.parse().unwrap();
    let socket = env
        .acquire(Domain::Ipv4, Type::Datagram, Some(Protocol::Udp))
        .unwrap();

    env.bind(&socket, SocketAddrV4::new(ip_address, 0)).unwrap();
    assert!(env.listen(&socket, Backlog::MAX).is_err());

    env.close(socket).unwrap();
}

pub fn run_all<E: Environment>(env: E, ip_address: &str) {
    test_acquire_close(env.clone());
    test_bind_assigns_port(env.clone(), ip_address);
    test_bind_twice(env.clone(), ip_address);
    test_address_in_use(env.clone(), ip_address);
    test_listen_connect(env.clone(), ip_address);
    test_connect_refused(env.clone(), ip_address);
    test_datagram_cannot_listen(env, ip_address);
}
