//! Process-wide facades on the [`SystemEnvironment`].
//!
//! The facades are created on first access. Their mutexes serialize reconfiguration, which is not
//! atomic otherwise. They are never dropped, the operating system closes their sockets at exit.

use std::sync::{LazyLock, Mutex};

use endpoint_std::SystemEnvironment;

use crate::{Client, Server};

static CLIENT: LazyLock<Mutex<Client<SystemEnvironment>>> =
    LazyLock::new(|| Mutex::new(Client::new(SystemEnvironment::new())));

static SERVER: LazyLock<Mutex<Server<SystemEnvironment>>> =
    LazyLock::new(|| Mutex::new(Server::new(SystemEnvironment::new())));

/// Returns the process-wide client.
pub fn client() -> &'static Mutex<Client<SystemEnvironment>> {
    &CLIENT
}

/// Returns the process-wide server.
pub fn server() -> &'static Mutex<Server<SystemEnvironment>> {
    &SERVER
}
