//! Server configuration.

use endpoint_api::Backlog;
use serde::{Deserialize, Serialize};

/// Settings of a [`Server`](crate::Server).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// The backlog passed to `listen` after every bind.
    pub backlog: Backlog,
}
