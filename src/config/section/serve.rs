//! `[server]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [server]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 6543                 # HTTP port number
//! prefix = "/user/alice"      # URL base path when mounted behind a proxy
//! ```
//!
//! Use `interface = "0.0.0.0"` to make the server accessible from other hosts.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// URL base path every route is mounted under.
    pub prefix: String,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 6543,
            prefix: String::new(),
        }
    }
}

impl ServeConfig {
    /// Prefix with a leading slash and no trailing slash (`""` for the root).
    pub fn normalized_prefix(&self) -> String {
        normalize_prefix(&self.prefix)
    }
}

pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
