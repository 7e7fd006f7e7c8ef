//! `[server]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [server]
//! hostname = "127.0.0.1"            # Interface to bind
//! port = 8000                       # HTTP port number
//! allow_cross_site_requests = true  # Send CORS headers
//!
//! [server.proxy]
//! host = "localhost"                # Upstream host
//! port = 8080                       # Upstream port
//! prefix = "/legacy"                # Prepended to forwarded paths
//! remove_prefix = "/api"            # Stripped after the prefix is applied
//! ```
//!
//! Requests that match no registered asset go to the proxy when one is
//! configured, otherwise they get a 404.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// Development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network interface to bind.
    pub hostname: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// Answer with `Access-Control-Allow-Origin: *` and echo requested
    /// headers back.
    pub allow_cross_site_requests: bool,

    /// Upstream for URLs no application serves.
    pub proxy: Option<ProxyConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
            allow_cross_site_requests: false,
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,

    #[serde(default = "defaults::proxy_port")]
    pub port: u16,

    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub remove_prefix: Option<String>,
}

mod defaults {
    pub fn proxy_port() -> u16 {
        80
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use crate::config::test_parse_config;

    #[test]
    fn test_server_config() {
        let config = test_parse_config(
            "[server]\nhostname = \"0.0.0.0\"\nport = 4020\nallow_cross_site_requests = true",
        );

        assert_eq!(
            config.server.hostname,
            IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
        );
        assert_eq!(config.server.port, 4020);
        assert!(config.server.allow_cross_site_requests);
        assert!(config.server.proxy.is_none());
    }

    #[test]
    fn test_server_config_defaults() {
        let config = test_parse_config("");

        assert_eq!(config.server.hostname, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.server.port, 8000);
        assert!(!config.server.allow_cross_site_requests);
    }

    #[test]
    fn test_proxy_config() {
        let config = test_parse_config(
            "[server.proxy]\nhost = \"localhost\"\nremove_prefix = \"/api\"",
        );

        let proxy = config.server.proxy.unwrap();
        assert_eq!(proxy.host, "localhost");
        assert_eq!(proxy.port, 80);
        assert_eq!(proxy.prefix, "");
        assert_eq!(proxy.remove_prefix.as_deref(), Some("/api"));
    }
}
