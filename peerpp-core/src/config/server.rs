//! HTTP server configuration.

use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address and port to listen on.
    pub listen: SocketAddr,
    /// Upper bound for one webhook handler, including 429 backoff.
    pub handler_timeout: Duration,
}
