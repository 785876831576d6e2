//! Configuration types for the Peer++ coordinator.
//!
//! These types represent the validated runtime configuration used by the server
//! and shared with the core processors. Loading and parsing the TOML file is
//! handled by the server crate.

mod platform;
mod policy;
mod server;
mod webhooks;

pub use platform::PlatformConfig;
pub use policy::{PolicyConfig, WatchedProject};
pub use server::ServerConfig;
pub use webhooks::WebhookSecrets;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared configuration state with separate locks for each reloadable section.
///
/// `platform` is fixed for the process lifetime; the other sections are
/// replaced on SIGHUP.
#[derive(Clone)]
pub struct SharedConfig {
    pub platform: PlatformConfig,
    pub server: Arc<RwLock<ServerConfig>>,
    pub policy: Arc<RwLock<PolicyConfig>>,
    pub webhooks: Arc<RwLock<WebhookSecrets>>,
}
