//! Application state shared across all request handlers.

use peerpp_core::config::SharedConfig;
use peerpp_core::processors::{CommandDesk, Coordinator};
use peerpp_core::registry::LockRegistry;
use peerpp_sdk::client::SlackClient;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Configuration sections (reloadable ones via SIGHUP).
    pub config: SharedConfig,
    /// Delivery ids and expired teams.
    pub registry: Arc<dyn LockRegistry>,
    pub coordinator: Arc<Coordinator>,
    pub desk: Arc<CommandDesk>,
    /// Used to answer slash commands through their `response_url`.
    pub slack: Arc<SlackClient>,
    pub slack_signing_secret: Arc<str>,
}
