//! TOML file configuration structures.
//!
//! These structs directly map to the `peerpp-config.toml` file format.
//! Secrets may be left empty and supplied through the environment instead.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub intra: IntraConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// Webhook handlers still running after this long answer 503.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
            handler_timeout_secs: default_handler_timeout(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

fn default_handler_timeout() -> u64 {
    120
}

/// Intra API access and the ids the coordinator acts on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntraConfig {
    /// Parsed and checked when the config is loaded.
    #[serde(default = "default_intra_root")]
    pub root_url: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_max_requests")]
    pub max_requests_per_second: u32,
    #[serde(default = "default_cooldown_base")]
    pub cooldown_base_ms: u64,
    /// Service account that owns the placeholders.
    pub bot_user_id: i64,
    pub campus_id: i64,
    #[serde(default = "default_cursus")]
    pub cursus_id: i64,
    pub evaluator_group_id: i64,
}

fn default_intra_root() -> String {
    "https://api.intra.42.fr/".to_string()
}

fn default_max_requests() -> u32 {
    2
}

fn default_cooldown_base() -> u64 {
    1500
}

fn default_cursus() -> i64 {
    21
}

/// Slack bot credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub signing_secret: String,
}

/// Secrets Intra sends with each scale-team hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhooksConfig {
    #[serde(default)]
    pub create_secret: String,
    #[serde(default)]
    pub delete_secret: String,
    #[serde(default)]
    pub update_secret: String,
}

/// A watched project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub id: i64,
    pub slug: String,
}

/// Booking policy section, reloaded on SIGHUP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
    /// Percentage of required evaluations that get a placeholder.
    #[serde(default = "default_chance")]
    pub random_booking_chance: u8,
    #[serde(default = "default_lock_expiration")]
    pub lock_expiration_days: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            random_booking_chance: default_chance(),
            lock_expiration_days: default_lock_expiration(),
        }
    }
}

fn default_chance() -> u8 {
    100
}

fn default_lock_expiration() -> u32 {
    14
}

/// Lock registry section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Days a webhook delivery id is remembered.
    #[serde(default = "default_delivery_retention")]
    pub delivery_retention_days: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            delivery_retention_days: default_delivery_retention(),
        }
    }
}

fn default_delivery_retention() -> u32 {
    7
}
