//! Configuration module for peerpp-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments,
//! and environment variables. Secrets left empty in the file are read
//! from the environment.

pub mod file;

use crate::config::file::{FileConfig, IntraConfig, SlackConfig};
use peerpp_core::config::{
    PlatformConfig, PolicyConfig, ServerConfig, SharedConfig, WatchedProject, WebhookSecrets,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("{0} is not set in the config file or the environment")]
    MissingSecret(&'static str),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Intra client settings, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct IntraSettings {
    pub root_url: Url,
    pub uid: String,
    pub secret: String,
    pub max_requests_per_second: u32,
    pub cooldown_base: Duration,
}

/// Slack client settings, fixed for the process lifetime.
#[derive(Clone)]
pub struct SlackSettings {
    pub token: String,
    pub signing_secret: String,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub platform: PlatformConfig,
    pub policy: PolicyConfig,
    pub webhooks: WebhookSecrets,
    pub intra: IntraSettings,
    pub slack: SlackSettings,
    pub delivery_retention_days: u32,
}

impl LoadedConfig {
    /// Convert the reloadable parts into a SharedConfig with Arc<RwLock<T>> wrappers.
    pub fn into_shared(self) -> (SharedConfig, Runtime) {
        let shared = SharedConfig {
            platform: self.platform,
            server: Arc::new(RwLock::new(self.server)),
            policy: Arc::new(RwLock::new(self.policy)),
            webhooks: Arc::new(RwLock::new(self.webhooks)),
        };
        let runtime = Runtime {
            intra: self.intra,
            slack: self.slack,
            delivery_retention_days: self.delivery_retention_days,
        };
        (shared, runtime)
    }
}

/// Settings only read at startup.
pub struct Runtime {
    pub intra: IntraSettings,
    pub slack: SlackSettings,
    pub delivery_retention_days: u32,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides and environment fallbacks
    /// 3. Validate the configuration
    /// 4. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn load_with_env(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.build(&config_content, env)
    }

    fn build(
        &self,
        content: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        let secret = |value: String, key: &'static str| -> Result<String, ConfigError> {
            if !value.is_empty() {
                return Ok(value);
            }
            env(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingSecret(key))
        };

        let FileConfig {
            server,
            intra,
            slack,
            webhooks,
            policy,
            registry,
        } = file_config;
        let IntraConfig {
            root_url,
            uid,
            secret: intra_secret,
            max_requests_per_second,
            cooldown_base_ms,
            bot_user_id,
            campus_id,
            cursus_id,
            evaluator_group_id,
        } = intra;
        let SlackConfig {
            token,
            signing_secret,
        } = slack;

        let root_url = Url::parse(&root_url)
            .map_err(|e| ConfigError::ValidationError(format!("intra.root_url: {e}")))?;

        Ok(LoadedConfig {
            server: ServerConfig {
                listen: server.listen,
                handler_timeout: Duration::from_secs(server.handler_timeout_secs),
            },
            platform: PlatformConfig {
                bot_user_id,
                campus_id,
                cursus_id,
                evaluator_group_id,
            },
            policy: PolicyConfig {
                projects: policy
                    .projects
                    .into_iter()
                    .map(|p| WatchedProject {
                        id: p.id,
                        slug: p.slug,
                    })
                    .collect(),
                random_booking_chance: policy.random_booking_chance,
                lock_expiration_days: policy.lock_expiration_days,
            },
            webhooks: WebhookSecrets {
                create: secret(webhooks.create_secret, "WEBHOOK_CREATE_SECRET")?,
                delete: secret(webhooks.delete_secret, "WEBHOOK_DELETE_SECRET")?,
                update: secret(webhooks.update_secret, "WEBHOOK_UPDATE_SECRET")?,
            },
            intra: IntraSettings {
                root_url,
                uid: secret(uid, "INTRA_UID")?,
                secret: secret(intra_secret, "INTRA_SECRET")?,
                max_requests_per_second,
                cooldown_base: Duration::from_millis(cooldown_base_ms),
            },
            slack: SlackSettings {
                token: secret(token, "SLACK_TOKEN")?,
                signing_secret: secret(signing_secret, "SLACK_SIGNING_SECRET")?,
            },
            delivery_retention_days: registry.delivery_retention_days,
        })
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

    if config.policy.random_booking_chance > 100 {
        return invalid(format!(
            "policy.random_booking_chance must be at most 100, got {}",
            config.policy.random_booking_chance
        ));
    }
    if config.policy.lock_expiration_days == 0 {
        return invalid("policy.lock_expiration_days must be at least 1".into());
    }
    if config.registry.delivery_retention_days == 0 {
        return invalid("registry.delivery_retention_days must be at least 1".into());
    }
    if config.intra.max_requests_per_second == 0 {
        return invalid("intra.max_requests_per_second must be at least 1".into());
    }
    if config.server.handler_timeout_secs == 0 {
        return invalid("server.handler_timeout_secs must be at least 1".into());
    }

    let mut ids = HashSet::new();
    let mut slugs = HashSet::new();
    for project in &config.policy.projects {
        if !ids.insert(project.id) {
            return invalid(format!("project id {} is listed twice", project.id));
        }
        if !slugs.insert(project.slug.to_ascii_lowercase()) {
            return invalid(format!("project slug {} is listed twice", project.slug));
        }
    }
    Ok(())
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
