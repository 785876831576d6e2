//! Peer++ Server
//!
//! Books placeholder evaluations on Intra and hands them to volunteer
//! evaluators, driven by Intra scale-team webhooks and Slack slash commands.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use peerpp_core::chat::SlackChat;
use peerpp_core::framework::DatabaseProcessor;
use peerpp_core::platform::IntraPlatform;
use peerpp_core::processors::{CommandDesk, Coordinator, Scheduler};
use peerpp_core::registry::{LockRegistry, PgLockRegistry};
use peerpp_sdk::client::{IntraClient, IntraCredentials, SlackClient};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const INTRA_SCOPES: &str = "public projects";

/// Peer++ - placeholder evaluations for the 42 Intra
#[derive(Parser, Debug)]
#[command(name = "peerpp-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./peerpp-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "PEERPP_LOG_JSON", default_value = "false")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.log_json);

    tracing::info!("Starting peerpp-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Split into the shared, reloadable sections and the startup-only settings
    let (shared_config, runtime) = loaded_config.into_shared();

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // Remote clients
    let intra = IntraClient::new(
        runtime.intra.root_url.clone(),
        IntraCredentials {
            uid: runtime.intra.uid.clone(),
            secret: runtime.intra.secret.clone(),
            scopes: INTRA_SCOPES.to_owned(),
        },
        runtime.intra.max_requests_per_second,
        runtime.intra.cooldown_base,
    )?;
    let slack = Arc::new(SlackClient::new(runtime.slack.token.clone())?);

    let platform = Arc::new(IntraPlatform::new(
        Arc::new(intra),
        shared_config.platform,
        shared_config.policy.clone(),
    ));
    let chat = Arc::new(SlackChat::new(slack.as_ref().clone()));
    let registry: Arc<dyn LockRegistry> = Arc::new(PgLockRegistry::new(DatabaseProcessor {
        pool: db_pool.clone(),
    }));

    let coordinator = Arc::new(Coordinator::new(
        platform,
        chat,
        registry.clone(),
        shared_config.platform,
        shared_config.policy.clone(),
    ));

    // Spawn the periodic sweep and delivery-id purge
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(
        coordinator.clone(),
        registry.clone(),
        runtime.delivery_retention_days,
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    // Create application state
    let state = AppState {
        config: shared_config,
        registry,
        desk: Arc::new(CommandDesk::new(coordinator.clone())),
        coordinator,
        slack,
        slack_signing_secret: Arc::from(runtime.slack.signing_secret.as_str()),
    };

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(state.clone(), config_loader);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Signal the background tasks to stop
    shutdown_notify.notify_one();
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        tracing::error!(error = %e, "Scheduler task failed");
    }

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
