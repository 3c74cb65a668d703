//! Clover message routing gateway
//!
//! Accepts inbound messages on `/i/{interchange}/receive`, picks a channel
//! (keyword, sticky sender mapping or default) and relays the request to the
//! channel's URL. Configuration is replaced wholesale through `/admin`.
//!
//! Usage:
//! ```bash
//! # SQLite in the working directory
//! clover-server
//!
//! # With a config file, admin password from the environment
//! CLOVER_ADMIN_PASSWORD=secret clover-server --config clover.yaml
//!
//! # Apply migrations only
//! clover-server --database-url sqlite://clover.db migrate
//! ```
//!
//! Test with:
//! ```bash
//! curl -u admin:secret http://localhost:8081/admin \
//!   --data-urlencode 'config=[{"id":"...","name":"Nigeria","country":"NG","scheme":"tel","channels":[...]}]'
//!
//! curl "http://localhost:8081/i/<interchange-id>/receive?sender=2348000000&message=join"
//! ```

mod config;
mod store_factory;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clover_egress::Forwarder;
use clover_ingress::{AppState, build_router};
use clover_routing::{RoutingCache, RoutingEngine};
use config::{LogFormat, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use store_factory::{Backend, Stores, create_stores};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Clover Server - message routing gateway
#[derive(Parser)]
#[command(name = "clover-server")]
#[command(about = "Clover gateway routing inbound messages to channel endpoints", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, value_name = "FILE", env = "CLOVER_CONFIG", global = true)]
    config: Option<String>,

    /// Address to bind
    #[arg(long, value_name = "HOST", global = true)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, value_name = "PORT", global = true)]
    port: Option<u16>,

    /// Store location: memory, sqlite://PATH or postgres://...
    #[arg(long, value_name = "URL", global = true)]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway (default if no command specified)
    Serve,
    /// Bring the database schema to the latest version
    Migrate,
    /// Print the current database schema version
    SchemaVersion,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let path = shellexpand::tilde(path).to_string();
            ServerConfig::from_file(&path)?
        }
        None => ServerConfig::default(),
    };

    // Environment overrides the file, CLI flags override both
    config.merge_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }

    init_tracing(&config)?;

    if let Some(path) = &cli.config {
        info!("📁 Loaded configuration from: {}", path);
    } else {
        info!("📁 Using default configuration");
    }

    let backend = Backend::parse(&config.database_url)?;
    info!("🗄️  Store: {}", backend.describe());
    let stores = create_stores(&config.database_url)
        .await
        .context("Failed to open store")?;

    match cli.command {
        Some(Commands::Migrate) => {
            let version = stores.schema.ensure_latest().await?;
            println!("Schema is at version {}", version);
            Ok(())
        }
        Some(Commands::SchemaVersion) => {
            match stores.schema.current_version().await? {
                Some(version) => println!("Schema version: {}", version),
                None => println!("Schema version: uninitialised"),
            }
            Ok(())
        }
        Some(Commands::Serve) | None => serve(config, stores).await,
    }
}

fn init_tracing(config: &ServerConfig) -> anyhow::Result<()> {
    let level = match config.logging.level.to_lowercase().as_str() {
        level @ ("trace" | "debug" | "info" | "warn" | "error") => level.to_string(),
        _ => "info".to_string(),
    };

    let mut filter = EnvFilter::new(level);

    // statement logging only when log_sql_queries is set
    if !config.logging.log_sql_queries {
        filter = filter.add_directive("sqlx=warn".parse()?);
    }

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))
}

async fn serve(config: ServerConfig, stores: Stores) -> anyhow::Result<()> {
    info!("🚀 Initializing Clover gateway");

    let version = stores.schema.ensure_latest().await?;
    info!("✓ Schema at version {}", version);

    let cache = Arc::new(RoutingCache::new(stores.config.clone(), config.cache.ttl()));
    info!("✓ Routing cache (ttl {:?})", cache.ttl());

    let interchanges = cache.get_all().await?;
    info!("✓ {} interchanges configured", interchanges.len());

    let engine = Arc::new(RoutingEngine::new(cache, stores.mappings.clone()));
    let forwarder = Arc::new(Forwarder::new(&config.forwarder)?);
    info!("✓ Forwarder (deadline {:?})", forwarder.timeout());

    let mut state = AppState::new(engine, forwarder);
    match config.admin.credentials() {
        Some(credentials) => {
            info!("🔒 Admin routes require basic auth (user '{}')", credentials.username);
            state = state.with_admin(credentials);
        }
        None => warn!("🔓 No admin password configured, admin routes are open"),
    }

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("");
    info!("✅ Clover gateway listening on http://{}", addr);
    info!("   - Receive:      http://{}/i/{{interchange}}/receive", addr);
    info!("   - Admin:        http://{}/admin", addr);
    info!("   - Health check: http://{}/healthz", addr);
    info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
