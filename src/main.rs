//! Server entry point.
//!
//! Loads configuration, initializes logging, resolves database credentials
//! and starts the server on the configured transport.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use bio_agent_server::core::database::PgCatalog;
use bio_agent_server::core::{Config, McpServer, TransportService};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging comes first so configuration warnings are visible
    let level = std::env::var("MCP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    init_logging(&level);

    let config = Config::from_env().context("Invalid configuration")?;
    info!("Starting {} v{}", config.server.name, config.server.version);

    let catalog = PgCatalog::new(
        config.database.credentials.clone(),
        config.database.schema.clone(),
        Duration::from_secs(config.database.connect_timeout_secs),
    );
    catalog
        .resolve()
        .await
        .context("Database credentials could not be resolved")?;

    let server = McpServer::new(config.clone(), Arc::new(catalog));
    info!("Server initialized");

    TransportService::new(config.transport).run(server).await?;

    info!("Server shutting down");
    Ok(())
}

/// Initialize tracing on stderr; stdout belongs to the stdio transport.
fn init_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
