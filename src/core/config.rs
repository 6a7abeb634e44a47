//! Configuration management for the server.
//!
//! Everything is read from environment variables (optionally seeded from a
//! `.env` file) on top of compiled-in defaults.

use super::database::credentials::CredentialsConfig;
use super::database::query::SchemaName;
use super::database::DEFAULT_CONNECT_TIMEOUT_SECS;
use super::error::{Error, Result};
use super::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Main configuration structure for the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Database connection configuration for the tool handlers.
    pub database: DatabaseConfig,

    /// Map explorer configuration.
    pub explorer: ExplorerConfig,

    /// Resources domain configuration.
    pub resources: ResourcesConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Schema holding the serving tables (`PG_SCHEMA`).
    pub schema: SchemaName,

    /// Credential sources. Secrets are redacted in `Debug`.
    pub credentials: CredentialsConfig,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

/// Map explorer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Root of the partitioned metrics dataset.
    pub data_root: PathBuf,

    /// Region preselected when a client does not name one.
    pub default_country: String,

    /// Year preselected when a client does not name one.
    pub default_year: i32,

    /// Default top-N cap, never above the hard cap of 20 000.
    pub max_hexes: usize,

    /// How long a loaded partition stays cached.
    pub cache_ttl_secs: u64,

    /// Whether partition files may be symlinks.
    pub allow_symlinks: bool,
}

/// Configuration for the resources domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Whether explorer layers are exposed as MCP resources.
    pub expose_explorer_layers: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            schema: SchemaName::default(),
            credentials: CredentialsConfig::default(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data/gold/gbif_cell_metrics"),
            default_country: "ES".to_string(),
            default_year: 2024,
            max_hexes: 20_000,
            cache_ttl_secs: 600,
            allow_symlinks: false,
        }
    }
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            expose_explorer_layers: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "bio-agent-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            transport: TransportConfig::default(),
            database: DatabaseConfig::default(),
            explorer: ExplorerConfig::default(),
            resources: ResourcesConfig::default(),
        }
    }
}

/// Parse an optional env var, failing loudly on a malformed value.
fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::config(format!("{} has an invalid value: '{}'", name, raw))),
        _ => Ok(None),
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Credentials are only collected here; they are validated when the
    /// catalog resolves them at startup.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.transport = TransportConfig::from_env();

        // Database
        if let Ok(schema) = std::env::var("PG_SCHEMA") {
            config.database.schema = SchemaName::parse(&schema)
                .map_err(|e| Error::config(format!("PG_SCHEMA: {}", e)))?;
        }
        if let Some(secs) = env_parse::<u64>("PG_CONNECT_TIMEOUT_SECS")? {
            config.database.connect_timeout_secs = secs;
        }
        config.database.credentials = CredentialsConfig::from_env();
        if config.database.credentials.secret_arn.is_some() {
            info!("Database credentials will be read from Secrets Manager");
        }

        // Explorer
        if let Ok(root) = std::env::var("MCP_EXPLORER_DATA_ROOT") {
            config.explorer.data_root = PathBuf::from(root);
        }
        if let Ok(country) = std::env::var("MCP_EXPLORER_COUNTRY") {
            config.explorer.default_country = country.trim().to_uppercase();
        }
        if let Some(year) = env_parse::<i32>("MCP_EXPLORER_YEAR")? {
            config.explorer.default_year = year;
        }
        if let Some(max_hexes) = env_parse::<usize>("MCP_EXPLORER_MAX_HEXES")? {
            config.explorer.max_hexes = max_hexes;
        }
        if let Some(ttl) = env_parse::<u64>("MCP_EXPLORER_CACHE_TTL_SECS")? {
            config.explorer.cache_ttl_secs = ttl;
        }
        if let Some(allow) = env_parse::<bool>("MCP_EXPLORER_ALLOW_SYMLINKS")? {
            config.explorer.allow_symlinks = allow;
            info!("Symlinks allowed under explorer data root: {}", allow);
        }
        if !config.explorer.data_root.exists() {
            warn!(
                "Explorer data root {:?} does not exist; layers will render empty",
                config.explorer.data_root
            );
        }

        if let Some(expose) = env_parse::<bool>("MCP_RESOURCES_EXPLORER_LAYERS")? {
            config.resources.expose_explorer_layers = expose;
        }

        Ok(config)
    }
}
