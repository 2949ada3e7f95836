//! Server configuration.
//!
//! This module provides configuration management for the Tabula server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tabula_common::constants::{
    DEFAULT_BATCH_MAX_DELAY, DEFAULT_BATCH_MAX_SIZE, DEFAULT_HOST, DEFAULT_MAX_BLOCK_BYTES,
    DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_LINE_BYTES, DEFAULT_PORT,
};
use tabula_common::TableKind;
use tabula_store::StoreConfig;
use tabula_tables::{Registry, TableResult};

/// Name of the database file inside the data directory.
pub const DB_FILE_NAME: &str = "tabula.redb";

/// A table registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name, as used in queries.
    pub name: String,
    /// Table layout.
    pub kind: TableKind,
}

impl TableConfig {
    /// Creates a table registration.
    pub fn new(name: impl Into<String>, kind: TableKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Data directory for persistent storage.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Run in memory-only mode.
    #[serde(default)]
    pub memory_mode: bool,

    /// Maximum number of concurrently served connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Maximum length of one protocol line in bytes.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,

    /// Maximum size of one query block in bytes.
    #[serde(default = "default_max_block_bytes")]
    pub max_block_bytes: usize,

    /// Maximum number of write requests coalesced into one commit.
    #[serde(default = "default_batch_max_size")]
    pub batch_max_size: usize,

    /// Maximum time a write request waits for its batch, in milliseconds.
    #[serde(default = "default_batch_max_delay_ms")]
    pub batch_max_delay_ms: u64,

    /// Make every commit durable before replying.
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,

    /// Registered tables.
    #[serde(default = "default_tables")]
    pub tables: Vec<TableConfig>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

fn default_max_block_bytes() -> usize {
    DEFAULT_MAX_BLOCK_BYTES
}

fn default_batch_max_size() -> usize {
    DEFAULT_BATCH_MAX_SIZE
}

fn default_batch_max_delay_ms() -> u64 {
    DEFAULT_BATCH_MAX_DELAY.as_millis() as u64
}

fn default_sync_writes() -> bool {
    true
}

fn default_tables() -> Vec<TableConfig> {
    Registry::default_tables()
        .into_iter()
        .map(|(name, kind)| TableConfig::new(name, kind))
        .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: None,
            memory_mode: false,
            max_connections: default_max_connections(),
            max_line_bytes: default_max_line_bytes(),
            max_block_bytes: default_max_block_bytes(),
            batch_max_size: default_batch_max_size(),
            batch_max_delay_ms: default_batch_max_delay_ms(),
            sync_writes: default_sync_writes(),
            tables: default_tables(),
        }
    }
}

impl ServerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Returns the socket address.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the database file, or `None` in memory mode or without a
    /// data directory.
    pub fn db_path(&self) -> Option<PathBuf> {
        if self.memory_mode {
            return None;
        }
        self.data_dir.as_ref().map(|d| d.join(DB_FILE_NAME))
    }

    /// Returns the store settings derived from this configuration.
    pub fn store_config(&self) -> StoreConfig {
        let config = match self.db_path() {
            Some(path) => StoreConfig::new(path),
            None => StoreConfig::default(),
        };
        config
            .with_batch_max_size(self.batch_max_size)
            .with_batch_max_delay(Duration::from_millis(self.batch_max_delay_ms))
            .with_sync_writes(self.sync_writes)
    }

    /// Builds the table registry from the `tables` list.
    pub fn build_registry(&self) -> TableResult<Registry> {
        Registry::from_tables(self.tables.iter().map(|t| (t.name.clone(), t.kind)))
    }

    /// Creates a builder for configuration.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

/// Builder for server configuration.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the data directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(dir.into());
        self
    }

    /// Enables memory mode.
    pub fn memory_mode(mut self, enabled: bool) -> Self {
        self.config.memory_mode = enabled;
        self
    }

    /// Sets maximum connections.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Sets the maximum line length.
    pub fn max_line_bytes(mut self, max: usize) -> Self {
        self.config.max_line_bytes = max;
        self
    }

    /// Sets the maximum block size.
    pub fn max_block_bytes(mut self, max: usize) -> Self {
        self.config.max_block_bytes = max;
        self
    }

    /// Sets the write batch size and delay.
    pub fn batch(mut self, max_size: usize, max_delay_ms: u64) -> Self {
        self.config.batch_max_size = max_size;
        self.config.batch_max_delay_ms = max_delay_ms;
        self
    }

    /// Sets whether commits are durable.
    pub fn sync_writes(mut self, enabled: bool) -> Self {
        self.config.sync_writes = enabled;
        self
    }

    /// Replaces the table registrations.
    pub fn tables(mut self, tables: Vec<TableConfig>) -> Self {
        self.config.tables = tables;
        self
    }

    /// Adds a table registration.
    pub fn table(mut self, name: impl Into<String>, kind: TableKind) -> Self {
        self.config.tables.push(TableConfig::new(name, kind));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ServerConfig {
        self.config
    }
}
