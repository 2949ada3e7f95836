//! Store configuration.

use std::path::PathBuf;
use std::time::Duration;

use tabula_common::constants::{DEFAULT_BATCH_MAX_DELAY, DEFAULT_BATCH_MAX_SIZE};

/// Write batching (group commit) configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum number of calls coalesced into one commit.
    pub max_size: usize,
    /// Maximum time a call waits for its batch to fill.
    pub max_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_BATCH_MAX_SIZE,
            max_delay: DEFAULT_BATCH_MAX_DELAY,
        }
    }
}

/// Configuration for a [`Store`](crate::Store).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file. `None` is only valid for in-memory stores.
    pub path: Option<PathBuf>,

    /// Write batching settings.
    pub batch: BatchConfig,

    /// Whether commits are durable before they return.
    ///
    /// Disabling this trades crash safety for throughput.
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            batch: BatchConfig::default(),
            sync_writes: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration for a database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Sets the maximum batch size.
    #[must_use]
    pub fn with_batch_max_size(mut self, size: usize) -> Self {
        self.batch.max_size = size.max(1);
        self
    }

    /// Sets the maximum batch delay.
    #[must_use]
    pub fn with_batch_max_delay(mut self, delay: Duration) -> Self {
        self.batch.max_delay = delay;
        self
    }

    /// Sets whether commits are durable.
    #[must_use]
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert!(config.path.is_none());
        assert!(config.sync_writes);
        assert_eq!(config.batch.max_size, DEFAULT_BATCH_MAX_SIZE);
    }

    #[test]
    fn test_builder_clamps_batch_size() {
        let config = StoreConfig::new("/tmp/tabula.redb")
            .with_batch_max_size(0)
            .with_batch_max_delay(Duration::from_millis(2))
            .with_sync_writes(false);

        assert_eq!(config.batch.max_size, 1);
        assert_eq!(config.batch.max_delay, Duration::from_millis(2));
        assert!(!config.sync_writes);
    }
}
