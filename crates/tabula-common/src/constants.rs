//! System-wide constants for Tabula.

use std::time::Duration;

// =============================================================================
// Network Constants
// =============================================================================

/// Default listen host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 7379;

/// Default cap on concurrently served connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 256;

// =============================================================================
// Protocol Limits
// =============================================================================

/// Maximum length of a single protocol line, terminator included (64 KB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Maximum total size of one dot-terminated request block (16 MB).
pub const DEFAULT_MAX_BLOCK_BYTES: usize = 16 * 1024 * 1024;

/// Maximum size of a single token inside a block (1 MB).
pub const MAX_TOKEN_BYTES: usize = 1024 * 1024;

// =============================================================================
// Write Batching Constants
// =============================================================================

/// Maximum number of write calls coalesced into one commit.
pub const DEFAULT_BATCH_MAX_SIZE: usize = 1000;

/// Maximum time a write call waits for its batch to fill.
pub const DEFAULT_BATCH_MAX_DELAY: Duration = Duration::from_millis(10);

// =============================================================================
// Default Table Registrations
// =============================================================================

/// Default name of the simple map table.
pub const DEFAULT_SIMPLE_TABLE: &str = "bag";

/// Default name of the grouped counted map table.
pub const DEFAULT_GROUPED_TABLE: &str = "group";

/// Default name of the reverse-indexed (expiring) map table.
pub const DEFAULT_INDEXED_TABLE: &str = "bug";

/// Default name of the grouped, reverse-indexed map table.
pub const DEFAULT_GROUPED_INDEXED_TABLE: &str = "gbug";
