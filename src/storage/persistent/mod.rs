//! Persistent storage backend for CosmoQL.
//!
//! This module provides durable, crash-safe storage with:
//! - Write-Ahead Logging (WAL) for crash recovery
//! - File locking for single-process access
//! - CRC32 checksums for corruption detection
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               PersistentStores               │
//! ├──────────────────────────────────────────────┤
//! │  Collection<Cosmonaut>  Collection<Superpower>│
//! │     (in-memory index)     (in-memory index)  │
//! │            │                     │           │
//! │            └──── WalJournal ─────┘           │
//! │                      ↓                       │
//! │              WriteAheadLog (append-only)     │
//! │                      ↓                       │
//! │              FileLock (flock)                │
//! └──────────────────────────────────────────────┘
//! ```

mod codec;
mod file_lock;
mod stores;
mod wal;

pub use file_lock::FileLock;
pub use stores::{
    CompactionResult, Journaled, PersistentCollection, PersistentStores, WalJournal,
};
pub use wal::{Recovery, WalEntry, WalEntryKind, WriteAheadLog};

use std::path::Path;

use crate::storage::traits::StorageError;

/// Configuration for persistent storage.
#[derive(Debug, Clone)]
pub struct PersistentConfig {
    /// Whether to fsync after every append (slower but safer).
    pub sync_on_write: bool,
    /// Whether to rewrite the log down to the live documents once it has
    /// been replayed.
    pub compact_on_open: bool,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            compact_on_open: false,
        }
    }
}

/// Open or create a persistent CosmoQL database at the given path.
///
/// # Errors
/// - If the path cannot be created or accessed
/// - If another process holds the lock
/// - If the log file is not a CosmoQL log, or holds an entry that cannot be
///   decoded
///
/// # Example
/// ```rust,ignore
/// use cosmoql::storage::open_database;
///
/// let stores = open_database("./cosmoql-data", None)?;
/// let app = cosmoql::transport::router(stores.stores(), Default::default());
/// ```
pub fn open_database(
    path: impl AsRef<Path>,
    config: Option<PersistentConfig>,
) -> Result<PersistentStores, StorageError> {
    PersistentStores::open(path.as_ref(), &config.unwrap_or_default())
}
