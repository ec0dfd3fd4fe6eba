//! Persistent collections: the in-memory index plus a shared write-ahead log.

use std::fs;
use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::cosmonaut::Cosmonaut;
use crate::storage::memory::{Collection, Journal};
use crate::storage::traits::{Document, StorageError};
use crate::storage::Stores;
use crate::superpower::Superpower;

use super::file_lock::FileLock;
use super::wal::{WalEntryKind, WriteAheadLog};
use super::PersistentConfig;

const WAL_FILE_NAME: &str = "cosmoql.wal";

fn backend(context: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::BackendError(format!("{context}: {err}"))
}

/// An entry that cannot be encoded is a serialization failure; anything else
/// is the backend's.
fn journal_error(err: &IoError) -> StorageError {
    if err.kind() == ErrorKind::InvalidData {
        StorageError::SerializationError(format!("failed to encode WAL entry: {err}"))
    } else {
        backend("failed to append WAL entry", err)
    }
}

/// Maps a document kind onto its log entries.
pub trait Journaled: Document + Serialize {
    /// Entry recording the full state of `document`.
    fn put_entry(document: &Self) -> WalEntryKind;
    /// Entry recording the removal of `id`.
    fn delete_entry(id: Self::Id) -> WalEntryKind;
}

impl Journaled for Cosmonaut {
    fn put_entry(document: &Self) -> WalEntryKind {
        WalEntryKind::CosmonautPut(document.clone())
    }

    fn delete_entry(id: Self::Id) -> WalEntryKind {
        WalEntryKind::CosmonautDelete { id }
    }
}

impl Journaled for Superpower {
    fn put_entry(document: &Self) -> WalEntryKind {
        WalEntryKind::SuperpowerPut(document.clone())
    }

    fn delete_entry(id: Self::Id) -> WalEntryKind {
        WalEntryKind::SuperpowerDelete { id }
    }
}

/// Journal that appends to the shared write-ahead log.
#[derive(Clone)]
pub struct WalJournal {
    wal: Arc<WriteAheadLog>,
}

impl<D: Journaled> Journal<D> for WalJournal {
    fn record_put(&self, document: &D) -> Result<(), StorageError> {
        self.wal
            .append(D::put_entry(document))
            .map(|_| ())
            .map_err(|e| journal_error(&e))
    }

    fn record_delete(&self, id: D::Id) -> Result<(), StorageError> {
        self.wal
            .append(D::delete_entry(id))
            .map(|_| ())
            .map_err(|e| journal_error(&e))
    }
}

/// Collection whose writes are journaled before they are applied.
pub type PersistentCollection<D> = Collection<D, WalJournal>;

/// Outcome of a compaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionResult {
    /// Live documents written to the fresh log.
    pub documents: usize,
    /// Log size before compaction (bytes).
    pub wal_size_before: u64,
    /// Log size after compaction (bytes).
    pub wal_size_after: u64,
}

/// Both persistent collections over one data directory.
///
/// Holds the directory lock for as long as it lives.
pub struct PersistentStores {
    /// The data directory.
    pub dir: PathBuf,
    _lock: FileLock,
    wal: Arc<WriteAheadLog>,
    /// Cosmonaut collection.
    pub cosmonauts: Arc<PersistentCollection<Cosmonaut>>,
    /// Superpower collection.
    pub superpowers: Arc<PersistentCollection<Superpower>>,
}

impl PersistentStores {
    /// Open or create a data directory and replay its log.
    ///
    /// # Errors
    /// - If the directory cannot be created or locked
    /// - If the log cannot be opened or its header is foreign
    /// - If `compact_on_open` is set and the compaction fails
    pub fn open(dir: &Path, config: &PersistentConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(dir).map_err(|e| backend("failed to create data directory", e))?;
        let lock = FileLock::acquire(dir)
            .map_err(|e| StorageError::ConnectionError(format!("failed to acquire lock: {e}")))?;

        let (wal, recovery) = WriteAheadLog::open(&dir.join(WAL_FILE_NAME), config.sync_on_write)
            .map_err(|e| backend("failed to open WAL", e))?;
        let wal = Arc::new(wal);
        if let Some(tail) = &recovery.discarded_tail {
            warn!(dir = %dir.display(), tail = %tail, "discarded invalid WAL tail");
        }

        let journal = WalJournal { wal: Arc::clone(&wal) };
        let stores = Self {
            dir: dir.to_path_buf(),
            _lock: lock,
            wal,
            cosmonauts: Arc::new(Collection::with_journal(journal.clone())),
            superpowers: Arc::new(Collection::with_journal(journal)),
        };

        let replayed = recovery.entries.len();
        for entry in recovery.entries {
            stores.replay(entry.kind)?;
        }
        info!(
            dir = %stores.dir.display(),
            entries = replayed,
            cosmonauts = stores.cosmonauts.len()?,
            superpowers = stores.superpowers.len()?,
            "opened persistent store"
        );

        if config.compact_on_open {
            stores.compact()?;
        }
        Ok(stores)
    }

    fn replay(&self, kind: WalEntryKind) -> Result<(), StorageError> {
        match kind {
            WalEntryKind::CosmonautPut(doc) => self.cosmonauts.write("replay")?.put(doc),
            WalEntryKind::CosmonautDelete { id } => {
                self.cosmonauts.write("replay")?.remove(id);
            }
            WalEntryKind::SuperpowerPut(doc) => self.superpowers.write("replay")?.put(doc),
            WalEntryKind::SuperpowerDelete { id } => {
                self.superpowers.write("replay")?.remove(id);
            }
        }
        Ok(())
    }

    /// Rewrites the log as one entry per live document.
    ///
    /// Both collections are write-locked for the duration, so no write can
    /// slip between the snapshot and the rewrite.
    ///
    /// # Errors
    /// Any I/O error; the previous log then stays authoritative.
    pub fn compact(&self) -> Result<CompactionResult, StorageError> {
        let wal_size_before = self
            .wal
            .size_bytes()
            .map_err(|e| backend("failed to stat WAL", e))?;

        let cosmonauts = self.cosmonauts.write("compact")?;
        let superpowers = self.superpowers.write("compact")?;
        let kinds: Vec<WalEntryKind> = superpowers
            .documents()
            .map(Superpower::put_entry)
            .chain(cosmonauts.documents().map(Cosmonaut::put_entry))
            .collect();
        let documents = kinds.len();

        self.wal
            .rewrite(kinds)
            .map_err(|e| backend("failed to rewrite WAL", e))?;
        drop(superpowers);
        drop(cosmonauts);

        let wal_size_after = self
            .wal
            .size_bytes()
            .map_err(|e| backend("failed to stat WAL", e))?;
        info!(documents, wal_size_before, wal_size_after, "compacted WAL");

        Ok(CompactionResult {
            documents,
            wal_size_before,
            wal_size_after,
        })
    }

    /// Type-erased handles for request handling.
    #[must_use]
    pub fn stores(&self) -> Stores {
        Stores {
            cosmonauts: self.cosmonauts.clone(),
            superpowers: self.superpowers.clone(),
        }
    }
}

impl std::fmt::Debug for PersistentStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStores")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}
