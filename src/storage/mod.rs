//! Document storage for CosmoQL.
//!
//! [`DocumentStore`] is the abstract interface; [`memory`] holds the
//! in-memory backend and `persistent` (feature `persistent`) the durable one.

pub mod document;
pub mod memory;
#[cfg(feature = "persistent")]
pub mod persistent;
mod traits;

use std::sync::Arc;

pub use document::{CosmonautFilter, CosmonautPatch, SuperpowerFilter, SuperpowerPatch};
pub use memory::{Collection, InMemoryCollection, InMemoryStores, Journal, NoJournal};
#[cfg(feature = "persistent")]
pub use persistent::{open_database, PersistentConfig, PersistentStores};
pub use traits::{Document, DocumentStore, StorageError};

use crate::cosmonaut::Cosmonaut;
use crate::superpower::Superpower;

/// Type-erased handles to both collections, shared by every request.
#[derive(Clone)]
pub struct Stores {
    /// Cosmonaut collection.
    pub cosmonauts: Arc<dyn DocumentStore<Cosmonaut>>,
    /// Superpower collection.
    pub superpowers: Arc<dyn DocumentStore<Superpower>>,
}

impl Stores {
    /// Bundle two collection handles.
    #[must_use]
    pub fn new(
        cosmonauts: Arc<dyn DocumentStore<Cosmonaut>>,
        superpowers: Arc<dyn DocumentStore<Superpower>>,
    ) -> Self {
        Self {
            cosmonauts,
            superpowers,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
