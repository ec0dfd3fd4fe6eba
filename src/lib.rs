//! # CosmoQL - a GraphQL API over cosmonauts and their superpowers
//!
//! CosmoQL serves two document collections, cosmonauts and superpowers, and
//! keeps the relationship between them consistent in both directions: a
//! cosmonaut references at most one superpower, and each superpower lists the
//! cosmonauts holding it.
//!
//! ## Core Concepts
//!
//! - **Store**: a [`DocumentStore`] per document kind, in memory or backed by
//!   a write-ahead log (feature `persistent`)
//! - **Loader**: a request-scoped [`BatchLoader`] that coalesces superpower
//!   lookups into batched store queries
//! - **Views**: shaped documents whose relationship fields are resolved only
//!   when a query selects them
//! - **Operations**: the two reads and six writes behind the GraphQL schema
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cosmoql::{router, InMemoryStores, LoaderConfig};
//!
//! let backing = InMemoryStores::new();
//! let app = router(backing.stores(), LoaderConfig::default());
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Documents and validation
pub mod cosmonaut;
pub mod error;
pub mod superpower;
pub mod time;

// Storage, loading and resolution
pub mod loader;
pub mod operations;
pub mod resolve;
pub mod storage;

// Serving
pub mod config;
pub mod logging;
pub mod schema;
pub mod transport;

pub use cosmonaut::{Cosmonaut, CosmonautFields, CosmonautId, CosmonautInput};
pub use error::{ApiError, ApiResult, DocumentKind, ValidationError};
pub use superpower::{Superpower, SuperpowerId, SuperpowerInput};

pub use loader::{BatchFetch, BatchLoader, FetchById, LoaderConfig, SuperpowerLoader};
pub use resolve::{CosmonautView, RequestScope, SuperpowerLink, SuperpowerView, UsersLink};
pub use storage::{DocumentStore, InMemoryStores, StorageError, Stores};

pub use config::ServerConfig;
pub use logging::init_logging;
pub use schema::{build_schema, CosmoSchema};
pub use transport::router;
