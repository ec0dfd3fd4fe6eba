//! CosmoQL GraphQL Server
//!
//! A standalone server binary for running CosmoQL over HTTP.

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use cosmoql::storage::{open_database, InMemoryStores, PersistentStores, Stores};
use cosmoql::{init_logging, router, ServerConfig};

/// Keeps whichever backend is in use alive for the life of the server.
enum Backend {
    Memory(InMemoryStores),
    Persistent(PersistentStores),
}

impl Backend {
    fn open(config: &ServerConfig) -> Result<Self, cosmoql::StorageError> {
        match &config.data_dir {
            Some(dir) => {
                info!(
                    dir = %dir.display(),
                    sync = !config.no_sync,
                    compact = !config.no_compact,
                    "opening persistent store"
                );
                open_database(dir, Some(config.persistent_config())).map(Self::Persistent)
            }
            None => {
                info!("no data directory given, documents are kept in memory");
                Ok(Self::Memory(InMemoryStores::new()))
            }
        }
    }

    fn stores(&self) -> Stores {
        match self {
            Self::Memory(stores) => stores.stores(),
            Self::Persistent(stores) => stores.stores(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level)?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting cosmoql-server");
    let backend = Backend::open(&config)?;
    let app = router(backend.stores(), config.loader_config());

    let listener = TcpListener::bind(config.addr()).await?;
    info!(addr = %listener.local_addr()?, "listening, GraphiQL at /graphql");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    drop(backend);
    info!("shut down");
    Ok(())
}
