//! Server configuration from flags and environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::loader::LoaderConfig;

/// CosmoQL GraphQL server.
#[derive(Debug, Clone, Parser)]
#[command(name = "cosmoql-server", version, about)]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "COSMOQL_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Address to bind to.
    #[arg(long, env = "COSMOQL_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Data directory. Without one, documents live in memory only.
    #[arg(short, long, env = "COSMOQL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Skip fsync after each log append.
    #[arg(long, env = "COSMOQL_NO_SYNC")]
    pub no_sync: bool,

    /// Keep the log as it is on startup instead of compacting it.
    #[arg(long, env = "COSMOQL_NO_COMPACT")]
    pub no_compact: bool,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, env = "COSMOQL_LOG", default_value = "info")]
    pub log_level: String,

    /// How long the loader waits for more ids before fetching.
    #[arg(long, env = "COSMOQL_BATCH_DELAY_MS", default_value_t = 1)]
    pub batch_delay_ms: u64,
}

impl ServerConfig {
    /// Socket address to bind.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Loader settings for every request.
    #[must_use]
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            ..LoaderConfig::default()
        }
    }

    /// Settings for the on-disk store.
    #[cfg(feature = "persistent")]
    #[must_use]
    pub fn persistent_config(&self) -> crate::storage::PersistentConfig {
        crate::storage::PersistentConfig {
            sync_on_write: !self.no_sync,
            compact_on_open: !self.no_compact,
        }
    }
}
