pub mod config;
pub mod error;
pub mod ingest;
pub mod preset;
pub mod server;
pub mod session;
pub mod vision;
pub mod workflow;

pub use error::{Error, Result};

/// Process setup shared by the binaries
pub mod util {
    use crate::config::DEFAULT_LOG_FILTER;
    use tracing_subscriber::EnvFilter;

    /// Install the global tracing subscriber. `RUST_LOG` wins over the
    /// default filter. Also forwards `log` records (actix's request logger).
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
