pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod utils;

pub use analysis::MatchAnalyzer;
pub use api::*;
pub use config::Config;
pub use error::AnalysisError;
pub use models::*;
pub use utils::*;

/// Install the global `tracing` subscriber, filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
