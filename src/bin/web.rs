use anyhow::{Context, Result};
use pickdeldia::{init_tracing, routes, Config, MatchAnalyzer};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_tracing();

    // Missing credentials stop the server here rather than failing every request
    let config = Config::from_env()?;
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    let analyzer = MatchAnalyzer::from_config(&config)?;
    info!(
        model = %config.gemini.model,
        policy = %analyzer.policy(),
        fixtures = analyzer.has_fixture_provider(),
        "Match analyzer ready"
    );

    let app = routes::router(Arc::new(analyzer));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("Starting web server at http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
