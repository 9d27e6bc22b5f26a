// Feedline Server - JSON API for posts, timelines and notifications

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use feedline::{
    api::create_api_router, app_state::AppState, config::Config,
    infrastructure::VerificationSweeper,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedline=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    // Initialized before the listener accepts connections.
    let app_state = AppState::new(config.clone()).await?;
    let sweeper = VerificationSweeper::start(app_state.db.clone(), &config.sweeper);

    let app = create_api_router(app_state.clone());

    let addr = config.server_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Feedline listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down: stopping sweeper and draining background jobs");
    sweeper.stop().await;
    app_state.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
