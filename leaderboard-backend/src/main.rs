use leaderboard_backend::{config::Config, create_app};
use leaderboard_db::Database;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting leaderboard backend server...");

    let config = Config::from_env()?;
    tracing::info!(
        "Configuration: port={}, db_path={}, body_limit={}KB, timeout={}s, token_ttl={}s",
        config.port,
        config.database_path,
        config.request_body_limit / 1024,
        config.request_timeout.as_secs(),
        config.token_ttl.as_secs()
    );
    tracing::info!(
        origins = ?config.allowed_origins,
        protected = ?config.protected_routes,
        "Access policy"
    );

    // One handle for the whole process, shared by every request
    let db = Database::open(&config.database_path).await?;
    let app = create_app(db.clone(), &config);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = &served {
        tracing::error!("Axum server error: {}", e);
    }

    db.close().await?;
    tracing::info!("Server stopped");
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
