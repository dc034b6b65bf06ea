//! Glyphgate API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use glyphgate_api::config::ServerConfig;
use glyphgate_api::engine::ProcessEngineLauncher;
use glyphgate_api::error::AppError;
use glyphgate_api::state::AppState;
use glyphgate_core::clock::SystemClock;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Glyphgate session server");

    // Read configuration from environment.
    let config = ServerConfig::from_env()?;
    tracing::info!(
        engine = %config.engine_program,
        inventory_window = config.session.inventory_window,
        "engine configured"
    );

    // Build application state.
    let launcher =
        ProcessEngineLauncher::new(config.engine_program.clone(), config.engine_args.clone());
    let app_state = AppState::new(
        config.session.clone(),
        Arc::new(SystemClock),
        Arc::new(launcher),
    );

    let app = glyphgate_api::build_router(app_state);

    // Start server.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
