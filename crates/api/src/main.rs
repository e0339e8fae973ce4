use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reina_simulation::SeirModel;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reina_api::background::sweeper;
use reina_api::config::ServerConfig;
use reina_api::router::build_app_router;
use reina_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "reina_api=debug,reina_worker=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid configuration");
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Simulation ---
    let simulation = Arc::new(
        SeirModel::new().with_pace(Duration::from_millis(config.simulation_pace_ms)),
    );

    // --- App state ---
    let state = AppState::new(config.clone(), simulation);
    tracing::info!(
        ttl_secs = config.jobs.cache_ttl.as_secs(),
        publish_interval_ms = config.jobs.publish_interval.as_millis() as u64,
        restricted = config.jobs.restrict_to_preset_scenarios,
        "Job service ready"
    );

    // --- Housekeeping ---
    let sweep_cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(sweeper::run(
        Arc::clone(&state.cache),
        Arc::clone(&state.sessions),
        Arc::clone(&state.launcher),
        Duration::from_secs(config.sweep_interval_secs),
        Duration::from_secs(config.session_idle_secs),
        sweep_cancel.clone(),
    ));

    // --- Router ---
    let app = build_app_router(state.clone(), &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweep_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;
    tracing::info!("Sweeper stopped");

    let drained = state
        .launcher
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    tracing::info!(drained, "Workers stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
