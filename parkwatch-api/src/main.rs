//! parkwatch-api - Parking occupancy service
//!
//! Serves the parking lot CRUD/trigger API and, once the listener is up,
//! fires the configured ingestion pipelines in the background. Startup is
//! never blocked on an ingestion run.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parkwatch_api::services::IngestOrchestrator;
use parkwatch_api::{build_router, config::AppConfig, AppState};

/// Command-line arguments for parkwatch-api
#[derive(Parser, Debug)]
#[command(name = "parkwatch-api")]
#[command(about = "Parking occupancy ingestion and CRUD service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5780", env = "PARKWATCH_PORT")]
    port: u16,

    /// Path to the sqlite database
    #[arg(short, long, env = "PARKWATCH_DB")]
    db_path: Option<String>,

    /// Optional TOML config file
    #[arg(short, long, env = "PARKWATCH_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parkwatch_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting parkwatch-api");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let db_path =
        parkwatch_common::config::resolve_database_path(args.db_path.as_deref(), "PARKWATCH_DB");
    info!("Database: {}", db_path.display());

    let db_pool = parkwatch_api::db::init_database_pool(&db_path)
        .await
        .context("Failed to initialize database")?;

    let config = Arc::new(AppConfig::load(args.config.as_deref())?);
    let state = AppState::new(db_pool, config);

    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);

    // Fire-and-forget startup runs, scheduled only after the listener is
    // bound so readiness never waits on an ingestion run.
    schedule_startup_runs(&state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Spawn the enabled auto-run pipelines as detached background tasks.
///
/// Each task has its own error sink: failures land in the log and the
/// health endpoint's last_error, never in the server task. No cancellation
/// is wired up; a started run proceeds to its terminal state.
fn schedule_startup_runs(state: &AppState) {
    if state.config.counter.auto_run {
        let state = state.clone();
        tokio::spawn(async move {
            let orchestrator = IngestOrchestrator::new(state.db.clone(), state.config.clone());
            let outcomes = orchestrator.run_counter().await;
            record_failures(&state, &outcomes).await;
        });
        info!("Counter auto-run scheduled in background");
    } else {
        info!("Counter auto-run disabled");
    }

    if state.config.vision.auto_run {
        let state = state.clone();
        tokio::spawn(async move {
            let orchestrator = IngestOrchestrator::new(state.db.clone(), state.config.clone());
            let outcome = orchestrator.run_vision().await;
            record_failures(&state, std::slice::from_ref(&outcome)).await;
        });
        info!("Vision auto-run scheduled in background");
    } else {
        info!("Vision auto-run disabled");
    }
}

/// Keep the most recent background failure visible to /health
async fn record_failures(state: &AppState, outcomes: &[parkwatch_api::models::TargetOutcome]) {
    for outcome in outcomes {
        if let parkwatch_api::models::TargetOutcome::Failed {
            parking_name,
            error: err,
        } = outcome
        {
            error!(parking_name = %parking_name, error = %err, "Background ingestion run failed");
            let mut last_error = state.last_error.write().await;
            *last_error = Some(format!("{}: {}", parking_name, err));
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
