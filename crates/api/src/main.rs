use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fitplan_api::background::job_watchdog;
use fitplan_api::config::ServerConfig;
use fitplan_api::engine::generator::TemplatePlanGenerator;
use fitplan_api::engine::plans::{InMemoryPlanStore, PgPlanStore, PlanStore};
use fitplan_api::engine::store::InMemoryJobStore;
use fitplan_api::engine::JobController;
use fitplan_api::router::build_app_router;
use fitplan_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fitplan_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        step_delay_ms = config.generation.step_delay.as_millis() as u64,
        "Loaded server configuration"
    );

    // --- Plan persistence ---
    let plans: Arc<dyn PlanStore> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = fitplan_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            fitplan_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            fitplan_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgPlanStore::new(pool))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, generated plans are kept in memory");
            Arc::new(InMemoryPlanStore::new())
        }
    };

    // --- Job controller ---
    let controller = Arc::new(JobController::new(
        Arc::new(InMemoryJobStore::new()),
        plans,
        Arc::new(TemplatePlanGenerator),
        config.generation.step_delay,
    ));

    // --- Watchdog ---
    let watchdog_cancel = CancellationToken::new();
    let watchdog_handle = config.generation.max_duration.map(|max_duration| {
        tokio::spawn(job_watchdog::run(
            Arc::clone(&controller),
            max_duration,
            config.generation.watchdog_interval,
            watchdog_cancel.clone(),
        ))
    });

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        controller: Arc::clone(&controller),
    };
    let app = build_app_router(state);

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

    watchdog_cancel.cancel();
    if let Some(handle) = watchdog_handle {
        let _ = tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), handle)
            .await;
    }

    controller.shutdown().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
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
