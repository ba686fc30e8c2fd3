use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use primejobs_core::primes::TrialDivision;
use primejobs_db::{JobStore, MemoryJobStore, PgJobStore};
use primejobs_worker::{telemetry, JobScheduler, PollerConfig, QueuedJobPoller, SchedulerConfig};
use tokio_util::sync::CancellationToken;

use primejobs_api::background;
use primejobs_api::config::{ServerConfig, StoreKind};
use primejobs_api::router::build_app_router;
use primejobs_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    telemetry::init("primejobs_api=debug,primejobs_worker=debug,primejobs_db=info,tower_http=debug");

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let scheduler_config = SchedulerConfig::from_env();
    let poller_config = PollerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        store = ?config.store,
        max_primes = config.max_primes_per_request,
        "Loaded server configuration",
    );

    // --- Job store ---
    let store: Arc<dyn JobStore> = match config.store {
        StoreKind::Postgres => {
            let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

            let pool = primejobs_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            primejobs_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            primejobs_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgJobStore::new(pool))
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory job store; jobs are lost on restart");
            Arc::new(MemoryJobStore::new())
        }
    };

    // --- Scheduler ---
    let scheduler = Arc::new(JobScheduler::start(
        Arc::clone(&store),
        Arc::new(TrialDivision),
        scheduler_config,
    ));

    // --- Background tasks ---
    let background_cancel = CancellationToken::new();

    let poller = QueuedJobPoller::new(Arc::clone(&store), Arc::clone(&scheduler), poller_config);
    let poller_cancel = background_cancel.clone();
    let poller_handle = tokio::spawn(async move { poller.run(poller_cancel).await });

    let stuck_handle = config.stuck_job_timeout.map(|timeout| {
        tokio::spawn(background::stuck_jobs::run(
            Arc::clone(&store),
            Arc::clone(&scheduler),
            timeout,
            background_cancel.clone(),
        ))
    });

    // --- App state and router ---
    let state = AppState::new(Arc::clone(&store), Arc::clone(&scheduler), config.clone());
    let app = build_app_router(state, &config);

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
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    background_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), poller_handle).await;
    if let Some(handle) = stuck_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    tracing::info!("Background tasks stopped");

    scheduler
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;

    tracing::info!("Graceful shutdown complete");
}
