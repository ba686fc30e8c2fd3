//! Standalone worker: executes QUEUED jobs found in the shared database.
//!
//! Runs alongside one or more API processes. It never accepts submissions
//! itself; everything it runs comes from [`QueuedJobPoller`].

use std::sync::Arc;

use anyhow::Context;
use primejobs_core::primes::TrialDivision;
use primejobs_db::{JobStore, PgJobStore};
use primejobs_worker::{telemetry, JobScheduler, PollerConfig, QueuedJobPoller, SchedulerConfig};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init("primejobs_worker=debug,primejobs_db=info");

    let scheduler_config = SchedulerConfig::from_env();
    let poller_config = PollerConfig::from_env();
    let grace = scheduler_config.shutdown_grace;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = primejobs_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    primejobs_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    primejobs_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool));
    let scheduler = Arc::new(JobScheduler::start(
        Arc::clone(&store),
        Arc::new(TrialDivision),
        scheduler_config,
    ));

    let poller = QueuedJobPoller::new(store, Arc::clone(&scheduler), poller_config);
    let cancel = CancellationToken::new();
    let poller_cancel = cancel.clone();
    let poller_handle = tokio::spawn(async move { poller.run(poller_cancel).await });

    telemetry::shutdown_signal().await;

    cancel.cancel();
    poller_handle.await.context("Poller task panicked")?;
    scheduler.shutdown(grace).await;

    tracing::info!("Worker shut down");
    Ok(())
}
