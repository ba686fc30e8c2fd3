use std::sync::Arc;

use primejobs_db::JobStore;
use primejobs_worker::JobScheduler;

use crate::config::ServerConfig;
use crate::engine::gateway::RequestGateway;
use crate::engine::status::StatusQuery;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Job persistence backend.
    pub store: Arc<dyn JobStore>,
    /// Local worker pool.
    pub scheduler: Arc<JobScheduler>,
    /// Admission of new jobs.
    pub gateway: RequestGateway,
    /// Read-only job status.
    pub status: StatusQuery,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>, scheduler: Arc<JobScheduler>, config: ServerConfig) -> Self {
        let gateway = RequestGateway::new(
            Arc::clone(&store),
            Arc::clone(&scheduler),
            config.max_primes_per_request,
        );
        let status = StatusQuery::new(Arc::clone(&store));
        Self {
            store,
            scheduler,
            gateway,
            status,
            config: Arc::new(config),
        }
    }
}
