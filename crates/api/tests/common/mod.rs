#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use primejobs_core::primes::{ComputeError, PrimeComputer, TrialDivision};
use primejobs_db::{JobStore, MemoryJobStore};
use primejobs_worker::{JobScheduler, SchedulerConfig};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use primejobs_api::config::{ServerConfig, StoreKind};
use primejobs_api::router::build_app_router;
use primejobs_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and the in-memory store.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        store: StoreKind::Memory,
        max_primes_per_request: 10_000,
        stuck_job_timeout: None,
    }
}

/// A router wired to a memory store and a live scheduler.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryJobStore>,
    pub scheduler: Arc<JobScheduler>,
}

impl TestApp {
    /// A fresh handle to the router for one `oneshot` request.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Cancel anything still running so blocking computations end.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown(Duration::ZERO).await;
    }
}

/// Build the full application with the reference computer.
pub fn build_test_app() -> TestApp {
    build_test_app_with(Arc::new(TrialDivision), test_config())
}

/// Build the full application through the same [`build_app_router`] as
/// `main.rs`, so tests exercise the production middleware stack.
pub fn build_test_app_with(computer: Arc<dyn PrimeComputer>, config: ServerConfig) -> TestApp {
    let store = Arc::new(MemoryJobStore::new());
    let scheduler = Arc::new(JobScheduler::start(
        store.clone() as Arc<dyn JobStore>,
        computer,
        SchedulerConfig {
            worker_count: 1,
            queue_capacity: 16,
            shutdown_grace: Duration::ZERO,
        },
    ));
    let state = AppState::new(
        store.clone() as Arc<dyn JobStore>,
        Arc::clone(&scheduler),
        config.clone(),
    );

    TestApp {
        router: build_app_router(state, &config),
        store,
        scheduler,
    }
}

/// Spins until cancelled, counting how many computations started.
#[derive(Default)]
pub struct BlockingComputer {
    pub started: AtomicUsize,
}

impl PrimeComputer for BlockingComputer {
    fn compute_primes(&self, _: u32, cancel: &CancellationToken) -> Result<Vec<u64>, ComputeError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(2));
        }
        Err(ComputeError::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Submit a job over HTTP and return its `request_id`.
pub async fn submit(app: Router, no_of_primes: i64) -> String {
    let response = post_json(
        app,
        "/api/v1/jobs",
        serde_json::json!({ "no_of_primes": no_of_primes }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["request_id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Poll the status endpoint until the job's status is `status`.
pub async fn wait_for_status(app: &Router, request_id: &str, status: &str) -> serde_json::Value {
    let uri = format!("/api/v1/jobs/{request_id}");
    let poll = async {
        loop {
            let response = get(app.clone(), &uri).await;
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            if json["status"] == status {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(10), poll)
        .await
        .unwrap_or_else(|_| panic!("job {request_id} never reached {status}"))
}

/// Wait until `cond` holds, polling every few milliseconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}
