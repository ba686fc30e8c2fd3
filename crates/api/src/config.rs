use std::time::Duration;

/// Which [`JobStore`](primejobs_db::JobStore) backend the server uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// PostgreSQL via `DATABASE_URL`.
    Postgres,
    /// In-process memory; jobs are lost on restart.
    Memory,
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Job store backend (default: `postgres`).
    pub store: StoreKind,
    /// Largest `no_of_primes` a single request may ask for (default: `100000`).
    pub max_primes_per_request: u32,
    /// Fail RUNNING jobs with no live local worker after this long.
    /// Disabled when unset.
    pub stuck_job_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                    |
    /// |--------------------------|----------------------------|
    /// | `HOST`                   | `0.0.0.0`                  |
    /// | `PORT`                   | `3000`                     |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                       |
    /// | `JOB_STORE`              | `postgres`                 |
    /// | `MAX_PRIMES_PER_REQUEST` | `100000`                   |
    /// | `STUCK_JOB_TIMEOUT_SECS` | unset (reconciler off)     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let store = match std::env::var("JOB_STORE")
            .unwrap_or_else(|_| "postgres".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StoreKind::Postgres,
            "memory" => StoreKind::Memory,
            other => panic!("JOB_STORE must be 'postgres' or 'memory', got '{other}'"),
        };

        let max_primes_per_request: u32 = std::env::var("MAX_PRIMES_PER_REQUEST")
            .unwrap_or_else(|_| "100000".into())
            .parse()
            .expect("MAX_PRIMES_PER_REQUEST must be a valid u32");

        let stuck_job_timeout = std::env::var("STUCK_JOB_TIMEOUT_SECS").ok().map(|v| {
            Duration::from_secs(v.parse().expect("STUCK_JOB_TIMEOUT_SECS must be a valid u64"))
        });

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            store,
            max_primes_per_request,
            stuck_job_timeout,
        }
    }
}
