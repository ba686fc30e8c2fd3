use std::time::Duration;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of concurrent worker tasks (default: available parallelism).
    pub worker_count: usize,
    /// Jobs that may wait in the queue before `submit` reports it full (default: `1024`).
    pub queue_capacity: usize,
    /// Time running jobs get to finish on shutdown before being cancelled (default: `30`s).
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            queue_capacity: 1024,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                   |
    /// |-------------------------|---------------------------|
    /// | `WORKER_COUNT`          | available parallelism     |
    /// | `JOB_QUEUE_CAPACITY`    | `1024`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                      |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let worker_count: usize = std::env::var("WORKER_COUNT")
            .map(|v| v.parse().expect("WORKER_COUNT must be a valid usize"))
            .unwrap_or(defaults.worker_count);

        let queue_capacity: usize = std::env::var("JOB_QUEUE_CAPACITY")
            .map(|v| v.parse().expect("JOB_QUEUE_CAPACITY must be a valid usize"))
            .unwrap_or(defaults.queue_capacity);

        let shutdown_grace = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .map(|v| {
                Duration::from_secs(v.parse().expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64"))
            })
            .unwrap_or(defaults.shutdown_grace);

        Self {
            worker_count,
            queue_capacity,
            shutdown_grace,
        }
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Settings for [`QueuedJobPoller`](crate::poller::QueuedJobPoller).
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between polls (default: `5`s).
    pub interval: Duration,
    /// Only jobs queued at least this long are picked up (default: `10`s).
    pub min_age: Duration,
    /// Maximum jobs submitted per poll (default: `100`).
    pub batch_size: i64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            min_age: Duration::from_secs(10),
            batch_size: 100,
        }
    }
}

impl PollerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default |
    /// |----------------------|---------|
    /// | `POLL_INTERVAL_SECS` | `5`     |
    /// | `POLL_MIN_AGE_SECS`  | `10`    |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let interval = std::env::var("POLL_INTERVAL_SECS")
            .map(|v| Duration::from_secs(v.parse().expect("POLL_INTERVAL_SECS must be a valid u64")))
            .unwrap_or(defaults.interval);

        let min_age = std::env::var("POLL_MIN_AGE_SECS")
            .map(|v| Duration::from_secs(v.parse().expect("POLL_MIN_AGE_SECS must be a valid u64")))
            .unwrap_or(defaults.min_age);

        Self {
            interval,
            min_age,
            ..defaults
        }
    }
}
