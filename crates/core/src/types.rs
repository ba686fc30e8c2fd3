/// Job primary keys are random UUIDs, exposed to clients as `request_id`.
pub type JobId = uuid::Uuid;

/// Opaque reference to the execution handle that claimed a job.
pub type WorkerRef = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
