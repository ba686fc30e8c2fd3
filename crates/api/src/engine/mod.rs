//! Request-facing job operations.
//!
//! [`gateway::RequestGateway`] admits new jobs and hands them to the local
//! scheduler; [`status::StatusQuery`] reads them back. Neither ever waits
//! for a computation.

pub mod gateway;
pub mod status;
