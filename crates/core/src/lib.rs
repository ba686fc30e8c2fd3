//! Domain types for the prime-number job service.
//!
//! Nothing in this crate performs I/O: the job record and its transition
//! rules, the prime computation, and the shared error type live here so the
//! store, scheduler and HTTP layers agree on one definition.

pub mod error;
pub mod job;
pub mod job_status;
pub mod primes;
pub mod types;
