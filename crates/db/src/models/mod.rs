//! Database row types and query DTOs.

pub mod job;
