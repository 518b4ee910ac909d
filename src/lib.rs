//! Skycast library
//!
//! The weather data-acquisition core: a TTL cache over durable storage, a
//! process-wide call-budget limiter, a fetch orchestrator and a
//! visibility-aware refresh scheduler. The binary in `main.rs` and the
//! integration tests are thin consumers of these modules.

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;
pub mod limiter;
pub mod scheduler;
