//! Data acquisition: request identity, API client and orchestration
//!
//! The orchestrator is the single entry point callers use; it consults the
//! cache and the rate limiter, performs the network call through the
//! `WeatherApi` seam when needed, and writes results back.

mod api;
mod orchestrator;
mod request;

pub use api::{CityMatch, OpenWeatherClient, WeatherApi};
pub use orchestrator::{FetchResult, Orchestrator};
pub use request::{fingerprint, RequestKind, Subject};
