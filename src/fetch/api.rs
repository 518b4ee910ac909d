//! OpenWeatherMap HTTP client
//!
//! Talks to the current-weather, forecast and geocoding endpoints and
//! classifies failures: a non-success response with a message becomes an
//! upstream error surfaced verbatim, anything that never produced a
//! response becomes a generic transport error. The client sits behind the
//! `WeatherApi` trait so the orchestrator can be tested against a fake.

use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AcquireError;
use crate::fetch::request::{RequestKind, Subject};

/// Default base URL for weather and forecast endpoints
const DEFAULT_API_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Default base URL for the geocoding (city search) endpoint
const DEFAULT_GEO_BASE_URL: &str = "https://api.openweathermap.org/geo/1.0";

/// Maximum rows requested from the city search endpoint
const SEARCH_RESULT_LIMIT: u32 = 5;

/// One city returned by the search endpoint, formatted for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityMatch {
    pub name: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub lat: f64,
    pub lon: f64,
    /// Human-readable label, e.g. "Portland, Oregon, US"
    pub display: String,
}

/// Raw row from the geocoding endpoint
#[derive(Debug, Deserialize)]
struct GeoRow {
    name: String,
    country: String,
    state: Option<String>,
    lat: f64,
    lon: f64,
}

impl From<GeoRow> for CityMatch {
    fn from(row: GeoRow) -> Self {
        let display = match &row.state {
            Some(state) => format!("{}, {}, {}", row.name, state, row.country),
            None => format!("{}, {}", row.name, row.country),
        };
        CityMatch {
            name: row.name,
            country: row.country,
            state: row.state,
            lat: row.lat,
            lon: row.lon,
            display,
        }
    }
}

/// Network-facing seam of the acquisition core
///
/// One method per logical request; the payload is the raw upstream JSON
/// (search results are pre-mapped to [`CityMatch`] rows, matching what
/// gets cached).
#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn fetch(&self, kind: RequestKind, subject: &Subject) -> Result<Value, AcquireError>;
}

/// Client for the OpenWeatherMap API
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    api_base_url: String,
    geo_base_url: String,
}

impl OpenWeatherClient {
    /// Creates a client with the production endpoint URLs
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            geo_base_url: DEFAULT_GEO_BASE_URL.to_string(),
        }
    }

    /// Overrides the weather/forecast base URL (tests, proxies)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Overrides the geocoding base URL (tests, proxies)
    pub fn with_geo_base_url(mut self, url: impl Into<String>) -> Self {
        self.geo_base_url = url.into();
        self
    }

    /// Sends a GET and classifies the outcome per the error taxonomy
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, AcquireError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| AcquireError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AcquireError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(AcquireError::Upstream(upstream_message(&body, status)));
        }

        serde_json::from_str(&body)
            .map_err(|e| AcquireError::Transport(format!("invalid JSON in response: {}", e)))
    }
}

/// Extracts the API's `message` field from an error body, falling back to
/// the HTTP status when the body carries none
fn upstream_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("Request failed with status {}", status))
}

#[async_trait]
impl WeatherApi for OpenWeatherClient {
    async fn fetch(&self, kind: RequestKind, subject: &Subject) -> Result<Value, AcquireError> {
        match (kind, subject) {
            (RequestKind::Current, Subject::City(city)) => {
                info!("fetching current weather for {} from API", city);
                let url = format!("{}/weather", self.api_base_url);
                self.get_json(
                    &url,
                    &[
                        ("q", city.clone()),
                        ("appid", self.api_key.clone()),
                        ("units", "metric".to_string()),
                    ],
                )
                .await
            }
            (RequestKind::Forecast, Subject::City(city)) => {
                info!("fetching forecast for {} from API", city);
                let url = format!("{}/forecast", self.api_base_url);
                self.get_json(
                    &url,
                    &[
                        ("q", city.clone()),
                        ("appid", self.api_key.clone()),
                        ("units", "metric".to_string()),
                    ],
                )
                .await
            }
            (RequestKind::Search, Subject::Query(query)) => {
                info!("searching for cities: {}", query);
                let url = format!("{}/direct", self.geo_base_url);
                let raw = self
                    .get_json(
                        &url,
                        &[
                            ("q", query.clone()),
                            ("limit", SEARCH_RESULT_LIMIT.to_string()),
                            ("appid", self.api_key.clone()),
                        ],
                    )
                    .await?;
                let rows: Vec<GeoRow> = serde_json::from_value(raw)
                    .map_err(|e| AcquireError::Transport(format!("invalid search response: {}", e)))?;
                let matches: Vec<CityMatch> = rows.into_iter().map(CityMatch::from).collect();
                serde_json::to_value(matches)
                    .map_err(|e| AcquireError::Transport(e.to_string()))
            }
            (RequestKind::Coordinates, Subject::Coords { lat, lon }) => {
                info!("fetching weather for coords ({}, {}) from API", lat, lon);
                let url = format!("{}/weather", self.api_base_url);
                self.get_json(
                    &url,
                    &[
                        ("lat", lat.to_string()),
                        ("lon", lon.to_string()),
                        ("appid", self.api_key.clone()),
                        ("units", "metric".to_string()),
                    ],
                )
                .await
            }
            (kind, subject) => Err(AcquireError::Upstream(format!(
                "unsupported request: {} for {:?}",
                kind, subject
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_match_display_with_state() {
        let row = GeoRow {
            name: "Portland".to_string(),
            country: "US".to_string(),
            state: Some("Oregon".to_string()),
            lat: 45.5,
            lon: -122.6,
        };
        let city = CityMatch::from(row);
        assert_eq!(city.display, "Portland, Oregon, US");
    }

    #[test]
    fn test_city_match_display_without_state() {
        let row = GeoRow {
            name: "Paris".to_string(),
            country: "FR".to_string(),
            state: None,
            lat: 48.85,
            lon: 2.35,
        };
        let city = CityMatch::from(row);
        assert_eq!(city.display, "Paris, FR");
    }

    #[test]
    fn test_upstream_message_prefers_api_message() {
        let body = r#"{"cod":"404","message":"city not found"}"#;
        let msg = upstream_message(body, reqwest::StatusCode::NOT_FOUND);
        assert_eq!(msg, "city not found");
    }

    #[test]
    fn test_upstream_message_falls_back_to_status() {
        let msg = upstream_message("<html>oops</html>", reqwest::StatusCode::BAD_GATEWAY);
        assert!(msg.contains("502"));
    }

    #[test]
    fn test_city_match_survives_cache_roundtrip() {
        let city = CityMatch {
            name: "Paris".to_string(),
            country: "FR".to_string(),
            state: None,
            lat: 48.85,
            lon: 2.35,
            display: "Paris, FR".to_string(),
        };
        let value = serde_json::to_value(vec![city.clone()]).unwrap();
        let back: Vec<CityMatch> = serde_json::from_value(value).unwrap();
        assert_eq!(back, vec![city]);
    }
}
