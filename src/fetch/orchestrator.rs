//! Fetch orchestration: cache, budget, network, write-back
//!
//! For every logical request the orchestrator decides whether to serve
//! from cache, refuse because the call budget is spent, or go to the
//! network. Concurrent non-forced requests for the same fingerprint share
//! a single in-flight call, and a per-fingerprint sequence number keeps a
//! late-arriving older response from clobbering a newer cache entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use serde_json::Value;

use crate::cache::{CacheManager, CacheStats};
use crate::error::AcquireError;
use crate::fetch::api::{CityMatch, WeatherApi};
use crate::fetch::request::{fingerprint, RequestKind, Subject};
use crate::limiter::RateLimiter;

/// Resolved outcome of an acquire, identical in shape for cache hits and
/// network responses so callers never branch on the source
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Raw upstream payload
    pub data: Value,
    /// Whether the payload came from the cache
    pub came_from_cache: bool,
    /// Age of the payload in whole seconds (0 for a network response)
    pub age_seconds: u64,
}

type SharedFetch = Shared<BoxFuture<'static, Result<FetchResult, AcquireError>>>;

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

#[derive(Debug, Default, Clone, Copy)]
struct SequenceState {
    /// Sequence number handed to the most recently issued call
    issued: u64,
    /// Sequence number of the last response written to the cache
    accepted: u64,
}

/// Decides, per request, between cache, waiting and the network
///
/// Cheap to clone; all state is shared behind `Arc`s so every consumer
/// sees the same cache, the same budget and the same in-flight calls.
#[derive(Clone)]
pub struct Orchestrator {
    api: Arc<dyn WeatherApi>,
    cache: CacheManager,
    limiter: Arc<RateLimiter>,
    inflight: Arc<Mutex<HashMap<String, InFlight>>>,
    sequences: Arc<Mutex<HashMap<String, SequenceState>>>,
    next_inflight_id: Arc<Mutex<u64>>,
}

impl Orchestrator {
    /// Wires an orchestrator over the given API client, cache and limiter
    pub fn new(api: Arc<dyn WeatherApi>, cache: CacheManager, limiter: Arc<RateLimiter>) -> Self {
        Self {
            api,
            cache,
            limiter,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            sequences: Arc::new(Mutex::new(HashMap::new())),
            next_inflight_id: Arc::new(Mutex::new(0)),
        }
    }

    /// Resolves one logical request
    ///
    /// Non-forced requests are answered from a fresh cache entry without
    /// consulting the rate limiter; a miss or stale entry goes to the
    /// network, sharing any call already in flight for the same
    /// fingerprint. A forced request always attempts its own network call,
    /// subject only to the limiter, and deliberately ignores any stale
    /// cached value.
    pub async fn acquire(
        &self,
        kind: RequestKind,
        subject: Subject,
        force_refresh: bool,
    ) -> Result<FetchResult, AcquireError> {
        let key = fingerprint(kind, &subject);

        if !force_refresh {
            if let Some(hit) = self.cache.get(&key) {
                return Ok(FetchResult {
                    data: hit.payload,
                    came_from_cache: true,
                    age_seconds: hit.age_seconds,
                });
            }
            return self.coalesced_fetch(kind, subject, key).await;
        }

        self.network_fetch_task(kind, subject, key).await
    }

    /// Joins or starts the single in-flight call for `key`
    async fn coalesced_fetch(
        &self,
        kind: RequestKind,
        subject: Subject,
        key: String,
    ) -> Result<FetchResult, AcquireError> {
        let (fetch, leader_id) = {
            let mut inflight = self.inflight.lock().unwrap();
            if let Some(existing) = inflight.get(&key) {
                debug!("joining in-flight fetch for {}", key);
                (existing.fetch.clone(), None)
            } else {
                let id = {
                    let mut next = self.next_inflight_id.lock().unwrap();
                    *next += 1;
                    *next
                };
                let fetch = self
                    .network_fetch_task(kind, subject, key.clone())
                    .boxed()
                    .shared();
                inflight.insert(
                    key.clone(),
                    InFlight {
                        id,
                        fetch: fetch.clone(),
                    },
                );
                (fetch, Some(id))
            }
        };

        let result = fetch.await;

        // Only the task that registered the entry may retire it; a follower
        // finishing late must not evict a newer in-flight call.
        if let Some(id) = leader_id {
            let mut inflight = self.inflight.lock().unwrap();
            if inflight.get(&key).is_some_and(|entry| entry.id == id) {
                inflight.remove(&key);
            }
        }

        result
    }

    /// Builds the limiter-check + network-call + write-back future
    ///
    /// `'static` so it can be shared between coalesced callers; it
    /// captures clones of the handles it needs rather than `self`.
    fn network_fetch_task(
        &self,
        kind: RequestKind,
        subject: Subject,
        key: String,
    ) -> impl std::future::Future<Output = Result<FetchResult, AcquireError>> + Send + 'static {
        let api = self.api.clone();
        let cache = self.cache.clone();
        let limiter = self.limiter.clone();
        let sequences = self.sequences.clone();

        async move {
            if !limiter.admit() {
                return Err(AcquireError::BudgetExhausted);
            }

            let seq = {
                let mut sequences = sequences.lock().unwrap();
                let state = sequences.entry(key.clone()).or_default();
                state.issued += 1;
                state.issued
            };

            // A failure leaves the cache untouched: a failed refresh must
            // not erase a still-useful stale entry.
            let payload = api.fetch(kind, &subject).await?;

            let accepted = {
                let mut sequences = sequences.lock().unwrap();
                let state = sequences.entry(key.clone()).or_default();
                if seq >= state.accepted {
                    state.accepted = seq;
                    true
                } else {
                    false
                }
            };
            if accepted {
                cache.put(&key, &payload);
            } else {
                debug!("discarding out-of-order response for {}", key);
            }

            Ok(FetchResult {
                data: payload,
                came_from_cache: false,
                age_seconds: 0,
            })
        }
    }

    /// Current conditions for a city
    pub async fn fetch_current(
        &self,
        city: &str,
        force_refresh: bool,
    ) -> Result<FetchResult, AcquireError> {
        self.acquire(
            RequestKind::Current,
            Subject::City(city.to_string()),
            force_refresh,
        )
        .await
    }

    /// 5-day forecast for a city
    pub async fn fetch_forecast(
        &self,
        city: &str,
        force_refresh: bool,
    ) -> Result<FetchResult, AcquireError> {
        self.acquire(
            RequestKind::Forecast,
            Subject::City(city.to_string()),
            force_refresh,
        )
        .await
    }

    /// City search by name prefix
    ///
    /// Queries shorter than two characters return no results without
    /// touching the cache or the call budget.
    pub async fn search_cities(&self, query: &str) -> Result<Vec<CityMatch>, AcquireError> {
        let query = query.trim();
        if query.chars().count() < 2 {
            return Ok(Vec::new());
        }
        let result = self
            .acquire(RequestKind::Search, Subject::Query(query.to_string()), false)
            .await?;
        serde_json::from_value(result.data)
            .map_err(|e| AcquireError::Transport(format!("invalid cached search results: {}", e)))
    }

    /// Current conditions at a latitude/longitude
    pub async fn fetch_by_coords(
        &self,
        lat: f64,
        lon: f64,
        force_refresh: bool,
    ) -> Result<FetchResult, AcquireError> {
        self.acquire(
            RequestKind::Coordinates,
            Subject::Coords { lat, lon },
            force_refresh,
        )
        .await
    }

    /// Age of the cached entry for `(kind, subject)`, fresh or stale
    pub fn cache_age_seconds(&self, kind: RequestKind, subject: &Subject) -> Option<u64> {
        self.cache.age_seconds(&fingerprint(kind, subject))
    }

    /// Last known payload for `(kind, subject)` even past its TTL, for
    /// fallback display when a refresh fails
    pub fn last_known(&self, kind: RequestKind, subject: &Subject) -> Option<FetchResult> {
        let hit = self.cache.get_any(&fingerprint(kind, subject))?;
        Some(FetchResult {
            data: hit.payload,
            came_from_cache: true,
            age_seconds: hit.age_seconds,
        })
    }

    /// Empties the cache
    pub fn clear_all(&self) {
        self.cache.invalidate_all();
    }

    /// Cache occupancy counts
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
