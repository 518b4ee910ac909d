//! End-to-end scenarios for the acquisition core
//!
//! Exercises the orchestrator, cache, limiter and scheduler together with
//! a scripted API client, a hand-advanced clock and (where durability
//! matters) a real on-disk store in a temp directory.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Value};
use tempfile::TempDir;

use skycast::cache::{CacheManager, DiskStore, MemoryStore, CACHE_TTL_MS};
use skycast::clock::ManualClock;
use skycast::error::AcquireError;
use skycast::fetch::{Orchestrator, RequestKind, Subject, WeatherApi};
use skycast::limiter::{RateLimiter, MAX_CALLS_PER_WINDOW};
use skycast::scheduler::{RefreshCallback, Scheduler, VisibilityGate};

/// Scripted API client: each call pops the next outcome
struct ScriptedApi {
    script: Mutex<VecDeque<Result<Value, AcquireError>>>,
    calls: AtomicUsize,
}

impl ScriptedApi {
    fn new(outcomes: Vec<Result<Value, AcquireError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherApi for ScriptedApi {
    async fn fetch(&self, _kind: RequestKind, _subject: &Subject) -> Result<Value, AcquireError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedApi ran out of scripted responses")
    }
}

fn core_with(
    api: ScriptedApi,
) -> (Orchestrator, Arc<ScriptedApi>, Arc<RateLimiter>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let cache = CacheManager::new(Arc::new(MemoryStore::new()), clock.clone());
    let limiter = Arc::new(RateLimiter::new(clock.clone()));
    let api = Arc::new(api);
    let orchestrator = Orchestrator::new(api.clone(), cache, limiter.clone());
    (orchestrator, api, limiter, clock)
}

#[tokio::test]
async fn thirty_second_old_entry_is_served_from_cache_with_its_age() {
    let (orchestrator, api, limiter, clock) =
        core_with(ScriptedApi::new(vec![Ok(json!({"name": "London", "main": {"temp": 14.0}}))]));

    orchestrator.fetch_current("London", false).await.unwrap();
    clock.advance_millis(30_000);

    let result = orchestrator.fetch_current("London", false).await.unwrap();

    assert!(result.came_from_cache);
    assert_eq!(result.age_seconds, 30);
    assert_eq!(api.call_count(), 1);
    assert_eq!(limiter.current_count(), 1);
}

#[tokio::test]
async fn exhausted_budget_fails_forced_refresh_and_preserves_cache() {
    let (orchestrator, _api, limiter, _clock) =
        core_with(ScriptedApi::new(vec![Ok(json!({"name": "Tokyo", "main": {"temp": 28.0}}))]));

    orchestrator.fetch_current("Tokyo", false).await.unwrap();
    while limiter.admit() {}
    assert_eq!(limiter.current_count(), MAX_CALLS_PER_WINDOW);

    let err = orchestrator.fetch_current("Tokyo", true).await.unwrap_err();

    assert_eq!(err, AcquireError::BudgetExhausted);
    let cached = orchestrator
        .last_known(RequestKind::Current, &Subject::City("Tokyo".to_string()))
        .expect("Cache entry must be unchanged");
    assert_eq!(cached.data, json!({"name": "Tokyo", "main": {"temp": 28.0}}));
}

#[tokio::test]
async fn budget_recovers_after_window_rollover() {
    let (orchestrator, _api, limiter, clock) = core_with(ScriptedApi::new(vec![
        Ok(json!({"attempt": 1})),
        Ok(json!({"attempt": 2})),
    ]));

    orchestrator.fetch_current("Oslo", false).await.unwrap();
    while limiter.admit() {}
    assert!(orchestrator.fetch_current("Oslo", true).await.is_err());

    clock.advance_millis(skycast::limiter::WINDOW_LENGTH_MS + 1);

    let result = orchestrator.fetch_current("Oslo", true).await.unwrap();
    assert_eq!(result.data, json!({"attempt": 2}));
}

#[tokio::test]
async fn failed_refetch_of_stale_entry_keeps_it_for_fallback() {
    let (orchestrator, _api, _limiter, clock) = core_with(ScriptedApi::new(vec![
        Ok(json!({"main": {"temp": 20.0}})),
        Err(AcquireError::Transport("offline".to_string())),
    ]));

    orchestrator.fetch_current("Paris", false).await.unwrap();
    clock.advance_millis(CACHE_TTL_MS + 1);

    let err = orchestrator.fetch_current("Paris", false).await.unwrap_err();
    assert!(matches!(err, AcquireError::Transport(_)));

    let fallback = orchestrator
        .last_known(RequestKind::Current, &Subject::City("Paris".to_string()))
        .expect("Stale entry must remain for fallback display");
    assert_eq!(fallback.data, json!({"main": {"temp": 20.0}}));
    assert!(fallback.age_seconds >= 60);
}

#[tokio::test]
async fn cache_survives_a_process_restart() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let clock = Arc::new(ManualClock::new());

    // First "process": fetch and cache to disk
    {
        let store = DiskStore::with_dir(temp_dir.path().to_path_buf());
        let cache = CacheManager::new(Arc::new(store), clock.clone());
        let limiter = Arc::new(RateLimiter::new(clock.clone()));
        let api = Arc::new(ScriptedApi::new(vec![Ok(json!({"main": {"temp": 7.0}}))]));
        let orchestrator = Orchestrator::new(api, cache, limiter);
        orchestrator.fetch_current("Bergen", false).await.unwrap();
    }

    // Second "process": same directory, no scripted responses at all
    let store = DiskStore::with_dir(temp_dir.path().to_path_buf());
    let cache = CacheManager::new(Arc::new(store), clock.clone());
    let limiter = Arc::new(RateLimiter::new(clock.clone()));
    let api = Arc::new(ScriptedApi::new(vec![]));
    let orchestrator = Orchestrator::new(api.clone(), cache, limiter);

    let result = orchestrator.fetch_current("Bergen", false).await.unwrap();

    assert!(result.came_from_cache);
    assert_eq!(result.data, json!({"main": {"temp": 7.0}}));
    assert_eq!(api.call_count(), 0, "Restart must not cost a network call");
}

#[tokio::test(start_paused = true)]
async fn scheduler_tick_refreshes_through_the_orchestrator() {
    let (orchestrator, api, _limiter, _clock) = core_with(ScriptedApi::new(vec![
        Ok(json!({"tick": 1})),
        Ok(json!({"tick": 2})),
    ]));

    let gate = VisibilityGate::new(true);
    let mut scheduler = Scheduler::new(gate);
    let refresh_orchestrator = orchestrator.clone();
    let callback: RefreshCallback = Arc::new(move || {
        let orchestrator = refresh_orchestrator.clone();
        async move {
            // The scheduler never inspects the outcome
            let _ = orchestrator.fetch_current("Paris", true).await;
        }
        .boxed()
    });

    scheduler.arm(callback, Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(121)).await;
    scheduler.disarm();

    assert_eq!(api.call_count(), 2);
    let cached = orchestrator
        .last_known(RequestKind::Current, &Subject::City("Paris".to_string()))
        .unwrap();
    assert_eq!(cached.data, json!({"tick": 2}));
}

#[tokio::test(start_paused = true)]
async fn refresh_failure_does_not_stop_future_ticks() {
    let (orchestrator, api, _limiter, _clock) = core_with(ScriptedApi::new(vec![
        Err(AcquireError::Transport("offline".to_string())),
        Ok(json!({"tick": 2})),
    ]));

    let gate = VisibilityGate::new(true);
    let mut scheduler = Scheduler::new(gate);
    let refresh_orchestrator = orchestrator.clone();
    let callback: RefreshCallback = Arc::new(move || {
        let orchestrator = refresh_orchestrator.clone();
        async move {
            let _ = orchestrator.fetch_current("Paris", true).await;
        }
        .boxed()
    });

    scheduler.arm(callback, Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(121)).await;
    scheduler.disarm();

    assert_eq!(api.call_count(), 2, "Second tick must run after a failure");
    let cached = orchestrator
        .last_known(RequestKind::Current, &Subject::City("Paris".to_string()))
        .unwrap();
    assert_eq!(cached.data, json!({"tick": 2}));
}

#[tokio::test(start_paused = true)]
async fn hidden_consumer_skips_ticks_until_visible_again() {
    let (orchestrator, api, _limiter, _clock) =
        core_with(ScriptedApi::new(vec![Ok(json!({"tick": 1}))]));

    let gate = VisibilityGate::new(false);
    let mut scheduler = Scheduler::new(gate.clone());
    let refresh_orchestrator = orchestrator.clone();
    let callback: RefreshCallback = Arc::new(move || {
        let orchestrator = refresh_orchestrator.clone();
        async move {
            let _ = orchestrator.fetch_current("Paris", true).await;
        }
        .boxed()
    });

    scheduler.arm(callback, Duration::from_secs(60));
    // Two full intervals in the background
    tokio::time::sleep(Duration::from_secs(130)).await;
    assert_eq!(api.call_count(), 0, "Hidden ticks must not fetch");

    gate.set_visible(true);
    tokio::time::sleep(Duration::from_millis(10)).await;
    scheduler.disarm();

    assert_eq!(api.call_count(), 1, "Exactly one immediate refresh on visible");
}
