//! Fixed-window rate limiter for outbound API calls
//!
//! One limiter instance budgets the whole process: every network call,
//! regardless of which city or endpoint it is for, draws from the same
//! window. The window is aligned to the first call after a reset, not to
//! calendar minutes, so a burst straddling a window boundary can admit up
//! to twice the per-window maximum. That tradeoff is intentional and kept.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::clock::Clock;

/// Maximum network calls admitted per window
pub const MAX_CALLS_PER_WINDOW: u32 = 50;

/// Window length in milliseconds
pub const WINDOW_LENGTH_MS: i64 = 60_000;

#[derive(Debug)]
struct WindowState {
    call_count: u32,
    window_start: DateTime<Utc>,
}

/// Counts calls in a fixed window and refuses once the budget is spent
///
/// The counter state sits behind a mutex: the original design relied on
/// single-threaded cooperative scheduling, which real threads do not get
/// for free.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    max_calls: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Creates a limiter with the default budget of 50 calls per minute
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, MAX_CALLS_PER_WINDOW, WINDOW_LENGTH_MS)
    }

    /// Creates a limiter with a custom budget and window length
    pub fn with_limits(clock: Arc<dyn Clock>, max_calls: u32, window_ms: i64) -> Self {
        let window_start = clock.now();
        Self {
            clock,
            max_calls,
            window: Duration::milliseconds(window_ms),
            state: Mutex::new(WindowState {
                call_count: 0,
                window_start,
            }),
        }
    }

    /// Asks for one call slot; increments the counter when admitted
    ///
    /// Returns `false` once the current window's budget is spent. The
    /// counter resets whenever more than a full window has elapsed since
    /// the window started.
    pub fn admit(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();

        if now - state.window_start > self.window {
            state.call_count = 0;
            state.window_start = now;
        }

        if state.call_count >= self.max_calls {
            debug!(
                "rate limit refused call ({}/{} used this window)",
                state.call_count, self.max_calls
            );
            return false;
        }

        state.call_count += 1;
        true
    }

    /// Calls admitted in the current window, for stats and tests
    pub fn current_count(&self) -> u32 {
        self.state.lock().unwrap().call_count
    }
}
