//! Fixed-window request limiter.
//!
//! At most `max_requests` calls are admitted per window. A caller that finds
//! the window full sleeps until it ends, then starts a fresh window. Calls
//! are delayed, never rejected.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            state: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a request slot is available and claim it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
                let now = Instant::now();

                if now.duration_since(state.started) >= self.window {
                    state.started = now;
                    state.count = 0;
                }

                if state.count < self.max_requests {
                    state.count += 1;
                    return;
                }

                (state.started + self.window).saturating_duration_since(now)
            };

            debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }
}
