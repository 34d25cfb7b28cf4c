// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A best-effort, in-process fixed-window counter keyed by API key. This
/// exists only so the HTTP boundary has *something* guarding it, not as a
/// production-grade limiter (no cross-process coordination, no burst shaping).
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, (Instant, u32)>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if `key` is still within its budget for the current
    /// window, incrementing its counter as a side effect.
    pub fn check(&self, key: &str) -> bool {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();
        let entry = windows.entry(key.to_owned()).or_insert((now, 0));

        if now.duration_since(entry.0) >= self.window {
            *entry = (now, 0);
        }

        if entry.1 >= self.limit {
            return false;
        }
        entry.1 += 1;
        true
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(120, Duration::from_secs(60))
    }
}
