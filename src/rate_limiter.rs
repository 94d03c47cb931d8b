use crate::config::WindowConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Prune idle keys once the map grows past this.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    current: u32,
    previous: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

/// Sliding-window counter: the previous fixed window's count is weighted by
/// how much of it still overlaps the sliding window.
pub struct SlidingWindowLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl SlidingWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window: window.max(Duration::from_millis(1)),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &WindowConfig) -> Self {
        Self::new(config.limit, Duration::from_secs(config.window_secs))
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if windows.len() > PRUNE_THRESHOLD {
            let idle = self.window * 2;
            windows.retain(|_, w| now.saturating_duration_since(w.start) <= idle);
        }

        let window = self.window;
        let entry = windows.entry(key.to_string()).or_insert(Window {
            start: now,
            current: 0,
            previous: 0,
        });

        let since_start = now.saturating_duration_since(entry.start);
        if since_start >= window * 2 {
            // Both windows have expired.
            *entry = Window {
                start: now,
                current: 0,
                previous: 0,
            };
        } else if since_start >= window {
            entry.previous = entry.current;
            entry.current = 0;
            entry.start += window;
        }

        let elapsed = now.saturating_duration_since(entry.start);
        let overlap = 1.0 - elapsed.as_secs_f64() / window.as_secs_f64();
        let estimated = entry.previous as f64 * overlap + entry.current as f64;

        if estimated + 1.0 <= self.limit as f64 {
            entry.current += 1;
            let used = (estimated + 1.0).ceil() as u32;
            Decision::Allowed {
                remaining: self.limit.saturating_sub(used),
            }
        } else {
            let left = window.saturating_sub(elapsed);
            Decision::Limited {
                retry_after_secs: left.as_secs_f64().ceil().max(1.0) as u64,
            }
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}
