use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Window {
    opened_at: Instant,
    suppressed: u64,
}

/// Rate limit for a repetitive log event, tracked separately per key
/// (for example one key per catalog operation).
///
/// The first event for a key opens a window and is emitted; later events in
/// the same window are only counted. The first event after the window
/// closes is emitted with that count and opens the next window.
pub struct LogThrottle {
    interval: Duration,
    windows: Mutex<HashMap<&'static str, Window>>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        LogThrottle {
            interval,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `Some(suppressed_count)` when the event for `key` should be
    /// logged, `None` when it was counted as suppressed.
    pub fn should_emit(&self, key: &'static str) -> Option<u64> {
        self.should_emit_at(key, Instant::now())
    }

    fn should_emit_at(&self, key: &'static str, now: Instant) -> Option<u64> {
        // The map only holds counters, so a poisoned lock is still usable.
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let window = windows.entry(key).or_insert(Window {
            opened_at: now,
            suppressed: 0,
        });
        if window.opened_at == now {
            return Some(0);
        }
        if now.duration_since(window.opened_at) < self.interval {
            window.suppressed += 1;
            return None;
        }
        let suppressed = window.suppressed;
        *window = Window {
            opened_at: now,
            suppressed: 0,
        };
        Some(suppressed)
    }
}
