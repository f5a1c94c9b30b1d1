use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct WindowState {
    window_started_at: Instant,
    suppressed: u64,
}

/// Rate limits repeated log lines per key.
///
/// Owned by a single consumer loop, so it needs no locking.
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    windows: HashMap<&'static str, WindowState>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        LogThrottle {
            interval,
            windows: HashMap::new(),
        }
    }

    /// Returns `Some(suppressed_count)` when a log for `key` should be emitted,
    /// otherwise `None` and the event is counted as suppressed for the active window.
    pub fn should_emit(&mut self, key: &'static str) -> Option<u64> {
        self.should_emit_at(key, Instant::now())
    }

    fn should_emit_at(&mut self, key: &'static str, now: Instant) -> Option<u64> {
        match self.windows.get_mut(key) {
            Some(state) if now.duration_since(state.window_started_at) >= self.interval => {
                let suppressed = state.suppressed;
                state.window_started_at = now;
                state.suppressed = 0;
                Some(suppressed)
            }
            Some(state) => {
                state.suppressed += 1;
                None
            }
            None => {
                self.windows.insert(
                    key,
                    WindowState {
                        window_started_at: now,
                        suppressed: 0,
                    },
                );
                Some(0)
            }
        }
    }
}
