// src/geo/rate_limit.rs

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Global gate for outbound geocode calls: at most one call per
/// configured interval, across every listing pipeline sharing this
/// gate. The lock is held through the sleep so concurrent callers
/// serialize instead of stampeding.
pub struct RateGate {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(interval_seconds: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(interval_seconds.max(0.0)),
            last_call: Mutex::new(None),
        }
    }

    /// Block until the interval since the previous call has elapsed,
    /// then claim the slot. Blocks the calling flow; never drops a call.
    pub fn acquire(&self) {
        let mut last = match self.last_call.lock() {
            Ok(guard) => guard,
            // The timestamp inside a poisoned lock is still usable.
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}
