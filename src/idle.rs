use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const IDLE_TIMEOUT_MS: i64 = 3 * 60 * 1000;

/// Tracks the last moment of user activity. Idleness is computed on demand,
/// there is no timer.
pub struct IdleTracker {
    clock: Arc<dyn Clock>,
    last_activity: DateTime<Utc>,
    timeout: Duration,
}

impl IdleTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_timeout(clock, Duration::milliseconds(IDLE_TIMEOUT_MS))
    }

    pub fn with_timeout(clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        let last_activity = clock.now();
        Self {
            clock,
            last_activity,
            timeout,
        }
    }

    pub fn mark_activity(&mut self) {
        self.last_activity = self.clock.now();
    }

    pub fn is_idle(&self) -> bool {
        self.idle_for() >= self.timeout
    }

    pub fn idle_for(&self) -> Duration {
        self.clock.now() - self.last_activity
    }
}
