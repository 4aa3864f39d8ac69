use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const DISPLAY_UPDATE_INTERVAL_MS: i64 = 2 * 60 * 1000;

/// Counts sent heartbeats and refreshes a short summary at most every two minutes.
pub struct StatusReporter {
    clock: Arc<dyn Clock>,
    total: u64,
    last_update: Option<DateTime<Utc>>,
    text: String,
}

impl StatusReporter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            total: 0,
            last_update: None,
            text: "tracking...".to_string(),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns true when the displayed text changed.
    pub fn on_heartbeat_sent(&mut self) -> bool {
        self.total += 1;
        let now = self.clock.now();
        let due = match self.last_update {
            Some(last) => now - last >= Duration::milliseconds(DISPLAY_UPDATE_INTERVAL_MS),
            None => true,
        };
        if due {
            self.last_update = Some(now);
            self.text = format!("{} hb", self.total);
        }
        due
    }
}
