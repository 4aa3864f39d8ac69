//! Human-readable diagnostic lines, written as `[prefix] message`.

use std::sync::{Arc, Mutex};

pub trait OutputChannel: Send + Sync {
    fn append_line(&self, line: &str);
}

/// Forwards every line to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingChannel;

impl OutputChannel for TracingChannel {
    fn append_line(&self, line: &str) {
        tracing::info!(target: "heartbeat_tracker::output", "{}", line);
    }
}

#[derive(Debug, Default)]
pub struct MemoryChannel {
    lines: Mutex<Vec<String>>,
}

impl MemoryChannel {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl OutputChannel for MemoryChannel {
    fn append_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.to_string());
    }
}

#[derive(Clone)]
pub struct Output {
    prefix: Arc<str>,
    channel: Arc<dyn OutputChannel>,
}

impl Output {
    pub fn new(prefix: &str, channel: Arc<dyn OutputChannel>) -> Self {
        Self {
            prefix: prefix.into(),
            channel,
        }
    }

    pub fn tracing(prefix: &str) -> Self {
        Self::new(prefix, Arc::new(TracingChannel))
    }

    pub fn line(&self, message: impl AsRef<str>) {
        self.channel
            .append_line(&format!("[{}] {}", self.prefix, message.as_ref()));
    }
}
