//! Host event wiring: turns editor events into heartbeats and hands each one
//! to the sink as an independent task.

use crate::builder::{EditorSnapshot, EventIntent, HeartbeatBuilder, Provenance};
use crate::clock::Clock;
use crate::delta::{compute_line_delta, ChangeSpan};
use crate::idle::IdleTracker;
use crate::machine::Identity;
use crate::model::{Category, HeartBeat, Reason};
use crate::output::Output;
use crate::sink::HeartbeatSink;
use crate::status::StatusReporter;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    DocumentChanged {
        #[serde(default)]
        editor: Option<EditorSnapshot>,
        #[serde(default)]
        changes: Vec<ChangeSpan>,
    },
    SelectionChanged {
        editor: EditorSnapshot,
    },
    DocumentSaved {
        editor: EditorSnapshot,
    },
    DocumentOpened {
        editor: EditorSnapshot,
    },
    ActiveEditorChanged {
        #[serde(default)]
        editor: Option<EditorSnapshot>,
    },
    ConfigurationChanged,
}

struct Classified {
    editor: EditorSnapshot,
    intent: EventIntent,
    reason: Reason,
    label: &'static str,
}

fn classify(event: HostEvent) -> Option<Classified> {
    let classified = match event {
        HostEvent::DocumentChanged { editor, changes } => Classified {
            editor: editor?,
            intent: EventIntent::write(Category::Coding, compute_line_delta(&changes)),
            reason: Reason::Change,
            label: "edit",
        },
        HostEvent::SelectionChanged { editor } => Classified {
            editor,
            intent: EventIntent::passive(Category::Coding),
            reason: Reason::Cursor,
            label: "cursor",
        },
        HostEvent::DocumentSaved { editor } => Classified {
            editor,
            intent: EventIntent::write(Category::Save, Default::default()),
            reason: Reason::Save,
            label: "save",
        },
        HostEvent::DocumentOpened { editor } => Classified {
            editor,
            intent: EventIntent::passive(Category::Open),
            reason: Reason::Open,
            label: "open",
        },
        HostEvent::ActiveEditorChanged { editor } => Classified {
            editor: editor?,
            intent: EventIntent::passive(Category::Active),
            reason: Reason::Focus,
            label: "focus",
        },
        HostEvent::ConfigurationChanged => return None,
    };
    Some(classified)
}

pub struct ActivityTracker {
    builder: HeartbeatBuilder,
    idle: IdleTracker,
    sink: Arc<dyn HeartbeatSink>,
    status: Arc<Mutex<StatusReporter>>,
    output: Output,
    in_flight: JoinSet<()>,
}

impl ActivityTracker {
    pub fn new(
        clock: Arc<dyn Clock>,
        provenance: Provenance,
        identity: Identity,
        sink: Arc<dyn HeartbeatSink>,
        output: Output,
    ) -> Self {
        Self {
            builder: HeartbeatBuilder::new(clock.clone(), provenance, identity),
            idle: IdleTracker::new(clock.clone()),
            sink,
            status: Arc::new(Mutex::new(StatusReporter::new(clock))),
            output,
            in_flight: JoinSet::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.idle.is_idle()
    }

    pub fn status_text(&self) -> String {
        self.lock_status().text().to_string()
    }

    pub fn heartbeats_sent(&self) -> u64 {
        self.lock_status().total()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, StatusReporter> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Handles one host event. Must be called from within a tokio runtime;
    /// delivery is spawned and not awaited. Returns the heartbeat that was
    /// dispatched, if the event produced one.
    pub fn handle(&mut self, event: HostEvent) -> Option<HeartBeat> {
        self.reap();

        if let HostEvent::ConfigurationChanged = event {
            self.sink.refresh_config();
            self.output.line("configuration reloaded");
            return None;
        }

        let Classified {
            editor,
            intent,
            reason,
            label,
        } = classify(event)?;

        let beat = self.builder.build(&editor, &intent);

        if self.idle.is_idle() {
            tracing::info!(
                idle_secs = self.idle.idle_for().num_seconds(),
                "activity resumed after idle"
            );
        }
        self.idle.mark_activity();

        self.output.line(format!("{} heartbeat", label));
        match serde_json::to_string(&beat) {
            Ok(json) => self.output.line(json),
            Err(e) => tracing::warn!("failed to render heartbeat for output: {}", e),
        }

        self.dispatch(beat.clone(), reason);
        Some(beat)
    }

    fn dispatch(&mut self, beat: HeartBeat, reason: Reason) {
        let sink = self.sink.clone();
        let status = self.status.clone();

        self.in_flight.spawn(async move {
            sink.deliver(&beat, reason).await;

            let mut status = status.lock().unwrap_or_else(|e| e.into_inner());
            if status.on_heartbeat_sent() {
                tracing::info!(status = %status.text(), "status updated");
            }
        });
    }

    fn reap(&mut self) {
        while let Some(res) = self.in_flight.try_join_next() {
            if let Err(e) = res {
                tracing::warn!("heartbeat delivery task failed: {}", e);
            }
        }
    }

    /// Waits for every in-flight delivery. Dropping the tracker instead
    /// abandons them.
    pub async fn drain(&mut self) {
        while let Some(res) = self.in_flight.join_next().await {
            if let Err(e) = res {
                tracing::warn!("heartbeat delivery task failed: {}", e);
            }
        }
    }
}
