use crate::clock::Clock;
use crate::delta::LineDelta;
use crate::machine::Identity;
use crate::model::{Category, EntityType, HeartBeat, Position};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const PLUGIN_NAME: &str = env!("CARGO_PKG_NAME");
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the host knows about the active editor when an event fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorSnapshot {
    pub file_path: String,
    #[serde(default)]
    pub language_id: Option<String>,
    #[serde(default)]
    pub workspace_folder: Option<String>,
    pub line_count: u32,
    /// Zero-based; absent means the start of the document.
    #[serde(default)]
    pub cursor: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventIntent {
    pub is_write: bool,
    pub category: Category,
    pub delta: LineDelta,
}

impl EventIntent {
    pub fn passive(category: Category) -> Self {
        Self {
            is_write: false,
            category,
            delta: LineDelta::default(),
        }
    }

    pub fn write(category: Category, delta: LineDelta) -> Self {
        Self {
            is_write: true,
            category,
            delta,
        }
    }
}

/// Fixed strings identifying the reporting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub editor: String,
    pub plugin: String,
    pub source: String,
    pub user_agent: String,
}

impl Provenance {
    pub fn new(editor: &str, editor_version: &str) -> Self {
        let plugin = format!("{}/{}", PLUGIN_NAME, PLUGIN_VERSION);
        let user_agent = format!(
            "{} ({} {}; {})",
            plugin,
            editor,
            editor_version,
            std::env::consts::OS
        );
        Self {
            editor: editor.to_string(),
            plugin,
            source: PLUGIN_NAME.to_string(),
            user_agent,
        }
    }
}

impl Default for Provenance {
    fn default() -> Self {
        Self::new("vscode", "unknown")
    }
}

pub struct HeartbeatBuilder {
    clock: Arc<dyn Clock>,
    provenance: Provenance,
    identity: Identity,
    machine: OnceCell<String>,
    // written on every build, never read back into a record
    line_counts: HashMap<String, u32>,
}

impl HeartbeatBuilder {
    pub fn new(clock: Arc<dyn Clock>, provenance: Provenance, identity: Identity) -> Self {
        Self {
            clock,
            provenance,
            identity,
            machine: OnceCell::new(),
            line_counts: HashMap::new(),
        }
    }

    pub fn machine_id(&self) -> &str {
        self.machine.get_or_init(|| self.identity.machine_id())
    }

    pub fn last_line_count(&self, file_path: &str) -> Option<u32> {
        self.line_counts.get(file_path).copied()
    }

    pub fn build(&mut self, editor: &EditorSnapshot, intent: &EventIntent) -> HeartBeat {
        let captured = self.clock.now();
        self.line_counts
            .insert(editor.file_path.clone(), editor.line_count);

        HeartBeat {
            entity: editor.file_path.clone(),
            kind: EntityType::File,
            time: captured.timestamp_micros() as f64 / 1_000_000.0,
            project: editor.workspace_folder.clone(),
            language: editor.language_id.clone(),
            editor: self.provenance.editor.clone(),
            plugin: self.provenance.plugin.clone(),
            machine: self.machine_id().to_string(),
            is_write: intent.is_write,
            category: intent.category,
            lineno: editor.cursor.line.saturating_add(1),
            cursorpos: editor.cursor.character.saturating_add(1),
            lines: editor.line_count,
            line_additions: intent.delta.added,
            line_deletions: intent.delta.removed,
            user_agent: self.provenance.user_agent.clone(),
            source: self.provenance.source.clone(),
        }
    }
}
