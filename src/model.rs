use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Zero-based position as reported by the editor host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Coding,
    Active,
    Save,
    Open,
}

/// Which host event produced a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reason {
    Change,
    Cursor,
    Save,
    Open,
    Focus,
}

/// One observed editing moment, in the shape the tracking API accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartBeat {
    pub entity: String,
    #[serde(rename = "type")]
    pub kind: EntityType,
    /// Capture moment, Unix seconds with sub-second precision.
    pub time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub editor: String,
    pub plugin: String,
    pub machine: String,
    pub is_write: bool,
    pub category: Category,
    pub lineno: u32,
    pub cursorpos: u32,
    pub lines: u32,
    pub line_additions: u32,
    pub line_deletions: u32,
    pub user_agent: String,
    pub source: String,
}

impl HeartBeat {
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        let micros = (self.time * 1_000_000.0).round() as i64;
        DateTime::from_timestamp(
            micros.div_euclid(1_000_000),
            (micros.rem_euclid(1_000_000) * 1_000) as u32,
        )
    }
}

/// The record appended to the local NDJSON log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedHeartbeat {
    pub timestamp: String,
    pub project: Option<String>,
    pub language: Option<String>,
    pub file_path: String,
    pub line: u32,
    pub column: u32,
    pub is_write: bool,
    pub category: Category,
    pub reason: Reason,
    pub lines_in_file: u32,
    pub editor: String,
    pub machine: String,
    pub user_agent: String,
}

impl LoggedHeartbeat {
    pub fn from_heartbeat(origin: &HeartBeat, reason: Reason) -> LoggedHeartbeat {
        let timestamp = origin
            .captured_at()
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        LoggedHeartbeat {
            timestamp,
            project: origin.project.clone(),
            language: origin.language.clone(),
            file_path: origin.entity.clone(),
            line: origin.lineno,
            column: origin.cursorpos,
            is_write: origin.is_write,
            category: origin.category,
            reason,
            lines_in_file: origin.lines,
            editor: origin.editor.clone(),
            machine: origin.machine.clone(),
            user_agent: origin.user_agent.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_heartbeat() -> HeartBeat {
    HeartBeat {
        entity: "/home/dev/project/src/main.rs".to_string(),
        kind: EntityType::File,
        time: 1_700_000_000.25,
        project: Some("project".to_string()),
        language: Some("rust".to_string()),
        editor: "vscode".to_string(),
        plugin: "heartbeat-tracker/0.1.0".to_string(),
        machine: "0123456789abcdef".to_string(),
        is_write: true,
        category: Category::Coding,
        lineno: 3,
        cursorpos: 7,
        lines: 40,
        line_additions: 2,
        line_deletions: 0,
        user_agent: "heartbeat-tracker/0.1.0 (vscode 1.90.0; linux)".to_string(),
        source: "heartbeat-tracker".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn heartbeat_serializes_with_api_field_names() {
        let value = serde_json::to_value(sample_heartbeat()).unwrap();

        assert_eq!(value["type"], "file");
        assert_eq!(value["category"], "coding");
        assert_eq!(value["entity"], "/home/dev/project/src/main.rs");
        assert_eq!(value["is_write"], true);
        assert_eq!(value["line_additions"], 2);
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn absent_project_and_language_are_omitted() {
        let mut hb = sample_heartbeat();
        hb.project = None;
        hb.language = None;

        let value = serde_json::to_value(hb).unwrap();
        assert!(value.get("project").is_none());
        assert!(value.get("language").is_none());
    }

    #[test]
    fn logged_heartbeat_uses_capture_time_and_camel_case() {
        let logged = LoggedHeartbeat::from_heartbeat(&sample_heartbeat(), Reason::Save);
        let value = serde_json::to_value(&logged).unwrap();

        assert_eq!(value["timestamp"], "2023-11-14T22:13:20.250Z");
        assert_eq!(value["filePath"], "/home/dev/project/src/main.rs");
        assert_eq!(value["linesInFile"], 40);
        assert_eq!(value["reason"], "save");
        assert_eq!(value["line"], 3);
        assert_eq!(value["column"], 7);
    }

    #[test]
    fn logged_heartbeat_keeps_missing_project_as_null() {
        let mut hb = sample_heartbeat();
        hb.project = None;
        let value = serde_json::to_value(LoggedHeartbeat::from_heartbeat(&hb, Reason::Open)).unwrap();
        assert_eq!(value["project"], json!(null));
    }
}
