use std::sync::Arc;

use heartbeat_tracker::builder::{EditorSnapshot, Provenance};
use heartbeat_tracker::clock::SystemClock;
use heartbeat_tracker::machine::{machine_id, Identity};
use heartbeat_tracker::output::{MemoryChannel, Output};
use heartbeat_tracker::sink::FileSink;
use heartbeat_tracker::tracker::{ActivityTracker, HostEvent};
use heartbeat_tracker::{Category, LoggedHeartbeat, Reason};

fn event(json: &str) -> HostEvent {
    serde_json::from_str(json).unwrap()
}

#[tokio::test]
async fn host_session_is_logged_to_ndjson() {
    let dir = tempfile::tempdir().unwrap();
    let memory = Arc::new(MemoryChannel::default());
    let output = Output::new("logger", memory.clone());
    let sink = Arc::new(FileSink::init(dir.path(), output.clone()));

    let mut tracker = ActivityTracker::new(
        Arc::new(SystemClock),
        Provenance::new("vscode", "1.90.0"),
        Identity::new("devbox", "alice"),
        sink.clone(),
        output,
    );

    let session = [
        r#"{"event":"document_opened","editor":{"file_path":"/w/a.rs","line_count":3}}"#,
        r#"{"event":"document_changed","editor":{"file_path":"/w/a.rs","line_count":5,"cursor":{"line":4,"character":0}},
            "changes":[{"range":{"start":{"line":1,"character":0},"end":{"line":1,"character":0}},"text":"\n\n"}]}"#,
        r#"{"event":"document_saved","editor":{"file_path":"/w/a.rs","line_count":5}}"#,
        r#"{"event":"active_editor_changed"}"#,
    ];
    for line in session {
        tracker.handle(event(line));
    }
    tracker.drain().await;

    let content = std::fs::read_to_string(sink.path().unwrap()).unwrap();
    let mut records: Vec<LoggedHeartbeat> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 3);

    // deliveries are independent tasks; compare by reason, not position
    records.sort_by_key(|r| format!("{:?}", r.reason));
    let reasons: Vec<Reason> = records.iter().map(|r| r.reason).collect();
    assert_eq!(reasons, vec![Reason::Change, Reason::Open, Reason::Save]);

    let change = &records[0];
    assert_eq!(change.category, Category::Coding);
    assert!(change.is_write);
    assert_eq!(change.line, 5);
    assert_eq!(change.lines_in_file, 5);
    assert_eq!(change.machine, machine_id("devbox", "alice"));
    assert_eq!(change.file_path, "/w/a.rs");

    assert_eq!(tracker.heartbeats_sent(), 3);
    assert!(memory.contains("[logger] save heartbeat"));
}

#[test]
fn snapshot_requires_path_and_line_count() {
    assert!(serde_json::from_str::<EditorSnapshot>(r#"{"line_count":3}"#).is_err());
    assert!(serde_json::from_str::<EditorSnapshot>(r#"{"file_path":"/a"}"#).is_err());
}
