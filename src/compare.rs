//! Cross-checks heartbeats reported by the editor against heartbeats recorded
//! on the device side.
//!
//! Both logs are CSV exports with the header
//! `Time,Project,Language,Editor,File Path,Line,Col,Lines,Write,Source,Branch,Category,Machine,User Agent,IP`.
//! Entries are paired greedily after sorting by time: two entries match when
//! they are within the tolerance of each other and name the same project and
//! file path.

use anyhow::{anyhow, Context as _, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

pub use crate::config::parse_flag as parse_bool;

pub const DEFAULT_TOLERANCE_SECS: f64 = 2.0;

const TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %I:%M:%S %p"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Time", default)]
    time: String,
    #[serde(rename = "Project", default)]
    project: String,
    #[serde(rename = "Language", default)]
    language: String,
    #[serde(rename = "Editor", default)]
    editor: String,
    #[serde(rename = "File Path", default)]
    file_path: String,
    #[serde(rename = "Line", default)]
    line: String,
    #[serde(rename = "Col", default)]
    col: String,
    #[serde(rename = "Lines", default)]
    lines: String,
    #[serde(rename = "Write", default)]
    write: String,
    #[serde(rename = "Source", default)]
    source: String,
    #[serde(rename = "Branch", default)]
    branch: String,
    #[serde(rename = "Category", default)]
    category: String,
    #[serde(rename = "Machine", default)]
    machine: String,
    #[serde(rename = "User Agent", default)]
    user_agent: String,
    #[serde(rename = "IP", default)]
    ip: String,
}

/// One row of an exported heartbeat log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub time: NaiveDateTime,
    pub project: String,
    pub language: String,
    pub editor: String,
    pub file_path: String,
    pub line: i64,
    pub col: i64,
    pub lines: i64,
    pub write: bool,
    pub source: String,
    pub branch: String,
    pub category: String,
    pub machine: String,
    pub user_agent: String,
    pub ip: String,
}

impl LogEntry {
    fn from_row(row: CsvRow) -> Result<LogEntry> {
        Ok(LogEntry {
            time: parse_time(&row.time)?,
            project: row.project,
            language: row.language,
            editor: row.editor,
            file_path: row.file_path,
            line: parse_int(&row.line),
            col: parse_int(&row.col),
            lines: parse_int(&row.lines),
            write: parse_bool(&row.write),
            source: row.source,
            branch: row.branch,
            category: row.category,
            machine: row.machine,
            user_agent: row.user_agent,
            ip: row.ip,
        })
    }

    fn same_context(&self, other: &LogEntry) -> bool {
        self.project == other.project && self.file_path == other.file_path
    }
}

/// Anything that is not an integer reads as 0.
pub fn parse_int(value: &str) -> i64 {
    value.trim().parse().unwrap_or(0)
}

/// Naive UTC. Offsets in RFC 3339 input are folded into UTC.
pub fn parse_time(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|t| t.with_timezone(&Utc).naive_utc())
        })
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .ok_or_else(|| anyhow!("unrecognized time \"{}\"", value))
}

pub fn read_entries<R: io::Read>(reader: R) -> Result<Vec<LogEntry>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(i, row)| {
            // header is line 1
            let row = row.with_context(|| format!("failed to read row {}", i + 2))?;
            LogEntry::from_row(row).with_context(|| format!("invalid row {}", i + 2))
        })
        .collect()
}

pub fn read_entries_from(path: &Path) -> Result<Vec<LogEntry>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_entries(file).with_context(|| format!("failed to parse {}", path.display()))
}

/// Indices into the editor-side and device-side lists. At least one is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedPair {
    pub vs_index: Option<usize>,
    pub device_index: Option<usize>,
}

impl MatchedPair {
    fn both(vs: usize, device: usize) -> Self {
        Self {
            vs_index: Some(vs),
            device_index: Some(device),
        }
    }

    fn vs_only(vs: usize) -> Self {
        Self {
            vs_index: Some(vs),
            device_index: None,
        }
    }

    fn device_only(device: usize) -> Self {
        Self {
            vs_index: None,
            device_index: Some(device),
        }
    }
}

fn sorted_by_time(entries: &[LogEntry]) -> Vec<(usize, &LogEntry)> {
    let mut sorted: Vec<_> = entries.iter().enumerate().collect();
    sorted.sort_by_key(|(_, e)| e.time);
    sorted
}

/// Greedy two-pointer walk over both lists in time order. Not an optimal
/// assignment: it only finds obvious mismatches.
pub fn match_heartbeats(vs: &[LogEntry], device: &[LogEntry], tolerance_secs: f64) -> Vec<MatchedPair> {
    let vs_sorted = sorted_by_time(vs);
    let dev_sorted = sorted_by_time(device);
    let tolerance = chrono::Duration::microseconds((tolerance_secs * 1_000_000.0).round() as i64);

    let mut pairs = Vec::with_capacity(vs.len().max(device.len()));
    let (mut i, mut j) = (0, 0);

    while i < vs_sorted.len() && j < dev_sorted.len() {
        let (vs_idx, a) = vs_sorted[i];
        let (dev_idx, b) = dev_sorted[j];
        let dt = a.time - b.time;

        if dt.abs() <= tolerance && a.same_context(b) {
            pairs.push(MatchedPair::both(vs_idx, dev_idx));
            i += 1;
            j += 1;
        } else if a.time < b.time {
            pairs.push(MatchedPair::vs_only(vs_idx));
            i += 1;
        } else {
            pairs.push(MatchedPair::device_only(dev_idx));
            j += 1;
        }
    }

    pairs.extend(vs_sorted[i..].iter().map(|(idx, _)| MatchedPair::vs_only(*idx)));
    pairs.extend(dev_sorted[j..].iter().map(|(idx, _)| MatchedPair::device_only(*idx)));
    pairs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Match,
    VsOnly,
    DeviceOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub match_type: MatchType,
    pub vs_time: String,
    pub device_time: String,
    pub project: String,
    pub file_path: String,
    pub vs_line: Option<i64>,
    pub device_line: Option<i64>,
    pub vs_col: Option<i64>,
    pub device_col: Option<i64>,
    pub vs_source: String,
    pub device_source: String,
}

fn iso(time: &NaiveDateTime) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

impl ComparisonRow {
    fn new(vs: Option<&LogEntry>, dev: Option<&LogEntry>) -> Option<ComparisonRow> {
        let match_type = match (vs, dev) {
            (Some(_), Some(_)) => MatchType::Match,
            (Some(_), None) => MatchType::VsOnly,
            (None, Some(_)) => MatchType::DeviceOnly,
            (None, None) => return None,
        };
        // context columns come from the editor side when present
        let context = vs.or(dev)?;

        Some(ComparisonRow {
            match_type,
            vs_time: vs.map(|e| iso(&e.time)).unwrap_or_default(),
            device_time: dev.map(|e| iso(&e.time)).unwrap_or_default(),
            project: context.project.clone(),
            file_path: context.file_path.clone(),
            vs_line: vs.map(|e| e.line),
            device_line: dev.map(|e| e.line),
            vs_col: vs.map(|e| e.col),
            device_col: dev.map(|e| e.col),
            vs_source: vs.map(|e| e.source.clone()).unwrap_or_default(),
            device_source: dev.map(|e| e.source.clone()).unwrap_or_default(),
        })
    }
}

pub fn comparison_rows(vs: &[LogEntry], device: &[LogEntry], pairs: &[MatchedPair]) -> Vec<ComparisonRow> {
    pairs
        .iter()
        .filter_map(|pair| {
            ComparisonRow::new(
                pair.vs_index.and_then(|i| vs.get(i)),
                pair.device_index.and_then(|i| device.get(i)),
            )
        })
        .collect()
}

const COMPARISON_COLUMNS: [&str; 11] = [
    "match_type",
    "vs_time",
    "device_time",
    "project",
    "file_path",
    "vs_line",
    "device_line",
    "vs_col",
    "device_col",
    "vs_source",
    "device_source",
];

pub fn write_comparison<W: io::Write>(writer: W, rows: &[ComparisonRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    // serialize() only emits the header alongside the first row
    if rows.is_empty() {
        writer
            .write_record(COMPARISON_COLUMNS)
            .context("failed to write comparison header")?;
    }
    for row in rows {
        writer.serialize(row).context("failed to write comparison row")?;
    }
    writer.flush().context("failed to flush comparison output")?;
    Ok(())
}

pub fn write_comparison_to(path: &Path, rows: &[ComparisonRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_comparison(file, rows)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub matched: usize,
    pub vs_only: usize,
    pub device_only: usize,
}

pub fn summarize(rows: &[ComparisonRow]) -> Summary {
    rows.iter().fold(Summary::default(), |mut s, row| {
        match row.match_type {
            MatchType::Match => s.matched += 1,
            MatchType::VsOnly => s.vs_only += 1,
            MatchType::DeviceOnly => s.device_only += 1,
        }
        s
    })
}
