//! Subscriber setup: stderr for the operator, plus a plain-text mirror under
//! `<data_dir>/Logs/` with lines shaped `<ISO-8601 ms UTC> [LEVEL] message`.

use anyhow::{Context as _, Result};
use chrono::{SecondsFormat, Utc};
use std::fmt;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::Settings;

pub const LOGS_DIR: &str = "Logs";
pub const LOG_FILE: &str = "heartbeat-tracker.log";

pub type FileLayer<S> = tracing_subscriber::fmt::Layer<S, DefaultFields, FileLine, NonBlocking>;

#[derive(Debug, Default, Clone, Copy)]
pub struct FileLine;

impl<S, N> FormatEvent<S, N> for FileLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        write!(writer, "{} [{}] ", timestamp, event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// `RUST_LOG` wins; otherwise `debug` switches between debug and info.
pub fn filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

/// A non-blocking file layer. Keep the guard alive for as long as lines
/// should reach the file.
pub fn file_layer<S>(logs_dir: &Path) -> Result<(FileLayer<S>, WorkerGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(logs_dir)
        .with_context(|| format!("failed to open log file in {}", logs_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .event_format(FileLine)
        .with_ansi(false)
        .with_writer(writer);
    Ok((layer, guard))
}

/// Installs the global subscriber. A log directory that cannot be opened
/// leaves only the stderr output. Returns `None` when no file is written.
pub fn init(settings: &Settings) -> Option<WorkerGuard> {
    let use_ansi = std::env::var("NO_COLOR").is_err();
    let logs_dir = settings.logs_dir();

    let (file, guard, file_error) = match file_layer(&logs_dir) {
        Ok((layer, guard)) => (Some(layer), Some(guard), None),
        Err(e) => (None, None, Some(e)),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter(settings.debug))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(file);
    if let Err(e) = subscriber.try_init() {
        // someone else owns the global subscriber; dropping the guard stops the writer
        tracing::warn!("logging already initialized: {}", e);
        return None;
    }

    match file_error {
        Some(e) => tracing::warn!("file logging disabled: {:#}", e),
        None => tracing::debug!(dir = %logs_dir.display(), "mirroring logs to disk"),
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn is_log_line(line: &str, level: &str, message: &str) -> bool {
        let (timestamp, rest) = match line.split_once(' ') {
            Some(parts) => parts,
            None => return false,
        };
        chrono::DateTime::parse_from_rfc3339(timestamp).is_ok()
            && timestamp.ends_with('Z')
            && timestamp.len() == "2025-01-01T00:00:00.000Z".len()
            && rest == format!("[{}] {}", level, message)
    }

    #[test]
    fn lines_have_timestamp_and_bracketed_level() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .event_format(FileLine)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || sink.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("API error 500: boom");
            tracing::debug!("cursor heartbeat");
        });

        let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(is_log_line(lines[0], "WARN", "API error 500: boom"), "{}", lines[0]);
        assert!(is_log_line(lines[1], "DEBUG", "cursor heartbeat"), "{}", lines[1]);
    }

    #[test]
    fn file_layer_mirrors_to_logs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join(LOGS_DIR);

        let (layer, guard) = file_layer(&logs).unwrap();
        let subscriber = tracing_subscriber::registry().with(layer.with_filter(filter(false)));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("edit heartbeat");
            tracing::debug!("hidden without debug");
        });
        drop(guard);

        let text = std::fs::read_to_string(logs.join(LOG_FILE)).unwrap();
        assert!(text.contains("[INFO] edit heartbeat"));
        assert!(!text.contains("hidden without debug"));
    }

    #[test]
    fn debug_flag_raises_verbosity() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert_eq!(filter(true).to_string(), "debug");
        assert_eq!(filter(false).to_string(), "info");
    }
}
