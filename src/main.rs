use anyhow::Context as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use heartbeat_tracker::builder::Provenance;
use heartbeat_tracker::clock::SystemClock;
use heartbeat_tracker::config::{EnvConfig, Settings, SinkKind};
use heartbeat_tracker::logging;
use heartbeat_tracker::machine::Identity;
use heartbeat_tracker::output::Output;
use heartbeat_tracker::sink::{FileSink, HeartbeatSink, NetworkSink, ReqwestTransport};
use heartbeat_tracker::tracker::{ActivityTracker, HostEvent};

fn build_sink(settings: &Settings, output: Output) -> anyhow::Result<Arc<dyn HeartbeatSink>> {
    let sink: Arc<dyn HeartbeatSink> = match settings.sink {
        SinkKind::Network => {
            let client = reqwest::Client::builder()
                .build()
                .context("failed to create http client")?;
            Arc::new(NetworkSink::new(
                Arc::new(ReqwestTransport::new(client)),
                Box::new(EnvConfig),
                output,
            ))
        }
        SinkKind::File => Arc::new(FileSink::init(&settings.data_dir, output)),
    };
    Ok(sink)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::from_env().context("failed to read settings")?;
    let _log_guard = logging::init(&settings);

    let output = Output::tracing("hackatime");
    let sink = build_sink(&settings, output.clone())?;

    let mut tracker = ActivityTracker::new(
        Arc::new(SystemClock),
        Provenance::new(&settings.editor, &settings.editor_version),
        Identity::detect(),
        sink,
        output.clone(),
    );

    output.line("Hackatime tracker activated.");
    tracing::info!(sink = ?settings.sink, "reading host events from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line.context("failed to read stdin")? {
                    Some(line) => line,
                    None => break,
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<HostEvent>(&line) {
                    Ok(event) => {
                        tracker.handle(event);
                    }
                    Err(e) => tracing::warn!("ignoring malformed host event: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(in_flight = tracker.in_flight(), "interrupted, abandoning in-flight heartbeats");
                return Ok(());
            }
        }
    }

    tracker.drain().await;
    tracing::info!(
        sent = tracker.heartbeats_sent(),
        status = %tracker.status_text(),
        "host closed the event stream"
    );

    Ok(())
}
