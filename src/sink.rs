//! Delivery sinks: where a heartbeat goes once it has been built.
//!
//! Every sink is fire-and-forget. `deliver` never returns an error; failures
//! are written to the output channel and the heartbeat is dropped.

use crate::model::{HeartBeat, Reason};
use async_trait::async_trait;

pub use self::file::FileSink;
pub use self::network::{NetworkSink, ReqwestTransport, Transport};

#[async_trait]
pub trait HeartbeatSink: Send + Sync {
    async fn deliver(&self, beat: &HeartBeat, reason: Reason);

    /// Re-read external configuration. No-op for sinks without any.
    fn refresh_config(&self) {}
}

pub mod network {
    use super::*;
    use crate::config::{ConfigSource, DeliveryConfig};
    use crate::output::Output;
    use anyhow::{Context as _, Result};
    use reqwest::header::{CONTENT_TYPE, USER_AGENT};
    use std::sync::{Arc, RwLock};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct OutboundRequest {
        pub url: String,
        pub api_key: String,
        pub user_agent: String,
        pub body: String,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct TransportResponse {
        pub status: u16,
        pub body: String,
    }

    impl TransportResponse {
        pub fn is_success(&self) -> bool {
            (200..300).contains(&self.status)
        }
    }

    /// A single outbound JSON POST.
    #[async_trait]
    pub trait Transport: Send + Sync {
        async fn post(&self, request: OutboundRequest) -> Result<TransportResponse>;
    }

    #[derive(Clone, Default)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn post(&self, request: OutboundRequest) -> Result<TransportResponse> {
            let res = self
                .client
                .post(&request.url)
                .bearer_auth(&request.api_key)
                .header(CONTENT_TYPE, "application/json")
                .header(USER_AGENT, &request.user_agent)
                .body(request.body)
                .send()
                .await
                .with_context(|| format!("failed to POST {}", request.url))?;

            let status = res.status().as_u16();
            let body = res
                .text()
                .await
                .context("failed to read response body")?;

            Ok(TransportResponse { status, body })
        }
    }

    pub struct NetworkSink {
        transport: Arc<dyn Transport>,
        source: Box<dyn ConfigSource>,
        config: RwLock<DeliveryConfig>,
        output: Output,
    }

    impl NetworkSink {
        pub fn new(
            transport: Arc<dyn Transport>,
            source: Box<dyn ConfigSource>,
            output: Output,
        ) -> Self {
            let config = RwLock::new(source.load());
            Self {
                transport,
                source,
                config,
                output,
            }
        }

        pub fn config(&self) -> DeliveryConfig {
            self.config
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }

        async fn send(&self, config: &DeliveryConfig, beat: &HeartBeat) -> Result<TransportResponse> {
            let body = serde_json::to_string(beat).context("failed to serialize heartbeat")?;
            let request = OutboundRequest {
                url: config.heartbeats_url(),
                api_key: config.api_key.clone(),
                user_agent: beat.user_agent.clone(),
                body,
            };
            self.transport.post(request).await
        }
    }

    #[async_trait]
    impl HeartbeatSink for NetworkSink {
        async fn deliver(&self, beat: &HeartBeat, _reason: Reason) {
            let config = self.config();
            if !config.has_credentials() {
                self.output.line("API key not set, skipping heartbeat.");
                return;
            }

            match self.send(&config, beat).await {
                Ok(res) if res.is_success() => {
                    tracing::debug!(status = res.status, entity = %beat.entity, "heartbeat accepted");
                }
                Ok(res) => {
                    self.output
                        .line(format!("API error {}: {}", res.status, res.body));
                }
                Err(e) => {
                    self.output
                        .line(format!("Failed to send heartbeat: {:#}", e));
                }
            }
        }

        fn refresh_config(&self) {
            let fresh = self.source.load();
            *self.config.write().unwrap_or_else(|e| e.into_inner()) = fresh;
            tracing::debug!("delivery configuration refreshed");
        }
    }
}

pub mod file {
    use super::*;
    use crate::model::LoggedHeartbeat;
    use crate::output::Output;
    use anyhow::{Context as _, Result};
    use std::path::{Path, PathBuf};
    use tokio::io::AsyncWriteExt;

    pub const OUTPUT_DIR: &str = "output";
    pub const FILE_NAME: &str = "vscode-heartbeats.ndjson";

    /// Appends one JSON object per line to `<data_dir>/output/vscode-heartbeats.ndjson`.
    pub struct FileSink {
        path: Option<PathBuf>,
        output: Output,
    }

    impl FileSink {
        /// A failure here disables the sink for the rest of the session.
        pub fn init(data_dir: &Path, output: Output) -> Self {
            let dir = data_dir.join(OUTPUT_DIR);
            let path = match std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))
            {
                Ok(()) => {
                    let path = dir.join(FILE_NAME);
                    output.line(format!("Heartbeats file path: {}", path.display()));
                    Some(path)
                }
                Err(e) => {
                    output.line(format!("Failed to init heartbeat writer: {:#}", e));
                    None
                }
            };
            Self { path, output }
        }

        pub fn path(&self) -> Option<&Path> {
            self.path.as_deref()
        }
    }

    async fn append_line(path: &Path, line: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;

        file.write_all(line)
            .await
            .with_context(|| format!("failed to append to {}", path.display()))?;
        file.flush().await.context("failed to flush heartbeat file")?;

        Ok(())
    }

    #[async_trait]
    impl HeartbeatSink for FileSink {
        async fn deliver(&self, beat: &HeartBeat, reason: Reason) {
            let path = match &self.path {
                Some(path) => path,
                None => {
                    self.output
                        .line("writer not initialized, dropping heartbeat.");
                    return;
                }
            };

            let record = LoggedHeartbeat::from_heartbeat(beat, reason);
            let mut line = match serde_json::to_vec(&record) {
                Ok(line) => line,
                Err(e) => {
                    self.output
                        .line(format!("Failed to serialize heartbeat: {}", e));
                    return;
                }
            };
            line.push(b'\n');

            match append_line(path, &line).await {
                Ok(()) => tracing::debug!(path = %path.display(), "wrote heartbeat"),
                Err(e) => self
                    .output
                    .line(format!("Error writing heartbeat: {:#}", e)),
            }
        }
    }
}
