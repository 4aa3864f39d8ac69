use anyhow::{bail, Context as _, Result};
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://hackatime.hackclub.com";
pub const HEARTBEATS_PATH: &str = "/api/v1/users/current/heartbeats";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Empty disables network delivery.
    pub api_key: String,
    pub base_url: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl DeliveryConfig {
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn heartbeats_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), HEARTBEATS_PATH)
    }
}

/// Where delivery settings come from. Read at construction and again on refresh.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> DeliveryConfig;
}

pub struct StaticConfig(pub DeliveryConfig);

impl ConfigSource for StaticConfig {
    fn load(&self) -> DeliveryConfig {
        self.0.clone()
    }
}

/// Reads `HACKATIME_API_KEY` and `HACKATIME_BASE_URL`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvConfig;

impl EnvConfig {
    pub const API_KEY: &'static str = "HACKATIME_API_KEY";
    pub const BASE_URL: &'static str = "HACKATIME_BASE_URL";
}

impl ConfigSource for EnvConfig {
    fn load(&self) -> DeliveryConfig {
        let base_url = optional_env(Self::BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        DeliveryConfig {
            api_key: optional_env(Self::API_KEY).unwrap_or_default(),
            base_url,
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// `1`, `true`, `yes` and `y` (any case) are on; everything else is off.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Network,
    File,
}

impl std::str::FromStr for SinkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network" | "http" => Ok(SinkKind::Network),
            "file" | "local" => Ok(SinkKind::File),
            other => bail!("unknown sink \"{}\" (expected \"network\" or \"file\")", other),
        }
    }
}

/// Settings of the `heartbeat-tracker` binary.
#[derive(Debug, Clone)]
pub struct Settings {
    pub sink: SinkKind,
    pub data_dir: PathBuf,
    pub editor: String,
    pub editor_version: String,
    /// Lowers the default log level to debug.
    pub debug: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let sink = match optional_env("HEARTBEAT_SINK") {
            Some(s) => s.parse::<SinkKind>().context("failed to parse \"HEARTBEAT_SINK\"")?,
            None => SinkKind::Network,
        };

        let data_dir = match optional_env("HEARTBEAT_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .context("failed to locate a data directory, set \"HEARTBEAT_DATA_DIR\"")?
                .join(env!("CARGO_PKG_NAME")),
        };

        Ok(Self {
            sink,
            data_dir,
            editor: optional_env("HEARTBEAT_EDITOR").unwrap_or_else(|| "vscode".to_string()),
            editor_version: optional_env("HEARTBEAT_EDITOR_VERSION")
                .unwrap_or_else(|| "unknown".to_string()),
            debug: optional_env("HEARTBEAT_DEBUG").map_or(false, |v| parse_flag(&v)),
        })
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join(crate::logging::LOGS_DIR)
    }
}
