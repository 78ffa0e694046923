//! The `config.toml` schema (§6 "Persisted state"), loaded by the
//! `superchat` binary and hot-reloadable for the non-structural
//! sections (policy, rate limits, retention, session timeout), mirroring
//! `warpgate::config::{load_config, watch_config}`.

use std::path::PathBuf;

use std::net::SocketAddr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::ListenEndpoint;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub policy: PolicyConfig,
    pub limits: LimitsConfig,
    pub dm: DmConfig,
    pub directory: DirectoryConfig,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            policy: PolicyConfig::default(),
            limits: LimitsConfig::default(),
            dm: DmConfig::default(),
            directory: DirectoryConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub tcp: Option<ListenEndpoint>,
    pub websocket: Option<ListenEndpoint>,
    pub ssh: Option<ListenEndpoint>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            tcp: Some(
                "0.0.0.0:6465"
                    .parse::<SocketAddr>()
                    .expect("valid default addr")
                    .into(),
            ),
            websocket: Some(
                "0.0.0.0:6467"
                    .parse::<SocketAddr>()
                    .expect("valid default addr")
                    .into(),
            ),
            ssh: Some(
                "0.0.0.0:6466"
                    .parse::<SocketAddr>()
                    .expect("valid default addr")
                    .into(),
            ),
        }
    }
}

/// Policy knobs referenced by §9's Open Questions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PolicyConfig {
    /// Default deny, per §9 Open Question: "Whether anonymous users can
    /// create channels is policy-configurable; default deny."
    pub allow_anonymous_channel_creation: bool,
    /// Client-hint only; never enforced server-side (§9 Open Question).
    pub suggested_max_thread_depth: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow_anonymous_channel_creation: false,
            suggested_max_thread_depth: 8,
        }
    }
}

/// Hot-reloadable rate/size limits (§4.2, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_frame_bytes: u32,
    pub max_message_bytes: u32,
    pub session_timeout_seconds: u64,
    pub ping_interval_seconds: u64,
    pub write_deadline_seconds: u64,
    pub shutdown_flush_deadline_seconds: u64,
    pub messages_per_minute: u32,
    pub max_connections_per_ip: u32,
    pub max_channel_subscriptions: u32,
    pub max_thread_subscriptions: u32,
    pub write_queue_depth: usize,
    pub default_retention_hours: u32,
    pub checkpoint_interval_ms: u64,
    pub checkpoint_batch_threshold: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 1024 * 1024,
            max_message_bytes: 16 * 1024,
            session_timeout_seconds: 120,
            ping_interval_seconds: 30,
            write_deadline_seconds: 10,
            shutdown_flush_deadline_seconds: 5,
            messages_per_minute: 20,
            max_connections_per_ip: 10,
            max_channel_subscriptions: 100,
            max_thread_subscriptions: 200,
            write_queue_depth: 256,
            default_retention_hours: 24 * 30,
            checkpoint_interval_ms: 500,
            checkpoint_batch_threshold: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DmConfig {
    pub hkdf_salt: String,
}

impl Default for DmConfig {
    fn default() -> Self {
        Self {
            hkdf_salt: "superchat-dm-v1".to_owned(),
        }
    }
}

/// Optional self-registration against a remote directory index (§2).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DirectoryConfig {
    pub enable: bool,
    pub endpoint: Option<String>,
    pub public_hostname: Option<String>,
    pub refresh_interval_seconds: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            enable: false,
            endpoint: None,
            public_hostname: None,
            refresh_interval_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
        }
    }
}
