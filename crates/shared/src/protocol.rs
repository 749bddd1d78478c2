use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

/// Severity letter used by the bridge's compact log encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    #[serde(rename = "I")]
    Info,
    #[serde(rename = "E")]
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => f.write_str("INFO"),
            LogLevel::Error => f.write_str("ERROR"),
        }
    }
}

/// One entry of the bridge's rolling event log. The bridge truncates the log
/// server-side; entries arrive newest-first and are never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "t")]
    pub timestamp: i64,
    #[serde(rename = "l")]
    pub level: LogLevel,
    #[serde(rename = "m")]
    pub message: String,
}

/// Snapshot served by `GET /api/stats`. Wire keys are the bridge's compact
/// names; epochs are unix seconds with `0` meaning "never".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeStats {
    #[serde(rename = "run")]
    pub running: bool,
    #[serde(rename = "ser")]
    pub serial_connected: bool,
    #[serde(rename = "cli")]
    pub client_count: u32,
    #[serde(rename = "tot")]
    pub total_connections: u64,
    #[serde(rename = "i2r")]
    pub ip_to_serial: u64,
    #[serde(rename = "r2i")]
    pub serial_to_ip: u64,
    #[serde(rename = "act")]
    pub last_activity: i64,
    #[serde(rename = "start")]
    pub started_at: i64,
    #[serde(rename = "port")]
    pub serial_port: String,
    #[serde(rename = "baud")]
    pub baud_rate: u32,
    #[serde(rename = "vport")]
    pub visca_port: u16,
    #[serde(default)]
    pub log: Vec<LogEntry>,
}

/// Body of `POST /api/cmd`. The hex text is passed through verbatim; syntax
/// validation is the bridge's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub hex: String,
}

/// Reply to `POST /api/cmd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<u64>,
}

/// Preset key → raw hex command, as served by `GET /api/presets`.
pub type PresetMap = HashMap<String, String>;
