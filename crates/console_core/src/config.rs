use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8080";

/// Tunables for one engine instance. The defaults match the bridge console's
/// cadence: a 2 s status poll and a 5 s display window for command outcomes.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the bridge REST API, without a trailing slash.
    pub api_base: String,
    /// Interval between status polls; the first poll fires immediately.
    pub poll_interval: Duration,
    /// How long a command outcome stays visible before it auto-clears.
    pub outcome_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            poll_interval: Duration::from_millis(2000),
            outcome_ttl: Duration::from_millis(5000),
        }
    }
}
