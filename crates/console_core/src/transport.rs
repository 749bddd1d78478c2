use async_trait::async_trait;
use reqwest::Client;
use shared::protocol::{BridgeStats, CommandReply, CommandRequest, PresetMap};
use thiserror::Error;

/// Error from one REST round trip against the bridge.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

/// Seam between the engine and the bridge's three REST endpoints.
///
/// Tests substitute scripted implementations; production uses
/// [`HttpBridgeApi`].
#[async_trait]
pub trait BridgeApi: Send + Sync {
    async fn fetch_stats(&self) -> Result<BridgeStats, TransportError>;
    async fn fetch_presets(&self) -> Result<PresetMap, TransportError>;
    async fn send_command(&self, hex: &str) -> Result<CommandReply, TransportError>;
}

pub struct HttpBridgeApi {
    http: Client,
    api_base: String,
}

impl HttpBridgeApi {
    pub fn new(api_base: impl Into<String>) -> Self {
        let api_base = api_base.into();
        Self {
            http: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

#[async_trait]
impl BridgeApi for HttpBridgeApi {
    async fn fetch_stats(&self) -> Result<BridgeStats, TransportError> {
        let res = self
            .http
            .get(self.url("/api/stats"))
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    async fn fetch_presets(&self) -> Result<PresetMap, TransportError> {
        let res = self
            .http
            .get(self.url("/api/presets"))
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    async fn send_command(&self, hex: &str) -> Result<CommandReply, TransportError> {
        // The bridge reports command failures in the body (`ok: false`), not
        // via the HTTP status, so the status is not checked here.
        let res = self
            .http
            .post(self.url("/api/cmd"))
            .json(&CommandRequest {
                hex: hex.to_string(),
            })
            .send()
            .await?;
        Ok(res.json().await?)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
