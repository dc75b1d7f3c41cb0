use std::time::Duration;

use field_protocol::{GAME_STATE_FILE, GameSnapshot};
use navigator::{FetchError, TelemetrySource};

use crate::config::ConnectorConfig;

/// Polls the field server's game-state file over HTTP.
pub struct HttpTelemetry {
    http: reqwest::Client,
    url: String,
    timeout_ms: u64,
}

impl HttpTelemetry {
    pub fn new(config: &ConnectorConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.fetch_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            url: game_state_url(&config.server),
            timeout_ms: config.fetch_timeout_ms,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TelemetrySource for HttpTelemetry {
    async fn fetch(&mut self) -> Result<GameSnapshot, FetchError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.transport(e))?;
        decode(&body)
    }
}

impl HttpTelemetry {
    fn transport(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout_ms)
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Full URL of the game-state file on `server`. A bare host gets `http://`.
pub fn game_state_url(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    if server.contains("://") {
        format!("{server}/{GAME_STATE_FILE}")
    } else {
        format!("http://{server}/{GAME_STATE_FILE}")
    }
}

/// Parse a response body; errors carry the start of the body.
pub fn decode(body: &[u8]) -> Result<GameSnapshot, FetchError> {
    serde_json::from_slice(body).map_err(|e| {
        let text = String::from_utf8_lossy(body);
        let snippet: String = text.chars().take(80).collect();
        FetchError::Decode(format!("{e} in {snippet:?}"))
    })
}
