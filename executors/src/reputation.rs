use std::collections::HashMap;

use alloy::primitives::Address;
use reqwest::Url;
use spotter_core::error::ProtocolError;

pub const DEFAULT_LEADERBOARD_URL: &str =
    "https://raw.githubusercontent.com/exorde-labs/TestnetProtocol/main/Stats/leaderboard.json";

/// Public leaderboard, `{address: score}`
pub struct ReputationReader {
    pub url: Url,
    pub client: reqwest::Client,
}

impl ReputationReader {
    pub fn new(url: &str) -> Result<Self, ProtocolError> {
        let url = Url::parse(url).map_err(|e| ProtocolError::Config {
            message: format!("Invalid leaderboard URL {url}: {e}"),
        })?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProtocolError::Config {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self { url, client })
    }

    /// Score of `worker`, 0 when the leaderboard does not list it
    pub async fn fetch(&self, worker: Address) -> Result<f64, ProtocolError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ProtocolError::network(format!("leaderboard request failed: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| ProtocolError::network(format!("leaderboard body unreadable: {e}")))?;

        Ok(score_for(&parse_leaderboard(&body)?, worker))
    }

    /// Logs the current score. Failures only produce a warning.
    pub async fn log_current(&self, worker: Address) {
        match self.fetch(worker).await {
            Ok(score) => tracing::info!(worker = %worker, "Current rep = {score:.4}"),
            Err(e) => tracing::warn!(worker = %worker, error = %e, "Could not read reputation"),
        }
    }
}

pub fn parse_leaderboard(body: &str) -> Result<HashMap<String, f64>, ProtocolError> {
    serde_json::from_str(body).map_err(|e| ProtocolError::Decode {
        function: "leaderboard".to_string(),
        message: e.to_string(),
    })
}

/// Leaderboard keys are checksummed but lookups tolerate any casing
pub fn score_for(leaderboard: &HashMap<String, f64>, worker: Address) -> f64 {
    let checksummed = worker.to_checksum(None);
    leaderboard
        .get(&checksummed)
        .copied()
        .or_else(|| {
            leaderboard
                .iter()
                .find(|(address, _)| address.eq_ignore_ascii_case(&checksummed))
                .map(|(_, score)| *score)
        })
        .unwrap_or(0.0)
}
