use reqwest::Client;
use thiserror::Error;

use super::types::ApiPosition;

pub const DATA_API_BASE: &str = "https://data-api.polymarket.com";

#[derive(Debug, Error)]
pub enum DataClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(String),
}

#[derive(Debug, Clone)]
pub struct DataClient {
    http: Client,
    base_url: String,
}

impl DataClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch current positions held by a wallet address.
    pub async fn get_positions(&self, address: &str) -> Result<Vec<ApiPosition>, DataClientError> {
        let mut url = reqwest::Url::parse(&format!("{}/positions", self.base_url))
            .map_err(|e| DataClientError::Url(e.to_string()))?;
        url.query_pairs_mut().append_pair("user", address);

        let resp = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?;

        let positions: Vec<ApiPosition> = resp.json().await?;
        Ok(positions)
    }
}
