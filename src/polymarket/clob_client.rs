use reqwest::{Client, RequestBuilder};
use thiserror::Error;

use super::auth::PolymarketAuth;
use super::types::ApiOrderBook;

pub const CLOB_API_BASE: &str = "https://clob.polymarket.com";

#[derive(Debug, Error)]
pub enum ClobClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication error: {0}")]
    Auth(#[from] super::auth::AuthError),
}

/// Authenticated CLOB REST client for a single set of API credentials.
#[derive(Debug, Clone)]
pub struct ClobClient {
    http: Client,
    auth: PolymarketAuth,
    base_url: String,
}

impl ClobClient {
    pub fn new(http: Client, auth: PolymarketAuth, base_url: impl Into<String>) -> Self {
        Self {
            http,
            auth,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build an authenticated GET request with HMAC signature headers.
    fn authenticated_get(&self, path: &str) -> Result<RequestBuilder, ClobClientError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.auth.sign(&timestamp, "GET", path, "")?;

        let url = format!("{}{}", self.base_url, path);
        let req = self
            .http
            .get(&url)
            .header("POLY_API_KEY", &self.auth.api_key)
            .header("POLY_SIGNATURE", signature)
            .header("POLY_TIMESTAMP", &timestamp)
            .header("POLY_PASSPHRASE", &self.auth.passphrase);

        Ok(req)
    }

    /// Fetch order book for a specific token.
    pub async fn get_order_book(&self, token_id: &str) -> Result<ApiOrderBook, ClobClientError> {
        let path = format!("/book?token_id={token_id}");
        let resp = self
            .authenticated_get(&path)?
            .send()
            .await?
            .error_for_status()?;

        let book: ApiOrderBook = resp.json().await?;
        Ok(book)
    }
}
