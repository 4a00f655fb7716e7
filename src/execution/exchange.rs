use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::PmCredentials;
use crate::models::Side;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication error: {0}")]
    Auth(#[from] crate::polymarket::auth::AuthError),

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("credentials carry no private key; cannot sign orders")]
    MissingSigner,

    #[error("SDK error: {0}")]
    Sdk(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Best prices on each side of a token's book. A side with no levels is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookTop {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl OrderBookTop {
    /// The price a copy would trade against: the ask when buying, the bid when selling.
    pub fn reference_price(&self, side: Side) -> Decimal {
        match side {
            Side::Buy => self.ask,
            Side::Sell => self.bid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub token_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size_shares: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub token_id: String,
    pub shares: Decimal,
    pub avg_entry: Decimal,
    pub current_price: Decimal,
}

/// Order-book lookup and order placement against the exchange, on behalf of
/// one user's credentials. Every call is a network operation that may fail
/// independently of the others.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    async fn get_orderbook(
        &self,
        token_id: &str,
        creds: &PmCredentials,
    ) -> Result<OrderBookTop, ExchangeError>;

    async fn place_order(
        &self,
        order: &OrderRequest,
        creds: &PmCredentials,
    ) -> Result<OrderAck, ExchangeError>;

    async fn get_positions(
        &self,
        creds: &PmCredentials,
    ) -> Result<Vec<PositionSnapshot>, ExchangeError>;
}

/// Which exchange backend the worker talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeBackend {
    Paper,
    Live,
}

impl ExchangeBackend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "paper" | "dry_run" | "dry-run" => Some(ExchangeBackend::Paper),
            "live" | "clob" => Some(ExchangeBackend::Live),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExchangeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeBackend::Paper => write!(f, "paper"),
            ExchangeBackend::Live => write!(f, "live"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_price_uses_opposite_side() {
        let book = OrderBookTop {
            bid: Decimal::new(49, 2),
            ask: Decimal::new(51, 2),
        };
        assert_eq!(book.reference_price(Side::Buy), Decimal::new(51, 2));
        assert_eq!(book.reference_price(Side::Sell), Decimal::new(49, 2));
    }

    #[test]
    fn backend_parsing() {
        assert_eq!(ExchangeBackend::from_str("paper"), Some(ExchangeBackend::Paper));
        assert_eq!(ExchangeBackend::from_str(" LIVE "), Some(ExchangeBackend::Live));
        assert_eq!(ExchangeBackend::from_str("mainnet"), None);
    }
}
