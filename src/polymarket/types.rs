use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Order Book (CLOB API)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiOrderBookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiOrderBook {
    pub market: Option<String>,
    pub asset_id: Option<String>,
    #[serde(default)]
    pub bids: Vec<ApiOrderBookLevel>,
    #[serde(default)]
    pub asks: Vec<ApiOrderBookLevel>,
    pub hash: Option<String>,
    pub timestamp: Option<String>,
}

impl ApiOrderBook {
    /// Highest bid. Level ordering differs between endpoints, so scan them all.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.iter().map(|l| l.price).max()
    }

    /// Lowest ask.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.iter().map(|l| l.price).min()
    }
}

// ---------------------------------------------------------------------------
// Positions (Data API)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiPosition {
    pub asset: String,
    #[serde(default)]
    pub size: Option<Decimal>,
    #[serde(default, rename = "avgPrice")]
    pub avg_price: Option<Decimal>,
    #[serde(default, rename = "curPrice")]
    pub cur_price: Option<Decimal>,
}
