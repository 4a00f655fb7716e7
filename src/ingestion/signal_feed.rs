use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Side, Signal};

pub const DEFAULT_SIGNAL_LIMIT: u32 = 50;

#[derive(Debug, Error)]
pub enum SignalFeedError {
    #[error("signal_feed_http_{0}")]
    Status(u16),

    #[error("signal feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid signal feed URL: {0}")]
    InvalidUrl(String),
}

/// Source of normalized trade signals for a set of wallets.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Signals for `addresses`, newer than `since_ts` (strictly) when given.
    /// An empty address list returns no signals without touching the network.
    async fn fetch_signals(
        &self,
        addresses: &[String],
        since_ts: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Signal>, SignalFeedError>;
}

/// HTTP client for the upstream trades feed:
/// `GET <base>?traders=<a,b,c>&limit=<n>` → `{ "data": { "trades": [...] } }`.
#[derive(Debug, Clone)]
pub struct SignalFeedClient {
    http: Client,
    base_url: reqwest::Url,
}

impl SignalFeedClient {
    pub fn new(http: Client, base_url: &str) -> Result<Self, SignalFeedError> {
        let base_url =
            reqwest::Url::parse(base_url).map_err(|e| SignalFeedError::InvalidUrl(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    fn query_url(&self, addresses: &[String], limit: u32) -> reqwest::Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("traders", &addresses.join(","))
            .append_pair("limit", &limit.to_string());
        url
    }
}

#[async_trait]
impl SignalSource for SignalFeedClient {
    async fn fetch_signals(
        &self,
        addresses: &[String],
        since_ts: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Signal>, SignalFeedError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let resp = self
            .http
            .get(self.query_url(addresses, limit))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SignalFeedError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        let payload: Value = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Signal feed body is not JSON; treating as no trades");
                Value::Null
            }
        };

        let signals = parse_feed(&payload);
        tracing::debug!(
            wallets = addresses.len(),
            fetched = signals.len(),
            "Signal feed polled"
        );

        Ok(filter_since(signals, since_ts))
    }
}

/// Normalize every trade under `data.trades`. A missing list is zero trades.
pub fn parse_feed(payload: &Value) -> Vec<Signal> {
    payload
        .get("data")
        .and_then(|d| d.get("trades"))
        .and_then(Value::as_array)
        .map(|trades| trades.iter().filter_map(normalize_trade).collect())
        .unwrap_or_default()
}

/// Keep only signals strictly newer than `since_ts`.
pub fn filter_since(signals: Vec<Signal>, since_ts: Option<i64>) -> Vec<Signal> {
    match since_ts {
        Some(since) => signals.into_iter().filter(|s| s.ts > since).collect(),
        None => signals,
    }
}

/// Normalize one upstream trade. Returns `None` only for non-object entries.
pub fn normalize_trade(trade: &Value) -> Option<Signal> {
    if !trade.is_object() {
        return None;
    }

    // Feed timestamps are seconds; signals carry milliseconds. Values that do
    // not fit are treated like a missing timestamp.
    let ts = field_decimal(trade, "timestamp")
        .and_then(|secs| secs.checked_mul(Decimal::from(1_000)))
        .and_then(|ms| ms.round().to_i64())
        .unwrap_or(0);

    let source_wallet = field_string(trade, "traderAddress").unwrap_or_default();
    let market_id = field_string(trade, "eventSlug")
        .or_else(|| field_string(trade, "market"))
        .unwrap_or_default();
    let token_id = field_string(trade, "tokenId")
        .or_else(|| field_string(trade, "asset"))
        .unwrap_or_else(|| market_id.clone());
    let side = Side::from_feed_str(trade.get("side").and_then(Value::as_str));

    let signal_id = field_string(trade, "id")
        .unwrap_or_else(|| Signal::derive_id(&source_wallet, &market_id, ts, side));

    Some(Signal {
        signal_id,
        source_wallet,
        token_id,
        market_id,
        outcome: field_string(trade, "outcome").unwrap_or_else(|| "Unknown".into()),
        side,
        price: field_decimal(trade, "price").unwrap_or(Decimal::ZERO),
        notional_usd: field_decimal(trade, "amount").unwrap_or(Decimal::ZERO),
        ts,
    })
}

/// String or number field as text; null, empty and other shapes are absent.
fn field_string(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric field given either as a JSON number or a numeric string.
fn field_decimal(v: &Value, key: &str) -> Option<Decimal> {
    match v.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(s) => s.trim().parse::<Decimal>().ok(),
        _ => None,
    }
}
