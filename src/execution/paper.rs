use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::credentials::PmCredentials;
use crate::models::Side;

use super::exchange::{
    ExchangeAdapter, ExchangeError, OrderAck, OrderBookTop, OrderRequest, PositionSnapshot,
};

/// Deterministic exchange double.
///
/// Quotes a fixed book (per-token overrides allowed), hands out sequential
/// `paper-<n>` order ids, and keeps every accepted order so positions can be
/// derived from them. Failures can be injected for either call.
#[derive(Clone)]
pub struct PaperExchange {
    inner: Arc<Mutex<PaperInner>>,
}

struct PaperInner {
    default_book: OrderBookTop,
    books: HashMap<String, OrderBookTop>,
    next_order: u64,
    orders: Vec<OrderRequest>,
    reject_orders: Option<String>,
    book_unavailable: bool,
}

impl Default for PaperExchange {
    fn default() -> Self {
        Self::new(OrderBookTop {
            bid: Decimal::new(49, 2),
            ask: Decimal::new(51, 2),
        })
    }
}

impl PaperExchange {
    pub fn new(default_book: OrderBookTop) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PaperInner {
                default_book,
                books: HashMap::new(),
                next_order: 1,
                orders: Vec::new(),
                reject_orders: None,
                book_unavailable: false,
            })),
        }
    }

    /// Quote `book` for `token_id` instead of the default.
    pub async fn set_book(&self, token_id: &str, book: OrderBookTop) {
        self.inner.lock().await.books.insert(token_id.to_string(), book);
    }

    /// Reject every subsequent order with `message`; `None` accepts again.
    pub async fn reject_orders(&self, message: Option<&str>) {
        self.inner.lock().await.reject_orders = message.map(str::to_string);
    }

    pub async fn set_book_unavailable(&self, unavailable: bool) {
        self.inner.lock().await.book_unavailable = unavailable;
    }

    /// Every order accepted so far, in placement order.
    pub async fn placed_orders(&self) -> Vec<OrderRequest> {
        self.inner.lock().await.orders.clone()
    }
}

#[async_trait]
impl ExchangeAdapter for PaperExchange {
    fn name(&self) -> &'static str {
        "paper"
    }

    async fn get_orderbook(
        &self,
        token_id: &str,
        _creds: &PmCredentials,
    ) -> Result<OrderBookTop, ExchangeError> {
        let inner = self.inner.lock().await;
        if inner.book_unavailable {
            return Err(ExchangeError::Unexpected(format!(
                "paper book unavailable for {token_id}"
            )));
        }
        Ok(inner.books.get(token_id).copied().unwrap_or(inner.default_book))
    }

    async fn place_order(
        &self,
        order: &OrderRequest,
        _creds: &PmCredentials,
    ) -> Result<OrderAck, ExchangeError> {
        let mut inner = self.inner.lock().await;
        if let Some(message) = &inner.reject_orders {
            return Err(ExchangeError::Rejected(message.clone()));
        }

        let order_id = format!("paper-{}", inner.next_order);
        inner.next_order += 1;
        inner.orders.push(order.clone());

        tracing::info!(
            order_id = %order_id,
            token_id = %order.token_id,
            side = %order.side,
            size = %order.size_shares,
            price = %order.price,
            "[PAPER] Order accepted"
        );

        Ok(OrderAck { order_id })
    }

    async fn get_positions(
        &self,
        _creds: &PmCredentials,
    ) -> Result<Vec<PositionSnapshot>, ExchangeError> {
        let inner = self.inner.lock().await;

        // token → (net shares, bought shares, bought cost)
        let mut totals: HashMap<&str, (Decimal, Decimal, Decimal)> = HashMap::new();
        for order in &inner.orders {
            let entry = totals
                .entry(order.token_id.as_str())
                .or_insert((Decimal::ZERO, Decimal::ZERO, Decimal::ZERO));
            match order.side {
                Side::Buy => {
                    entry.0 = entry.0.saturating_add(order.size_shares);
                    entry.1 = entry.1.saturating_add(order.size_shares);
                    entry.2 = entry.2.saturating_add(order.size_shares.saturating_mul(order.price));
                }
                Side::Sell => entry.0 = entry.0.saturating_sub(order.size_shares),
            }
        }

        let mut positions: Vec<PositionSnapshot> = totals
            .into_iter()
            .filter(|(_, (net, _, _))| *net > Decimal::ZERO)
            .map(|(token_id, (net, bought, cost))| {
                let book = inner.books.get(token_id).copied().unwrap_or(inner.default_book);
                PositionSnapshot {
                    token_id: token_id.to_string(),
                    shares: net,
                    avg_entry: cost.checked_div(bought).unwrap_or(Decimal::ZERO),
                    current_price: book.bid,
                }
            })
            .collect();
        positions.sort_by(|a, b| a.token_id.cmp(&b.token_id));

        Ok(positions)
    }
}
