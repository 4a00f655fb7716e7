use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::credentials::PmCredentials;
use crate::polymarket::clob_client::ClobClientError;
use crate::polymarket::data_client::DataClientError;
use crate::polymarket::{ClobClient, DataClient, PolymarketAuth, PolymarketWallet, TradingClient};

use super::exchange::{
    ExchangeAdapter, ExchangeError, OrderAck, OrderBookTop, OrderRequest, PositionSnapshot,
};

/// Network-backed Polymarket CLOB exchange.
///
/// Order books are read with the user's L2 API credentials; orders are signed
/// with the user's private key through the SDK. SDK wallets authenticate on
/// construction, so they are cached per signer address.
pub struct LiveExchange {
    http: reqwest::Client,
    clob_url: String,
    data_client: DataClient,
    wallets: Mutex<HashMap<String, Arc<PolymarketWallet>>>,
}

impl LiveExchange {
    pub fn new(http: reqwest::Client, clob_url: impl Into<String>, data_url: impl Into<String>) -> Self {
        Self {
            data_client: DataClient::new(http.clone(), data_url),
            http,
            clob_url: clob_url.into(),
            wallets: Mutex::new(HashMap::new()),
        }
    }

    async fn wallet_for(&self, creds: &PmCredentials) -> Result<Arc<PolymarketWallet>, ExchangeError> {
        let private_key = creds.private_key.as_deref().ok_or(ExchangeError::MissingSigner)?;
        let address =
            PolymarketWallet::address_of(private_key).map_err(|e| ExchangeError::Sdk(e.to_string()))?;

        let cached = self.wallets.lock().await.get(&address).cloned();
        if let Some(wallet) = cached {
            return Ok(wallet);
        }

        // Authenticate without holding the lock; a concurrent miss for the same
        // address keeps whichever wallet was inserted first.
        let wallet = PolymarketWallet::new(private_key, &self.clob_url)
            .await
            .map_err(|e| ExchangeError::Sdk(e.to_string()))?;
        tracing::info!(address = %address, "Authenticated CLOB wallet");

        let mut wallets = self.wallets.lock().await;
        let cached = wallets.entry(address).or_insert_with(|| Arc::new(wallet));
        Ok(Arc::clone(cached))
    }
}

impl From<ClobClientError> for ExchangeError {
    fn from(e: ClobClientError) -> Self {
        match e {
            ClobClientError::Http(e) => ExchangeError::Http(e),
            ClobClientError::Auth(e) => ExchangeError::Auth(e),
        }
    }
}

impl From<DataClientError> for ExchangeError {
    fn from(e: DataClientError) -> Self {
        match e {
            DataClientError::Http(e) => ExchangeError::Http(e),
            DataClientError::Url(msg) => ExchangeError::Unexpected(msg),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for LiveExchange {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn get_orderbook(
        &self,
        token_id: &str,
        creds: &PmCredentials,
    ) -> Result<OrderBookTop, ExchangeError> {
        let client = ClobClient::new(
            self.http.clone(),
            PolymarketAuth::from_credentials(creds),
            self.clob_url.clone(),
        );
        let book = client.get_order_book(token_id).await?;

        Ok(OrderBookTop {
            bid: book.best_bid().unwrap_or(Decimal::ZERO),
            ask: book.best_ask().unwrap_or(Decimal::ZERO),
        })
    }

    async fn place_order(
        &self,
        order: &OrderRequest,
        creds: &PmCredentials,
    ) -> Result<OrderAck, ExchangeError> {
        let wallet = self.wallet_for(creds).await?;
        let trading = TradingClient::new(wallet);

        let response = trading
            .place_limit_order(&order.token_id, order.side, order.size_shares, order.price)
            .await
            .map_err(|e| ExchangeError::Sdk(e.to_string()))?;

        if !response.success || response.order_id.is_empty() {
            return Err(ExchangeError::Rejected(
                response
                    .error_msg
                    .unwrap_or_else(|| "order not accepted".into()),
            ));
        }

        Ok(OrderAck {
            order_id: response.order_id,
        })
    }

    async fn get_positions(
        &self,
        creds: &PmCredentials,
    ) -> Result<Vec<PositionSnapshot>, ExchangeError> {
        let wallet = self.wallet_for(creds).await?;
        let positions = self.data_client.get_positions(&wallet.wallet_address()).await?;

        Ok(positions
            .into_iter()
            .map(|p| PositionSnapshot {
                token_id: p.asset,
                shares: p.size.unwrap_or(Decimal::ZERO),
                avg_entry: p.avg_price.unwrap_or(Decimal::ZERO),
                current_price: p.cur_price.unwrap_or(Decimal::ZERO),
            })
            .collect())
    }
}
