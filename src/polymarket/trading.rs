use std::sync::Arc;

use polymarket_client_sdk::clob::types::response::PostOrderResponse;
use polymarket_client_sdk::clob::types::Side as SdkSide;
use polymarket_client_sdk::types::U256;
use rust_decimal::Decimal;

use crate::models::Side;

use super::wallet::PolymarketWallet;

/// Order placement through the Polymarket SDK client.
pub struct TradingClient {
    wallet: Arc<PolymarketWallet>,
}

impl TradingClient {
    pub fn new(wallet: Arc<PolymarketWallet>) -> Self {
        Self { wallet }
    }

    /// Place a limit order on the CLOB.
    ///
    /// * `token_id`: CTF token ID (decimal string, or hex with `0x`).
    /// * `size`: number of shares.
    /// * `price`: price per share (0..1).
    pub async fn place_limit_order(
        &self,
        token_id: &str,
        side: Side,
        size: Decimal,
        price: Decimal,
    ) -> anyhow::Result<PostOrderResponse> {
        let sdk_side = match side {
            Side::Buy => SdkSide::Buy,
            Side::Sell => SdkSide::Sell,
        };

        let token_id_u256 = U256::from_str_radix(token_id, 10)
            .or_else(|_| {
                // Try hex if decimal parse fails
                token_id
                    .strip_prefix("0x")
                    .map(|hex| U256::from_str_radix(hex, 16))
                    .unwrap_or_else(|| U256::from_str_radix(token_id, 16))
            })?;

        let client = self.wallet.client();
        let signer = self.wallet.signer();

        let signable_order = client
            .limit_order()
            .token_id(token_id_u256)
            .side(sdk_side)
            .price(price)
            .size(size)
            .build()
            .await?;

        let signed_order = client.sign(signer, signable_order).await?;
        let response = client.post_order(signed_order).await?;

        tracing::info!(
            order_id = %response.order_id,
            success = response.success,
            "Order submitted to CLOB"
        );

        Ok(response)
    }
}
