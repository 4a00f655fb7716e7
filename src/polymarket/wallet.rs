use std::str::FromStr;

use alloy::signers::local::PrivateKeySigner;
use polymarket_client_sdk::auth::Signer;
use polymarket_client_sdk::clob::client::{Client, Config};
use polymarket_client_sdk::POLYGON;

type AuthenticatedClient =
    Client<polymarket_client_sdk::auth::state::Authenticated<polymarket_client_sdk::auth::Normal>>;

/// Wraps the authenticated Polymarket SDK client and signer for one user.
///
/// The private key is used once during construction and never stored as a string.
pub struct PolymarketWallet {
    signer: PrivateKeySigner,
    client: AuthenticatedClient,
}

impl PolymarketWallet {
    /// Create a new wallet from a hex-encoded private key (with or without `0x` prefix),
    /// authenticating against the CLOB at `clob_url`.
    pub async fn new(private_key: &str, clob_url: &str) -> anyhow::Result<Self> {
        let signer = PrivateKeySigner::from_str(private_key)?
            .with_chain_id(Some(POLYGON));

        let config = Config::default();
        let unauthenticated = Client::new(clob_url, config)?;

        let client = unauthenticated
            .authentication_builder(&signer)
            .authenticate()
            .await?;

        Ok(Self { signer, client })
    }

    /// Address controlled by `private_key`, derived locally without contacting the CLOB.
    pub fn address_of(private_key: &str) -> anyhow::Result<String> {
        let signer = PrivateKeySigner::from_str(private_key)?;
        Ok(format!("{}", signer.address()))
    }

    /// Return the wallet's Ethereum address as a checksummed hex string.
    pub fn wallet_address(&self) -> String {
        format!("{}", self.client.address())
    }

    /// Borrow the authenticated SDK client.
    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    /// Borrow the local signer (needed for order signing).
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}
