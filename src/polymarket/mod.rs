pub mod auth;
pub mod clob_client;
pub mod data_client;
pub mod trading;
pub mod types;
pub mod wallet;

pub use auth::PolymarketAuth;
pub use clob_client::ClobClient;
pub use data_client::DataClient;
pub use trading::TradingClient;
pub use types::{ApiOrderBook, ApiPosition};
pub use wallet::PolymarketWallet;
