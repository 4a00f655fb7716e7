pub mod api;
pub mod config;
pub mod credentials;
pub mod db;
pub mod errors;
pub mod execution;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod polymarket;
pub mod store;

use std::sync::Arc;

use crate::credentials::MasterKey;
use crate::execution::ExchangeAdapter;
use crate::store::{BotStore, HistoryLedger};

/// Shared state for the reporting API.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BotStore>,
    pub ledger: Arc<dyn HistoryLedger>,
    pub exchange: Arc<dyn ExchangeAdapter>,
    pub master_key: MasterKey,
    /// Bearer token for `/api/*`; `None` disables auth.
    pub api_token: Option<String>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
