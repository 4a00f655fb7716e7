use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use polymirror::credentials::{encrypt_json, MasterKey, PmCredentials};
use polymirror::execution::{CopyEngine, CopyEngineConfig, EngineDeps, ExchangeAdapter, PaperExchange};
use polymirror::ingestion::signal_feed::{filter_since, SignalFeedError, SignalSource};
use polymirror::models::{ActiveUser, BotConfig, Side, Signal};
use polymirror::store::MemoryStore;

#[allow(dead_code)]
pub fn master_key() -> MasterKey {
    MasterKey::parse(&"42".repeat(32)).expect("valid test key")
}

#[allow(dead_code)]
pub fn test_creds() -> PmCredentials {
    PmCredentials {
        key: "api-key".into(),
        secret: "c2VjcmV0LXNlY3JldC1zZWNyZXQ=".into(),
        passphrase: "pass".into(),
        private_key: None,
    }
}

#[allow(dead_code)]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Permissive defaults: half the notional, $100 cap, $1 floor, 5% slippage, no cooldown.
#[allow(dead_code)]
pub fn bot_config(targets: &[&str]) -> BotConfig {
    BotConfig {
        targets: targets.iter().map(|t| t.to_string()).collect(),
        multiplier: Decimal::new(5, 1),
        max_trade_usd: Decimal::from(100),
        min_notional_usd: Decimal::ONE,
        max_slippage_bps: 500,
        copy_delay_ms: 0,
    }
}

#[allow(dead_code)]
pub fn signal(id: &str, wallet: &str, token: &str, price: Decimal, notional: Decimal, ts: i64) -> Signal {
    Signal {
        signal_id: id.into(),
        source_wallet: wallet.into(),
        market_id: format!("market-{token}"),
        token_id: token.into(),
        outcome: "Yes".into(),
        side: Side::Buy,
        price,
        notional_usd: notional,
        ts,
    }
}

/// Enable a user and store their encrypted credentials.
#[allow(dead_code)]
pub async fn seed_user(store: &MemoryStore, user_id: &str, config: BotConfig) {
    store
        .upsert_user(
            ActiveUser {
                user_id: user_id.into(),
                config,
            },
            true,
        )
        .await;
    let blob = encrypt_json(&master_key(), &test_creds()).expect("encrypt test creds");
    store.set_credential_blob(user_id, &blob).await;
}

#[allow(dead_code)]
pub fn fast_engine_config() -> CopyEngineConfig {
    CopyEngineConfig {
        fetch_limit: 50,
        call_timeout: Duration::from_millis(500),
        cycle_deadline: Duration::from_secs(5),
        max_concurrent_users: 1,
        lookback_window_ms: 60_000,
    }
}

#[allow(dead_code)]
pub fn build_engine(
    store: &MemoryStore,
    ledger: &MemoryStore,
    source: &Arc<ScriptedSource>,
    exchange: &PaperExchange,
    config: CopyEngineConfig,
) -> CopyEngine {
    build_engine_with_exchange(store, ledger, source, Arc::new(exchange.clone()), config)
}

#[allow(dead_code)]
pub fn build_engine_with_exchange(
    store: &MemoryStore,
    ledger: &MemoryStore,
    source: &Arc<ScriptedSource>,
    exchange: Arc<dyn ExchangeAdapter>,
    config: CopyEngineConfig,
) -> CopyEngine {
    CopyEngine::new(
        EngineDeps {
            store: Arc::new(store.clone()),
            ledger: Arc::new(ledger.clone()),
            signals: source.clone(),
            exchange,
            master_key: master_key(),
        },
        config,
    )
}

/// Signal source serving a fixed list of trades, with the same `since`
/// filtering as the HTTP feed.
#[derive(Default)]
pub struct ScriptedSource {
    signals: Mutex<Vec<Signal>>,
    failing_wallets: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedSource {
    pub fn new(signals: Vec<Signal>) -> Arc<Self> {
        Arc::new(Self {
            signals: Mutex::new(signals),
            ..Self::default()
        })
    }

    pub fn push(&self, signal: Signal) {
        self.signals.lock().unwrap().push(signal);
    }

    /// Any fetch that includes `wallet` answers HTTP 502.
    pub fn fail_wallet(&self, wallet: &str) {
        self.failing_wallets.lock().unwrap().insert(wallet.to_string());
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalSource for ScriptedSource {
    async fn fetch_signals(
        &self,
        addresses: &[String],
        since_ts: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Signal>, SignalFeedError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = {
            let failing = self.failing_wallets.lock().unwrap();
            addresses.iter().any(|a| failing.contains(a))
        };
        if failing {
            return Err(SignalFeedError::Status(502));
        }

        let matching: Vec<Signal> = self
            .signals
            .lock()
            .unwrap()
            .iter()
            .filter(|s| addresses.contains(&s.source_wallet))
            .take(limit as usize)
            .cloned()
            .collect();

        Ok(filter_since(matching, since_ts))
    }
}

/// Connect to the Postgres test database and run migrations, or `None` when
/// `TEST_DATABASE_URL` is not set.
#[allow(dead_code)]
pub async fn setup_test_db() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}
