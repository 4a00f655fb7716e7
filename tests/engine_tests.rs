mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use polymirror::credentials::PmCredentials;
use polymirror::execution::exchange::{OrderAck, OrderRequest, PositionSnapshot};
use polymirror::execution::{run_copy_engine, ExchangeAdapter, ExchangeError, OrderBookTop, PaperExchange};
use polymirror::models::{HistoryStatus, Side};
use polymirror::store::{HistoryLedger, MemoryStore};

use common::{
    bot_config, build_engine, build_engine_with_exchange, fast_engine_config, now_ms, seed_user, signal,
    ScriptedSource,
};

const WALLET: &str = "0xtarget";

fn half() -> Decimal {
    Decimal::new(5, 1)
}

#[tokio::test]
async fn test_accepted_trade_is_recorded_and_logged() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&[WALLET])).await;

    let ts = now_ms() - 5_000;
    let source = ScriptedSource::new(vec![signal("s1", WALLET, "tok", half(), Decimal::from(40), ts)]);
    let exchange = PaperExchange::default();
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.signals, 1);

    // 0.5 × $40 = $20 at 0.5 → 40 shares
    let orders = exchange.placed_orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, Side::Buy);
    assert_eq!(orders[0].price, half());
    assert_eq!(orders[0].size_shares, Decimal::from(40));

    let rows = store.history_for("alice").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status(), Some(HistoryStatus::Accepted));
    assert_eq!(rows[0].requested_usd, Decimal::from(20));
    assert_eq!(rows[0].requested_shares, Decimal::from(40));
    assert_eq!(rows[0].order_id.as_deref(), Some("paper-1"));
    assert_eq!(rows[0].reason, None);

    let logs = store.logs_for("alice").await;
    assert!(logs.iter().any(|l| l.level == "info" && l.message.starts_with("Placing order")));
    assert!(logs.iter().any(|l| l.level == "success" && l.message.contains("paper-1")));

    assert_eq!(engine.tracker().peek("alice").unwrap().last_signal_ts, ts);
}

#[tokio::test]
async fn test_restart_does_not_execute_recorded_signal_again() {
    let ledger = MemoryStore::new();
    let first_store = MemoryStore::new();
    seed_user(&first_store, "alice", bot_config(&[WALLET])).await;

    let source = ScriptedSource::new(vec![signal(
        "dup",
        WALLET,
        "tok",
        half(),
        Decimal::from(40),
        now_ms() - 5_000,
    )]);
    let exchange = PaperExchange::default();

    let mut engine = build_engine(&first_store, &ledger, &source, &exchange, fast_engine_config());
    assert_eq!(engine.tick().await.unwrap().accepted, 1);

    // Crash before the state cache was written: a new process with no cached
    // watermark sees the same signal again.
    let fresh_store = MemoryStore::new();
    seed_user(&fresh_store, "alice", bot_config(&[WALLET])).await;
    let mut restarted = build_engine(&fresh_store, &ledger, &source, &exchange, fast_engine_config());

    let summary = restarted.tick().await.unwrap();
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.accepted, 0);

    assert_eq!(exchange.placed_orders().await.len(), 1);
    let rows = ledger.history_for("alice").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status(), Some(HistoryStatus::Accepted));
}

#[tokio::test]
async fn test_second_signal_on_token_within_cooldown_is_skipped() {
    let store = MemoryStore::new();
    let mut config = bot_config(&[WALLET]);
    config.copy_delay_ms = 60_000;
    seed_user(&store, "alice", config).await;

    let now = now_ms();
    let source = ScriptedSource::new(vec![
        signal("first", WALLET, "tok", half(), Decimal::from(40), now - 5_000),
        signal("second", WALLET, "tok", half(), Decimal::from(40), now - 4_000),
        signal("other-token", WALLET, "tok-2", half(), Decimal::from(40), now - 3_000),
    ]);
    let exchange = PaperExchange::default();
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.accepted, 2);
    assert_eq!(summary.skipped, 1);

    let second = store.get("alice", "second").await.unwrap().unwrap();
    assert_eq!(second.status(), Some(HistoryStatus::Skipped));
    assert_eq!(second.reason.as_deref(), Some("cooldown"));
    assert_eq!(second.requested_usd, Decimal::ZERO);

    let cached = store.cached_state("alice").await.unwrap();
    assert!(cached.last_trade("tok") > 0);
    assert!(cached.last_trade("tok-2") > 0);
}

#[tokio::test]
async fn test_signals_are_evaluated_oldest_first() {
    let store = MemoryStore::new();
    let mut config = bot_config(&[WALLET]);
    config.copy_delay_ms = 60_000;
    seed_user(&store, "alice", config).await;

    let now = now_ms();
    // Delivered newest first
    let source = ScriptedSource::new(vec![
        signal("late", WALLET, "tok", half(), Decimal::from(40), now - 1_000),
        signal("early", WALLET, "tok", half(), Decimal::from(40), now - 9_000),
    ]);
    let exchange = PaperExchange::default();
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());
    engine.tick().await.unwrap();

    let early = store.get("alice", "early").await.unwrap().unwrap();
    let late = store.get("alice", "late").await.unwrap().unwrap();
    assert_eq!(early.status(), Some(HistoryStatus::Accepted));
    assert_eq!(late.reason.as_deref(), Some("cooldown"));
    assert_eq!(engine.tracker().peek("alice").unwrap().last_signal_ts, now - 1_000);
}

#[tokio::test]
async fn test_slippage_guard_skips_with_details_logged() {
    let store = MemoryStore::new();
    let mut config = bot_config(&[WALLET]);
    config.max_slippage_bps = 1_000;
    seed_user(&store, "alice", config).await;

    let source = ScriptedSource::new(vec![signal(
        "pricey",
        WALLET,
        "tok",
        Decimal::new(60, 2),
        Decimal::from(40),
        now_ms() - 5_000,
    )]);
    let exchange = PaperExchange::default();
    exchange
        .set_book("tok", OrderBookTop { bid: Decimal::new(48, 2), ask: Decimal::new(50, 2) })
        .await;
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());
    engine.tick().await.unwrap();

    let row = store.get("alice", "pricey").await.unwrap().unwrap();
    assert_eq!(row.status(), Some(HistoryStatus::Skipped));
    assert_eq!(row.reason.as_deref(), Some("slippage_guard"));
    assert!(exchange.placed_orders().await.is_empty());

    let logs = store.logs_for("alice").await;
    let skip = logs
        .iter()
        .find(|l| l.message == "Skipped: slippage_guard")
        .expect("slippage log line");
    assert_eq!(skip.level, "warn");
    assert_eq!(skip.meta["bps"], 2_000);
    assert_eq!(skip.meta["tokenId"], "tok");
}

#[tokio::test]
async fn test_sell_uses_bid_as_reference() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&[WALLET])).await;

    let mut sell = signal("sell", WALLET, "tok", half(), Decimal::from(40), now_ms() - 5_000);
    sell.side = Side::Sell;
    let source = ScriptedSource::new(vec![sell]);

    let exchange = PaperExchange::default();
    // Ask is far away; the bid matches the desired price
    exchange
        .set_book("tok", OrderBookTop { bid: Decimal::new(50, 2), ask: Decimal::new(90, 2) })
        .await;
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());
    engine.tick().await.unwrap();

    let row = store.get("alice", "sell").await.unwrap().unwrap();
    assert_eq!(row.status(), Some(HistoryStatus::Accepted));
    assert_eq!(row.side, "SELL");
}

#[tokio::test]
async fn test_order_below_minimum_shares_is_skipped() {
    let store = MemoryStore::new();
    let mut config = bot_config(&[WALLET]);
    config.multiplier = Decimal::ONE;
    seed_user(&store, "alice", config).await;

    // $4 at 0.90 is 4.44 shares
    let source = ScriptedSource::new(vec![signal(
        "small",
        WALLET,
        "tok",
        Decimal::new(90, 2),
        Decimal::from(4),
        now_ms() - 5_000,
    )]);
    let exchange = PaperExchange::default();
    exchange
        .set_book("tok", OrderBookTop { bid: Decimal::new(89, 2), ask: Decimal::new(90, 2) })
        .await;
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());
    engine.tick().await.unwrap();

    let row = store.get("alice", "small").await.unwrap().unwrap();
    assert_eq!(row.reason.as_deref(), Some("cannot_meet_min_shares"));
    assert_eq!(row.requested_usd, Decimal::from(4));
    assert!(row.requested_shares > Decimal::from(4) && row.requested_shares < Decimal::from(5));
    assert!(exchange.placed_orders().await.is_empty());
}

#[tokio::test]
async fn test_sizing_rejection_makes_no_exchange_call() {
    let store = MemoryStore::new();
    let mut config = bot_config(&[WALLET]);
    config.min_notional_usd = Decimal::from(5);
    seed_user(&store, "alice", config).await;

    // 0.5 × $6 = $3, under the $5 floor
    let source = ScriptedSource::new(vec![signal(
        "tiny",
        WALLET,
        "tok",
        half(),
        Decimal::from(6),
        now_ms() - 5_000,
    )]);
    let exchange = PaperExchange::default();
    exchange.set_book_unavailable(true).await;
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.users_skipped, 0);
    assert_eq!(summary.skipped, 1);

    let row = store.get("alice", "tiny").await.unwrap().unwrap();
    assert_eq!(row.reason.as_deref(), Some("below_min_notional"));
}

#[tokio::test]
async fn test_missing_notional_falls_back_to_max_trade() {
    let store = MemoryStore::new();
    let mut config = bot_config(&[WALLET]);
    config.multiplier = Decimal::ONE;
    config.max_trade_usd = Decimal::from(30);
    seed_user(&store, "alice", config).await;

    let source = ScriptedSource::new(vec![signal(
        "no-notional",
        WALLET,
        "tok",
        half(),
        Decimal::ZERO,
        now_ms() - 5_000,
    )]);
    let exchange = PaperExchange::default();
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());
    engine.tick().await.unwrap();

    let row = store.get("alice", "no-notional").await.unwrap().unwrap();
    assert_eq!(row.status(), Some(HistoryStatus::Accepted));
    assert_eq!(row.requested_usd, Decimal::from(30));
}

#[tokio::test]
async fn test_execution_failure_is_terminal() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&[WALLET])).await;

    let source = ScriptedSource::new(vec![signal(
        "rejected",
        WALLET,
        "tok",
        half(),
        Decimal::from(40),
        now_ms() - 5_000,
    )]);
    let exchange = PaperExchange::default();
    exchange.reject_orders(Some("not enough balance")).await;
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.failed, 1);

    let row = store.get("alice", "rejected").await.unwrap().unwrap();
    assert_eq!(row.status(), Some(HistoryStatus::Failed));
    assert_eq!(row.reason.as_deref(), Some("execution_failed"));
    assert_eq!(row.requested_usd, Decimal::from(20));
    assert!(row.order_id.is_none());

    let logs = store.logs_for("alice").await;
    let failure = logs
        .iter()
        .find(|l| l.message == "Execution failed at adapter level")
        .expect("failure log line");
    assert!(failure.meta["err"].as_str().unwrap().contains("not enough balance"));

    // No cooldown was stamped for a failed order
    assert_eq!(engine.tracker().peek("alice").unwrap().last_trade("tok"), 0);

    // A restarted worker re-observing the signal does not retry it
    exchange.reject_orders(None).await;
    let fresh_store = MemoryStore::new();
    seed_user(&fresh_store, "alice", bot_config(&[WALLET])).await;
    let mut restarted = build_engine(&fresh_store, &store, &source, &exchange, fast_engine_config());
    assert_eq!(restarted.tick().await.unwrap().duplicates, 1);
    assert!(exchange.placed_orders().await.is_empty());
}

#[tokio::test]
async fn test_feed_error_skips_only_that_user() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&["0xbroken"])).await;
    seed_user(&store, "bob", bot_config(&[WALLET])).await;

    let source = ScriptedSource::new(vec![signal(
        "s1",
        WALLET,
        "tok",
        half(),
        Decimal::from(40),
        now_ms() - 5_000,
    )]);
    source.fail_wallet("0xbroken");
    let exchange = PaperExchange::default();
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.users, 2);
    assert_eq!(summary.users_skipped, 1);
    assert_eq!(summary.accepted, 1);

    let logs = store.logs_for("alice").await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, "error");
    assert_eq!(logs[0].message, "Signal feed error");
    assert_eq!(logs[0].meta["err"], "signal_feed_http_502");

    assert_eq!(store.history_for("bob").await.len(), 1);
}

#[tokio::test]
async fn test_user_without_credentials_is_skipped() {
    let store = MemoryStore::new();
    seed_user(&store, "bob", bot_config(&[WALLET])).await;
    store
        .upsert_user(
            polymirror::models::ActiveUser {
                user_id: "carol".into(),
                config: bot_config(&[WALLET]),
            },
            true,
        )
        .await;

    let source = ScriptedSource::new(vec![signal(
        "s1",
        WALLET,
        "tok",
        half(),
        Decimal::from(40),
        now_ms() - 5_000,
    )]);
    let exchange = PaperExchange::default();
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.users_skipped, 1);

    let logs = store.logs_for("carol").await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, "warn");
    assert_eq!(logs[0].message, "No Polymarket credentials set. Skipping.");
    assert!(store.history_for("carol").await.is_empty());
    assert_eq!(store.history_for("bob").await.len(), 1);

    // Only bob's fetch reached the feed
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_undecryptable_credentials_skip_user() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&[WALLET])).await;
    store.set_credential_blob("alice", "bm90IGEgcmVhbCBibG9iIGF0IGFsbCwgbm90IGF0IGFsbA==").await;

    let source = ScriptedSource::new(vec![]);
    let exchange = PaperExchange::default();
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.users_skipped, 1);
    assert_eq!(source.calls(), 0);

    let logs = store.logs_for("alice").await;
    assert_eq!(logs[0].meta["kind"], "credentials_error");
}

#[tokio::test]
async fn test_user_with_no_targets_makes_no_calls() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&[])).await;

    let source = ScriptedSource::new(vec![]);
    let exchange = PaperExchange::default();
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.users, 1);
    assert_eq!(summary.users_skipped, 1);
    assert_eq!(source.calls(), 0);
    assert!(store.logs_for("alice").await.is_empty());
    assert!(engine.tracker().peek("alice").is_none());
}

#[tokio::test]
async fn test_watermark_stops_before_failed_signal() {
    let store = MemoryStore::new();
    let mut config = bot_config(&[WALLET]);
    config.min_notional_usd = Decimal::from(5);
    seed_user(&store, "alice", config).await;

    let now = now_ms();
    let source = ScriptedSource::new(vec![
        // Skipped by sizing, never touches the exchange
        signal("tiny", WALLET, "tok", half(), Decimal::from(2), now - 5_000),
        // Needs the order book
        signal("normal", WALLET, "tok", half(), Decimal::from(40), now - 3_000),
    ]);
    let exchange = PaperExchange::default();
    exchange.set_book_unavailable(true).await;
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.users_skipped, 1);
    assert_eq!(engine.tracker().peek("alice").unwrap().last_signal_ts, now - 5_000);
    assert_eq!(store.history_for("alice").await.len(), 1);

    // Book recovers: only the unfinished signal is fetched and executed
    exchange.set_book_unavailable(false).await;
    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.signals, 1);
    assert_eq!(summary.accepted, 1);
    assert_eq!(engine.tracker().peek("alice").unwrap().last_signal_ts, now - 3_000);
}

#[tokio::test]
async fn test_ledger_outage_leaves_watermark_in_place() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&[WALLET])).await;

    let ts = now_ms() - 5_000;
    let source = ScriptedSource::new(vec![signal("s1", WALLET, "tok", half(), Decimal::from(40), ts)]);
    let exchange = PaperExchange::default();
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    store.set_ledger_unavailable(true).await;
    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.users_skipped, 1);
    assert!(engine.tracker().peek("alice").unwrap().last_signal_ts < ts);
    assert!(exchange.placed_orders().await.is_empty());

    store.set_ledger_unavailable(false).await;
    assert_eq!(engine.tick().await.unwrap().accepted, 1);
}

#[tokio::test]
async fn test_slow_feed_times_out() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&[WALLET])).await;

    let source = ScriptedSource::new(vec![signal(
        "s1",
        WALLET,
        "tok",
        half(),
        Decimal::from(40),
        now_ms() - 5_000,
    )]);
    source.set_delay(Some(Duration::from_millis(300)));
    let exchange = PaperExchange::default();
    let mut config = fast_engine_config();
    config.call_timeout = Duration::from_millis(50);
    let mut engine = build_engine(&store, &store, &source, &exchange, config);

    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.users_skipped, 1);

    let logs = store.logs_for("alice").await;
    assert_eq!(logs[0].meta["kind"], "timeout");
    assert!(logs[0].meta["err"].as_str().unwrap().contains("fetch_signals"));
}

#[tokio::test]
async fn test_state_cache_survives_restart() {
    let store = MemoryStore::new();
    let mut config = bot_config(&[WALLET]);
    config.copy_delay_ms = 60_000;
    seed_user(&store, "alice", config).await;

    let now = now_ms();
    let source = ScriptedSource::new(vec![signal("s1", WALLET, "tok", half(), Decimal::from(40), now - 5_000)]);
    let exchange = PaperExchange::default();
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());
    engine.tick().await.unwrap();

    // New engine on the same store picks up the watermark and the cooldown
    source.push(signal("s2", WALLET, "tok", half(), Decimal::from(40), now - 1_000));
    let mut restarted = build_engine(&store, &store, &source, &exchange, fast_engine_config());
    let summary = restarted.tick().await.unwrap();

    assert_eq!(summary.signals, 1);
    let row = store.get("alice", "s2").await.unwrap().unwrap();
    assert_eq!(row.reason.as_deref(), Some("cooldown"));
}

#[tokio::test]
async fn test_users_processed_concurrently() {
    let store = MemoryStore::new();
    let wallets = ["0xa", "0xb", "0xc"];
    let now = now_ms();
    let mut signals = Vec::new();
    for (i, wallet) in wallets.iter().enumerate() {
        seed_user(&store, &format!("user-{i}"), bot_config(&[*wallet])).await;
        signals.push(signal(&format!("s-{i}"), wallet, "tok", half(), Decimal::from(40), now - 5_000));
    }

    let source = ScriptedSource::new(signals);
    let exchange = PaperExchange::default();
    let mut config = fast_engine_config();
    config.max_concurrent_users = 3;
    let mut engine = build_engine(&store, &store, &source, &exchange, config);

    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.users, 3);
    assert_eq!(summary.accepted, 3);
    assert_eq!(exchange.placed_orders().await.len(), 3);
    for i in 0..3 {
        assert_eq!(store.history_for(&format!("user-{i}")).await.len(), 1);
    }
}

/// Paper exchange whose order acknowledgement arrives only after `delay`.
struct SlowAckExchange {
    inner: PaperExchange,
    delay: Duration,
}

#[async_trait]
impl ExchangeAdapter for SlowAckExchange {
    fn name(&self) -> &'static str {
        "slow-ack"
    }

    async fn get_orderbook(&self, token_id: &str, creds: &PmCredentials) -> Result<OrderBookTop, ExchangeError> {
        self.inner.get_orderbook(token_id, creds).await
    }

    async fn place_order(&self, order: &OrderRequest, creds: &PmCredentials) -> Result<OrderAck, ExchangeError> {
        let ack = self.inner.place_order(order, creds).await?;
        tokio::time::sleep(self.delay).await;
        Ok(ack)
    }

    async fn get_positions(&self, creds: &PmCredentials) -> Result<Vec<PositionSnapshot>, ExchangeError> {
        self.inner.get_positions(creds).await
    }
}

#[tokio::test]
async fn test_order_in_flight_at_deadline_is_recorded_once() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&[WALLET])).await;

    let source = ScriptedSource::new(vec![signal("s1", WALLET, "tok", half(), Decimal::from(40), now_ms() - 5_000)]);
    let paper = PaperExchange::default();
    let exchange = Arc::new(SlowAckExchange {
        inner: paper.clone(),
        delay: Duration::from_millis(300),
    });

    let mut config = fast_engine_config();
    config.cycle_deadline = Duration::from_millis(100);
    config.call_timeout = Duration::from_secs(2);
    let mut engine = build_engine_with_exchange(&store, &store, &source, exchange, config);

    assert_eq!(engine.tick().await.unwrap().accepted, 1);
    for _ in 0..2 {
        let summary = engine.tick().await.unwrap();
        assert_eq!(summary.accepted, 0);
    }

    assert_eq!(paper.placed_orders().await.len(), 1);
    let rows = store.history_for("alice").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status(), Some(HistoryStatus::Accepted));
    assert!(engine.tracker().peek("alice").unwrap().last_trade("tok") > 0);
}

#[tokio::test]
async fn test_cycle_deadline_leaves_signals_for_next_tick() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&[WALLET])).await;
    seed_user(&store, "bob", bot_config(&[WALLET])).await;

    let ts = now_ms() - 5_000;
    let source = ScriptedSource::new(vec![signal("s1", WALLET, "tok", half(), Decimal::from(40), ts)]);
    source.set_delay(Some(Duration::from_millis(150)));
    let exchange = PaperExchange::default();

    let mut config = fast_engine_config();
    config.cycle_deadline = Duration::from_millis(100);
    config.call_timeout = Duration::from_secs(1);
    let mut engine = build_engine(&store, &store, &source, &exchange, config);

    // Alice's fetch outlives the deadline; bob never starts
    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.interrupted, 2);
    assert_eq!(summary.accepted, 0);
    assert_eq!(source.calls(), 1);
    assert!(exchange.placed_orders().await.is_empty());
    assert!(store.history_for("alice").await.is_empty());
    assert!(engine.tracker().peek("alice").unwrap().last_signal_ts < ts);
    assert!(engine.tracker().peek("bob").unwrap().last_signal_ts < ts);

    source.set_delay(None);
    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.interrupted, 0);
    assert_eq!(summary.accepted, 2);
    assert_eq!(engine.tracker().peek("alice").unwrap().last_signal_ts, ts);
}

#[tokio::test]
async fn test_tick_runs_on_spawned_task() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&[WALLET])).await;

    let source = ScriptedSource::new(vec![signal("s1", WALLET, "tok", half(), Decimal::from(40), now_ms() - 5_000)]);
    let exchange = PaperExchange::default();
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    let handle = tokio::spawn(async move { engine.tick().await.map(|s| s.accepted) });
    assert_eq!(handle.await.unwrap().unwrap(), 1);
}

#[tokio::test]
async fn test_worker_loop_continues_after_failed_tick() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&[WALLET])).await;
    store.fail_user_loads(1).await;

    let source = ScriptedSource::new(vec![signal("s1", WALLET, "tok", half(), Decimal::from(40), now_ms() - 5_000)]);
    let exchange = PaperExchange::default();
    let engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    let worker = tokio::spawn(run_copy_engine(engine, Duration::from_millis(20)));

    let give_up = tokio::time::Instant::now() + Duration::from_secs(3);
    while store.history_for("alice").await.is_empty() {
        assert!(tokio::time::Instant::now() < give_up, "worker never recovered from the failed tick");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    worker.abort();

    assert_eq!(store.pending_user_load_failures().await, 0);
    assert_eq!(exchange.placed_orders().await.len(), 1);
}

#[tokio::test]
async fn test_dust_price_on_empty_book_is_skipped() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", bot_config(&[WALLET])).await;

    let source = ScriptedSource::new(vec![signal(
        "dust",
        WALLET,
        "tok",
        Decimal::new(1, 28),
        Decimal::from(40),
        now_ms() - 5_000,
    )]);
    let exchange = PaperExchange::default();
    exchange
        .set_book("tok", OrderBookTop { bid: Decimal::ZERO, ask: Decimal::ZERO })
        .await;
    let mut engine = build_engine(&store, &store, &source, &exchange, fast_engine_config());

    let summary = engine.tick().await.unwrap();
    assert_eq!(summary.skipped, 1);

    let row = store.get("alice", "dust").await.unwrap().unwrap();
    assert_eq!(row.reason.as_deref(), Some("cannot_meet_min_shares"));
    assert_eq!(row.requested_shares, Decimal::ZERO);
    assert!(exchange.placed_orders().await.is_empty());
}
