use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use metrics::{counter, gauge, histogram};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

use crate::credentials::{decrypt_json, CredentialError, MasterKey, PmCredentials};
use crate::ingestion::signal_feed::{SignalFeedError, SignalSource, DEFAULT_SIGNAL_LIMIT};
use crate::models::{ActiveUser, HistoryEntry, HistoryStatus, LogLevel, Signal};
use crate::store::{BotStore, HistoryLedger};

use super::exchange::{ExchangeAdapter, ExchangeError, OrderRequest};
use super::risk::{self, Decision, Reason, MIN_ORDER_SHARES};
use super::state::{StateTracker, UserState};

/// Tuning for the polling worker.
#[derive(Debug, Clone)]
pub struct CopyEngineConfig {
    pub fetch_limit: u32,
    /// Deadline applied to every network and storage call.
    pub call_timeout: Duration,
    /// Deadline for processing all users in one tick.
    pub cycle_deadline: Duration,
    pub max_concurrent_users: usize,
    /// How far back a user seen for the first time starts watching.
    pub lookback_window_ms: i64,
}

impl Default for CopyEngineConfig {
    fn default() -> Self {
        Self {
            fetch_limit: DEFAULT_SIGNAL_LIMIT,
            call_timeout: Duration::from_secs(10),
            cycle_deadline: Duration::from_secs(30),
            max_concurrent_users: 1,
            lookback_window_ms: 60_000,
        }
    }
}

/// Collaborators the engine drives. Cheap to clone.
#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<dyn BotStore>,
    pub ledger: Arc<dyn HistoryLedger>,
    pub signals: Arc<dyn SignalSource>,
    pub exchange: Arc<dyn ExchangeAdapter>,
    pub master_key: MasterKey,
}

/// Why a user was skipped for the rest of a tick.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Feed(#[from] SignalFeedError),

    #[error("no credentials stored")]
    MissingCredentials,

    #[error("credentials unavailable: {0}")]
    Credentials(#[from] CredentialError),

    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
}

impl TickError {
    /// Label for the `users_skipped_total` metric.
    pub fn kind(&self) -> &'static str {
        match self {
            TickError::Feed(_) => "feed_error",
            TickError::MissingCredentials => "missing_credentials",
            TickError::Credentials(_) => "credentials_error",
            TickError::Exchange(_) => "exchange_error",
            TickError::Store(_) => "store_error",
            TickError::Timeout { .. } => "timeout",
        }
    }

    fn user_message(&self) -> (LogLevel, &'static str) {
        match self {
            TickError::Feed(_) => (LogLevel::Error, "Signal feed error"),
            TickError::MissingCredentials => {
                (LogLevel::Warn, "No Polymarket credentials set. Skipping.")
            }
            TickError::Credentials(_) => {
                (LogLevel::Error, "Polymarket credentials could not be decrypted. Skipping.")
            }
            TickError::Timeout { .. } => (LogLevel::Error, "Upstream call timed out. Skipping this cycle."),
            TickError::Exchange(_) | TickError::Store(_) => {
                (LogLevel::Error, "Processing aborted for this cycle")
            }
        }
    }
}

/// Counts for one completed tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub users: usize,
    pub users_skipped: usize,
    pub signals: usize,
    pub accepted: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Signals already present in the ledger, not re-evaluated.
    pub duplicates: usize,
    /// Users whose remaining signals were left for the next tick because the
    /// cycle deadline passed.
    pub interrupted: usize,
}

impl TickSummary {
    fn absorb(&mut self, outcome: &UserOutcome) {
        self.signals += outcome.signals;
        self.accepted += outcome.accepted;
        self.failed += outcome.failed;
        self.skipped += outcome.skipped;
        self.duplicates += outcome.duplicates;
        if outcome.interrupted {
            self.interrupted += 1;
        }
    }
}

#[derive(Debug, Default)]
struct UserOutcome {
    signals: usize,
    accepted: usize,
    failed: usize,
    skipped: usize,
    duplicates: usize,
    interrupted: bool,
}

enum Evaluation {
    Duplicate,
    Recorded(HistoryStatus),
}

/// Signal-to-order pipeline. Owns the per-user state; everything durable lives
/// behind [`EngineDeps`].
pub struct CopyEngine {
    deps: EngineDeps,
    config: CopyEngineConfig,
    tracker: StateTracker,
}

impl CopyEngine {
    pub fn new(deps: EngineDeps, config: CopyEngineConfig) -> Self {
        let tracker = StateTracker::new(config.lookback_window_ms);
        Self { deps, config, tracker }
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    /// One polling cycle: load users, then fetch, evaluate and record per user.
    /// Per-user failures are logged and skipped; only failing to list users
    /// fails the tick.
    pub async fn tick(&mut self) -> Result<TickSummary, TickError> {
        let started = Instant::now();
        counter!("ticks_total").increment(1);

        let result = self.run_cycle().await;

        histogram!("tick_duration_seconds").record(started.elapsed().as_secs_f64());
        result
    }

    async fn run_cycle(&mut self) -> Result<TickSummary, TickError> {
        let Self { deps, config, tracker } = self;
        let deadline = tokio::time::Instant::now() + config.cycle_deadline;

        let users = call(config.call_timeout, "load_users", deps.store.enabled_users()).await?;
        gauge!("active_users").set(users.len() as f64);

        let mut summary = TickSummary {
            users: users.len(),
            ..TickSummary::default()
        };

        let mut jobs = Vec::with_capacity(users.len());
        for user in users {
            if user.config.targets.is_empty() {
                tracing::debug!(user_id = %user.user_id, "No targets configured, skipping user");
                counter!("users_skipped_total", "reason" => "empty_targets").increment(1);
                summary.users_skipped += 1;
                continue;
            }
            ensure_state(deps, config, tracker, &user.user_id).await;
            let Some(mut state) = tracker.take(&user.user_id) else {
                continue;
            };

            let deps = deps.clone();
            let config = config.clone();
            jobs.push(async move {
                let outcome = run_user_until(&deps, &config, &user, &mut state, deadline).await;
                (user.user_id, state, outcome)
            });
        }

        let results: Vec<(String, UserState, Option<UserOutcome>)> = stream::iter(jobs)
            .buffer_unordered(config.max_concurrent_users.max(1))
            .collect()
            .await;

        for (user_id, state, outcome) in results {
            match &outcome {
                Some(o) => summary.absorb(o),
                None => summary.users_skipped += 1,
            }
            persist_state(deps, config, &user_id, &state).await;
            tracker.insert(&user_id, state);
        }

        tracing::debug!(
            users = summary.users,
            skipped_users = summary.users_skipped,
            signals = summary.signals,
            accepted = summary.accepted,
            failed = summary.failed,
            interrupted = summary.interrupted,
            "Tick complete"
        );

        Ok(summary)
    }
}

/// Run the worker forever: tick, then wait `poll_interval` after completion.
pub async fn run_copy_engine(mut engine: CopyEngine, poll_interval: Duration) {
    tracing::info!(
        exchange = engine.deps.exchange.name(),
        poll_interval_ms = poll_interval.as_millis() as u64,
        max_concurrent_users = engine.config.max_concurrent_users,
        "Copy engine started"
    );

    loop {
        if let Err(e) = engine.tick().await {
            counter!("tick_errors_total").increment(1);
            tracing::error!(error = %e, "Tick failed");
        }
        tokio::time::sleep(poll_interval).await;
    }
}

// ---------------------------------------------------------------------------
// Per-user processing
// ---------------------------------------------------------------------------

async fn call<T, E, F>(timeout: Duration, operation: &'static str, fut: F) -> Result<T, TickError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<TickError>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(TickError::Timeout { operation }),
    }
}

/// Create state for a user on first sight, seeded from the persisted cache when
/// one exists. A cached watermark older than the lookback window is pulled
/// forward so a long outage does not replay stale trades.
async fn ensure_state(
    deps: &EngineDeps,
    config: &CopyEngineConfig,
    tracker: &mut StateTracker,
    user_id: &str,
) {
    if tracker.contains(user_id) {
        return;
    }

    let fresh = tracker.fresh_state(Utc::now().timestamp_millis());
    let state = match call(config.call_timeout, "load_state", deps.store.load_user_state(user_id)).await {
        Ok(Some(mut cached)) => {
            cached.advance_to(fresh.last_signal_ts);
            tracing::info!(
                user_id = %user_id,
                last_signal_ts = cached.last_signal_ts,
                cooldowns = cached.last_trade_by_token.len(),
                "Restored cached user state"
            );
            cached
        }
        Ok(None) => fresh,
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Could not load cached state, starting fresh");
            fresh
        }
    };

    tracker.insert(user_id, state);
}

async fn persist_state(deps: &EngineDeps, config: &CopyEngineConfig, user_id: &str, state: &UserState) {
    if let Err(e) = call(config.call_timeout, "save_state", deps.store.save_user_state(user_id, state)).await {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to persist user state");
    }
}

/// Process one user, logging why when the user is skipped. `None` means the
/// user was skipped for this tick.
async fn run_user_until(
    deps: &EngineDeps,
    config: &CopyEngineConfig,
    user: &ActiveUser,
    state: &mut UserState,
    deadline: tokio::time::Instant,
) -> Option<UserOutcome> {
    let user_id = user.user_id.as_str();

    match run_user(deps, config, user, state, deadline).await {
        Ok(outcome) => {
            if outcome.interrupted {
                counter!("users_skipped_total", "reason" => "cycle_deadline").increment(1);
                tracing::warn!(
                    user_id = %user_id,
                    last_signal_ts = state.last_signal_ts,
                    "Cycle deadline reached, leaving remaining signals for the next tick"
                );
            }
            Some(outcome)
        }
        Err(e) => {
            counter!("users_skipped_total", "reason" => e.kind()).increment(1);
            let (level, message) = e.user_message();
            user_log(
                deps,
                config,
                user_id,
                level,
                message,
                json!({ "err": e.to_string(), "kind": e.kind() }),
            )
            .await;
            None
        }
    }
}

/// The cycle deadline is checked between signals only, so an order that has
/// been sent is always followed by its ledger write and cooldown stamp.
async fn run_user(
    deps: &EngineDeps,
    config: &CopyEngineConfig,
    user: &ActiveUser,
    state: &mut UserState,
    deadline: tokio::time::Instant,
) -> Result<UserOutcome, TickError> {
    let user_id = user.user_id.as_str();

    if tokio::time::Instant::now() >= deadline {
        return Ok(UserOutcome {
            interrupted: true,
            ..UserOutcome::default()
        });
    }

    let blob = call(config.call_timeout, "load_credentials", deps.store.credential_blob(user_id))
        .await?
        .ok_or(TickError::MissingCredentials)?;
    let creds: PmCredentials = decrypt_json(&deps.master_key, &blob)?;

    let mut signals = call(
        config.call_timeout,
        "fetch_signals",
        deps.signals
            .fetch_signals(&user.config.targets, Some(state.last_signal_ts), config.fetch_limit),
    )
    .await?;
    counter!("signals_fetched_total").increment(signals.len() as u64);

    signals.sort_by_key(|s| s.ts);

    let mut outcome = UserOutcome {
        signals: signals.len(),
        ..UserOutcome::default()
    };

    for (i, signal) in signals.iter().enumerate() {
        // Everything strictly older than this signal is settled.
        if let Some(prev) = i.checked_sub(1).map(|p| signals[p].ts) {
            if prev < signal.ts {
                state.advance_to(prev);
            }
        }

        if tokio::time::Instant::now() >= deadline {
            outcome.interrupted = true;
            return Ok(outcome);
        }

        match evaluate_signal(deps, config, user, &creds, state, signal).await? {
            Evaluation::Duplicate => outcome.duplicates += 1,
            Evaluation::Recorded(HistoryStatus::Accepted | HistoryStatus::Filled) => outcome.accepted += 1,
            Evaluation::Recorded(HistoryStatus::Failed | HistoryStatus::Rejected) => outcome.failed += 1,
            Evaluation::Recorded(HistoryStatus::Skipped) => outcome.skipped += 1,
        }
    }
    state.advance(&signals);

    Ok(outcome)
}

/// Cooldown, sizing, slippage guard, minimum size, then execution. The first
/// failing check decides the recorded outcome.
async fn evaluate_signal(
    deps: &EngineDeps,
    config: &CopyEngineConfig,
    user: &ActiveUser,
    creds: &PmCredentials,
    state: &mut UserState,
    signal: &Signal,
) -> Result<Evaluation, TickError> {
    let user_id = user.user_id.as_str();
    let cfg = &user.config;

    let existing = call(
        config.call_timeout,
        "ledger_lookup",
        deps.ledger.get(user_id, &signal.signal_id),
    )
    .await?;
    if let Some(existing) = existing {
        tracing::debug!(
            user_id = %user_id,
            signal_id = %signal.signal_id,
            status = %existing.status,
            "Signal already recorded, not re-evaluating"
        );
        return Ok(Evaluation::Duplicate);
    }

    if state.in_cooldown(&signal.token_id, Utc::now().timestamp_millis(), cfg.copy_delay_ms) {
        let entry = HistoryEntry::skipped(Reason::Cooldown.as_str(), Decimal::ZERO, Decimal::ZERO);
        return record_skip(deps, config, user_id, signal, entry, json!({})).await;
    }

    // No balance source is consulted: the per-trade cap is the spendable cash.
    let target_usd = match risk::decide_size(signal, cfg, cfg.max_trade_usd) {
        Decision::Trade { target_usd } => target_usd,
        Decision::Skip(reason) => {
            let entry = HistoryEntry::skipped(reason.as_str(), Decimal::ZERO, Decimal::ZERO);
            return record_skip(deps, config, user_id, signal, entry, json!({})).await;
        }
    };

    let book = call(
        config.call_timeout,
        "get_orderbook",
        deps.exchange.get_orderbook(&signal.token_id, creds),
    )
    .await?;
    let reference = book.reference_price(signal.side);
    let bps = risk::slippage_bps(reference, signal.price);
    if bps > cfg.max_slippage_bps {
        let entry = HistoryEntry::skipped(Reason::SlippageGuard.as_str(), Decimal::ZERO, Decimal::ZERO);
        let meta = json!({
            "ref": reference.to_string(),
            "desired": signal.price.to_string(),
            "bps": bps,
        });
        return record_skip(deps, config, user_id, signal, entry, meta).await;
    }

    let shares = risk::shares_for(target_usd, signal.price);
    if shares < MIN_ORDER_SHARES {
        let entry = HistoryEntry::skipped(Reason::CannotMeetMinShares.as_str(), target_usd, shares);
        return record_skip(deps, config, user_id, signal, entry, json!({})).await;
    }

    let order = OrderRequest {
        token_id: signal.token_id.clone(),
        side: signal.side,
        price: signal.price,
        size_shares: shares,
    };
    user_log(
        deps,
        config,
        user_id,
        LogLevel::Info,
        &format!("Placing order: {} {} shares @ {}", order.side, shares.round_dp(4), order.price),
        json!({ "tokenId": signal.token_id, "signalId": signal.signal_id }),
    )
    .await;

    let placed = call(config.call_timeout, "place_order", deps.exchange.place_order(&order, creds)).await;
    let entry = match placed {
        Ok(ack) => {
            // Stamp before the ledger write so a failed write cannot lead to a second order soon after.
            state.record_trade(&signal.token_id);
            counter!("orders_accepted").increment(1);
            tracing::info!(
                user_id = %user_id,
                signal_id = %signal.signal_id,
                order_id = %ack.order_id,
                usd = %target_usd,
                shares = %shares,
                "Copy order accepted"
            );
            user_log(
                deps,
                config,
                user_id,
                LogLevel::Success,
                &format!("Order accepted. Id: {}", ack.order_id),
                json!({ "tokenId": signal.token_id, "orderId": ack.order_id }),
            )
            .await;
            HistoryEntry::accepted(target_usd, shares, ack.order_id)
        }
        Err(e) => {
            counter!("orders_failed").increment(1);
            user_log(
                deps,
                config,
                user_id,
                LogLevel::Error,
                "Execution failed at adapter level",
                json!({ "tokenId": signal.token_id, "err": e.to_string() }),
            )
            .await;
            HistoryEntry::failed(Reason::ExecutionFailed.as_str(), target_usd, shares)
        }
    };

    record(deps, config, user_id, signal, entry).await
}

async fn record_skip(
    deps: &EngineDeps,
    config: &CopyEngineConfig,
    user_id: &str,
    signal: &Signal,
    entry: HistoryEntry,
    mut meta: serde_json::Value,
) -> Result<Evaluation, TickError> {
    let reason = entry.reason.unwrap_or("unknown");
    if let Some(obj) = meta.as_object_mut() {
        obj.insert("signalId".into(), json!(signal.signal_id));
        obj.insert("tokenId".into(), json!(signal.token_id));
    }
    user_log(deps, config, user_id, LogLevel::Warn, &format!("Skipped: {reason}"), meta).await;

    record(deps, config, user_id, signal, entry).await
}

async fn record(
    deps: &EngineDeps,
    config: &CopyEngineConfig,
    user_id: &str,
    signal: &Signal,
    entry: HistoryEntry,
) -> Result<Evaluation, TickError> {
    let inserted = call(
        config.call_timeout,
        "record_history",
        deps.ledger.record(user_id, signal, &entry),
    )
    .await?;

    counter!(
        "decisions_total",
        "status" => entry.status.as_str(),
        "reason" => entry.reason.unwrap_or("none")
    )
    .increment(1);

    if !inserted {
        tracing::debug!(
            user_id = %user_id,
            signal_id = %signal.signal_id,
            "Ledger already held this signal; kept the first record"
        );
    }

    Ok(Evaluation::Recorded(entry.status))
}

/// Append to the user's log stream and mirror it to tracing. Never fails the caller.
async fn user_log(
    deps: &EngineDeps,
    config: &CopyEngineConfig,
    user_id: &str,
    level: LogLevel,
    message: &str,
    meta: serde_json::Value,
) {
    match level {
        LogLevel::Info | LogLevel::Success => tracing::info!(user_id = %user_id, %meta, "{message}"),
        LogLevel::Warn => tracing::warn!(user_id = %user_id, %meta, "{message}"),
        LogLevel::Error => tracing::error!(user_id = %user_id, %meta, "{message}"),
    }

    if let Err(e) = call(
        config.call_timeout,
        "append_log",
        deps.store.append_log(user_id, level, message, meta),
    )
    .await
    {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to append user log");
    }
}
