use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::Signal;

use super::risk;

/// Ephemeral per-user tracking: processed-signal watermark and per-token cooldowns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    /// High-water mark of processed signal time (ms). Never moves backward.
    pub last_signal_ts: i64,
    /// token_id → last successful copy time (ms).
    pub last_trade_by_token: HashMap<String, i64>,
}

impl UserState {
    pub fn new(last_signal_ts: i64) -> Self {
        Self {
            last_signal_ts,
            last_trade_by_token: HashMap::new(),
        }
    }

    /// Move the watermark to the newest signal in `signals`, if it is ahead.
    pub fn advance<'a>(&mut self, signals: impl IntoIterator<Item = &'a Signal>) {
        if let Some(latest) = signals.into_iter().map(|s| s.ts).max() {
            self.advance_to(latest);
        }
    }

    pub fn advance_to(&mut self, ts: i64) {
        self.last_signal_ts = self.last_signal_ts.max(ts);
    }

    /// Last successful trade on `token_id`, or 0 if never traded.
    pub fn last_trade(&self, token_id: &str) -> i64 {
        self.last_trade_by_token.get(token_id).copied().unwrap_or(0)
    }

    pub fn in_cooldown(&self, token_id: &str, now_ms: i64, copy_delay_ms: i64) -> bool {
        risk::in_cooldown(self.last_trade(token_id), now_ms, copy_delay_ms)
    }

    /// Stamp the current time as the last trade on `token_id`.
    pub fn record_trade(&mut self, token_id: &str) {
        self.record_trade_at(token_id, Utc::now().timestamp_millis());
    }

    pub fn record_trade_at(&mut self, token_id: &str, ts: i64) {
        let entry = self.last_trade_by_token.entry(token_id.to_string()).or_insert(0);
        *entry = (*entry).max(ts);
    }
}

/// Owner of every user's [`UserState`], keyed by user id.
#[derive(Debug, Default)]
pub struct StateTracker {
    states: HashMap<String, UserState>,
    lookback_window_ms: i64,
}

impl StateTracker {
    pub fn new(lookback_window_ms: i64) -> Self {
        Self {
            states: HashMap::new(),
            lookback_window_ms,
        }
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.states.contains_key(user_id)
    }

    /// Fresh state for a user seen for the first time: the watermark starts one
    /// lookback window in the past so history is not replayed.
    pub fn fresh_state(&self, now_ms: i64) -> UserState {
        UserState::new(now_ms - self.lookback_window_ms)
    }

    pub fn insert(&mut self, user_id: &str, state: UserState) {
        self.states.insert(user_id.to_string(), state);
    }

    pub fn peek(&self, user_id: &str) -> Option<&UserState> {
        self.states.get(user_id)
    }

    /// Remove a user's state so the task processing that user owns it for the
    /// tick. Put it back with [`StateTracker::insert`].
    pub fn take(&mut self, user_id: &str) -> Option<UserState> {
        self.states.remove(user_id)
    }
}
