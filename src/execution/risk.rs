use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;

use crate::models::{BotConfig, Signal};

/// Exchange minimum order size, in shares.
pub const MIN_ORDER_SHARES: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

const BPS_PER_UNIT: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Why a signal was not copied (or why the copy failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    Cooldown,
    NoCash,
    BelowMinNotional,
    SlippageGuard,
    CannotMeetMinShares,
    ExecutionFailed,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Cooldown => "cooldown",
            Reason::NoCash => "no_cash",
            Reason::BelowMinNotional => "below_min_notional",
            Reason::SlippageGuard => "slippage_guard",
            Reason::CannotMeetMinShares => "cannot_meet_min_shares",
            Reason::ExecutionFailed => "execution_failed",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of sizing: a USD amount to trade, or a skip reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Trade { target_usd: Decimal },
    Skip(Reason),
}

/// Decide how many USD to commit to a mirrored trade.
///
/// The raw amount is `multiplier × notional`. A zero or negative raw amount
/// (typically a feed that omitted the notional) falls back to `max_trade_usd`,
/// and so does one too large to represent. The result is capped by
/// `max_trade_usd` and then by the available cash.
pub fn decide_size(signal: &Signal, config: &BotConfig, user_cash_usd: Decimal) -> Decision {
    let mut raw = config
        .multiplier
        .checked_mul(signal.notional_usd)
        .unwrap_or(config.max_trade_usd);
    if raw <= Decimal::ZERO {
        raw = config.max_trade_usd;
    }

    let capped = raw.min(config.max_trade_usd);
    let target_usd = capped.min(user_cash_usd);

    if target_usd <= Decimal::ZERO {
        return Decision::Skip(Reason::NoCash);
    }
    if target_usd < config.min_notional_usd {
        return Decision::Skip(Reason::BelowMinNotional);
    }

    Decision::Trade { target_usd }
}

/// Price deviation in basis points, rounded half away from zero.
/// Returns 0 when the reference price is unusable and `i64::MAX` when the
/// deviation is too large to represent, so the guard always trips on it.
pub fn slippage_bps(ref_price: Decimal, desired_price: Decimal) -> i64 {
    if ref_price <= Decimal::ZERO {
        return 0;
    }

    desired_price
        .checked_sub(ref_price)
        .and_then(|diff| diff.abs().checked_div(ref_price))
        .and_then(|ratio| ratio.checked_mul(BPS_PER_UNIT))
        .and_then(|bps| {
            bps.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
        })
        .unwrap_or(i64::MAX)
}

/// Convert a USD amount to shares at `price`. Returns 0 when the price is
/// unusable or the share count overflows, which fails the minimum-size check.
pub fn shares_for(target_usd: Decimal, price: Decimal) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    target_usd.checked_div(price).unwrap_or(Decimal::ZERO)
}

/// Cooldown check: `now - last_trade < copy_delay_ms`.
pub fn in_cooldown(last_trade_ms: i64, now_ms: i64, copy_delay_ms: i64) -> bool {
    now_ms.saturating_sub(last_trade_ms) < copy_delay_ms
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
