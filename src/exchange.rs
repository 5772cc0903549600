// 💱 Currency Exchange - buy/sell a foreign-currency position at a given rate
//
// The rate always comes from the caller. Where the caller gets it from is
// the RateSource seam; this module never does network I/O and has no
// opinion on rate freshness.
//
// Local amounts are whole cents. A buy's cost rounds up, a sale's proceeds
// round down: trading a quantity back and forth at one rate nets to 0 when
// foreign_amount × rate is already whole cents, and otherwise costs the
// account at most a cent per leg. A trade worth nothing after rounding is
// rejected.

use rusqlite::Connection;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::db::{begin_write, insert_event, EntityKind, Event};
use crate::error::{in_range, require_positive, LedgerError, LedgerResult};
use crate::ledger::{require_account, write_balance, write_foreign_holding};

const ACTOR: &str = "exchange";

// ============================================================================
// RATE SOURCE
// ============================================================================

/// Supplier of the current local-per-foreign exchange rate
pub trait RateSource {
    fn current_rate(&self) -> LedgerResult<Decimal>;
}

/// A rate pinned at construction (configuration, tests, replays)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRate(Decimal);

impl FixedRate {
    pub fn new(rate: Decimal) -> LedgerResult<Self> {
        require_positive("exchange rate", rate)?;
        Ok(FixedRate(rate))
    }
}

impl RateSource for FixedRate {
    fn current_rate(&self) -> LedgerResult<Decimal> {
        Ok(self.0)
    }
}

// ============================================================================
// RECEIPT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// What an exchange did, for the presentation layer to report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeReceipt {
    pub side: Side,
    pub foreign_amount: Decimal,
    pub rate: Decimal,

    /// Local currency paid (buy) or received (sell)
    pub local_amount: Decimal,

    pub balance_after: Decimal,
    pub holding_after: Decimal,
}

/// Local currency charged for buying `foreign_amount` at `rate`
pub fn buy_cost(foreign_amount: Decimal, rate: Decimal) -> LedgerResult<Decimal> {
    local_value(foreign_amount, rate, RoundingStrategy::AwayFromZero)
}

/// Local currency paid out for selling `foreign_amount` at `rate`
pub fn sell_proceeds(foreign_amount: Decimal, rate: Decimal) -> LedgerResult<Decimal> {
    local_value(foreign_amount, rate, RoundingStrategy::ToZero)
}

fn local_value(
    foreign_amount: Decimal,
    rate: Decimal,
    strategy: RoundingStrategy,
) -> LedgerResult<Decimal> {
    let value = in_range(foreign_amount.checked_mul(rate))?.round_dp_with_strategy(2, strategy);

    if value.is_zero() {
        return Err(LedgerError::invalid(format!(
            "{} at rate {} is worth less than a cent",
            foreign_amount, rate
        )));
    }
    Ok(value)
}

// ============================================================================
// OPERATIONS
// ============================================================================

pub fn buy_foreign(
    conn: &mut Connection,
    handle: &str,
    foreign_amount: Decimal,
    rate: Decimal,
) -> LedgerResult<ExchangeReceipt> {
    require_positive("foreign amount", foreign_amount)?;
    require_positive("exchange rate", rate)?;

    let cost = buy_cost(foreign_amount, rate)?;
    let tx = begin_write(conn)?;
    let account = require_account(&tx, handle)?;

    if !account.can_afford(cost) {
        tracing::warn!(
            handle = %handle,
            cost = %cost,
            available = %account.balance,
            "buy rejected: insufficient balance"
        );
        return Err(LedgerError::InsufficientBalance {
            needed: cost,
            available: account.balance,
        });
    }

    let receipt = ExchangeReceipt {
        side: Side::Buy,
        foreign_amount,
        rate,
        local_amount: cost,
        balance_after: account.balance - cost,
        holding_after: in_range(account.foreign_holding.checked_add(foreign_amount))?,
    };

    write_balance(&tx, account.id, receipt.balance_after)?;
    write_foreign_holding(&tx, account.id, receipt.holding_after)?;
    insert_event(&tx, &exchange_event("foreign_bought", handle, &receipt))?;

    tx.commit()?;

    tracing::info!(handle = %handle, foreign = %foreign_amount, rate = %rate, cost = %cost, "foreign bought");
    Ok(receipt)
}

pub fn sell_foreign(
    conn: &mut Connection,
    handle: &str,
    foreign_amount: Decimal,
    rate: Decimal,
) -> LedgerResult<ExchangeReceipt> {
    require_positive("foreign amount", foreign_amount)?;
    require_positive("exchange rate", rate)?;

    let proceeds = sell_proceeds(foreign_amount, rate)?;
    let tx = begin_write(conn)?;
    let account = require_account(&tx, handle)?;

    if !account.holds(foreign_amount) {
        tracing::warn!(
            handle = %handle,
            amount = %foreign_amount,
            available = %account.foreign_holding,
            "sell rejected: insufficient holding"
        );
        return Err(LedgerError::InsufficientHolding {
            needed: foreign_amount,
            available: account.foreign_holding,
        });
    }

    let receipt = ExchangeReceipt {
        side: Side::Sell,
        foreign_amount,
        rate,
        local_amount: proceeds,
        balance_after: in_range(account.balance.checked_add(proceeds))?,
        holding_after: account.foreign_holding - foreign_amount,
    };

    write_balance(&tx, account.id, receipt.balance_after)?;
    write_foreign_holding(&tx, account.id, receipt.holding_after)?;
    insert_event(&tx, &exchange_event("foreign_sold", handle, &receipt))?;

    tx.commit()?;

    tracing::info!(handle = %handle, foreign = %foreign_amount, rate = %rate, proceeds = %proceeds, "foreign sold");
    Ok(receipt)
}

/// Buy at whatever rate the source quotes right now
pub fn buy_foreign_at_market(
    conn: &mut Connection,
    handle: &str,
    foreign_amount: Decimal,
    source: &dyn RateSource,
) -> LedgerResult<ExchangeReceipt> {
    let rate = source.current_rate()?;
    buy_foreign(conn, handle, foreign_amount, rate)
}

/// Sell at whatever rate the source quotes right now
pub fn sell_foreign_at_market(
    conn: &mut Connection,
    handle: &str,
    foreign_amount: Decimal,
    source: &dyn RateSource,
) -> LedgerResult<ExchangeReceipt> {
    let rate = source.current_rate()?;
    sell_foreign(conn, handle, foreign_amount, rate)
}

fn exchange_event(event_type: &str, handle: &str, receipt: &ExchangeReceipt) -> Event {
    Event::new(
        EntityKind::Account,
        handle,
        event_type,
        ACTOR,
        serde_json::json!({
            "foreign_amount": receipt.foreign_amount,
            "rate": receipt.rate,
            "local_amount": receipt.local_amount,
        }),
    )
}
