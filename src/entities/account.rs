// 💳 Account Entity - handle identity + local balance + foreign holding
//
// "Handle is IDENTITY (opaque, issued once), balance and holding are VALUES"
//
// - id: surrogate key, used only for foreign keys (transfers, loans)
// - handle: the external identifier the session layer hands us
// - balance: local currency, 2 decimal places
// - foreign_holding: quantity of the secondary currency

use rusqlite::Row;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::decimal_column;

/// Seed grant for every newly opened account
pub const OPENING_GRANT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Surrogate key - never leaves the store layer as an identifier
    pub id: i64,

    /// Opaque external identifier (UUID v4)
    pub handle: String,

    /// Local-currency balance
    pub balance: Decimal,

    /// Foreign-currency quantity held
    pub foreign_holding: Decimal,
}

impl Account {
    /// Column list matching [`Account::from_row`]
    pub(crate) const COLUMNS: &'static str = "id, handle, balance, foreign_holding";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Account {
            id: row.get(0)?,
            handle: row.get(1)?,
            balance: decimal_column(row, 2)?,
            foreign_holding: decimal_column(row, 3)?,
        })
    }

    /// Can the balance cover `amount`?
    pub fn can_afford(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Does the account hold at least `amount` of foreign currency?
    pub fn holds(&self, amount: Decimal) -> bool {
        self.foreign_holding >= amount
    }

    pub fn is_overdrawn(&self) -> bool {
        self.balance < Decimal::ZERO || self.foreign_holding < Decimal::ZERO
    }
}

// ============================================================================
// TESTS
// ============================================================================
