// 🔁 Transfer Entity - settled, immutable movement between two accounts
//
// A transfer row is written once, in the same store transaction as the two
// balance updates it describes. It is never updated or deleted.

use rusqlite::Row;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::decimal_column;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub sender_account_id: i64,
    pub recipient_account_id: i64,
    pub amount: Decimal,
}

impl Transfer {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Transfer {
            id: row.get(0)?,
            sender_account_id: row.get(1)?,
            recipient_account_id: row.get(2)?,
            amount: decimal_column(row, 3)?,
        })
    }
}

// ============================================================================
// HISTORY VIEW
// ============================================================================

/// Which side of a transfer the queried account played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Sent => "sent",
            Direction::Received => "received",
        }
    }

    pub(crate) fn from_db(value: &str) -> Option<Self> {
        match value {
            "sent" => Some(Direction::Sent),
            "received" => Some(Direction::Received),
            _ => None,
        }
    }
}

/// One line of an account's transfer history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEntry {
    pub transfer_id: i64,

    /// Handle of the other account
    pub counterparty: String,

    pub amount: Decimal,

    pub direction: Direction,
}

impl TransferEntry {
    /// Signed effect on the queried account's balance
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Sent => -self.amount,
            Direction::Received => self.amount,
        }
    }
}
