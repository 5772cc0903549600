// 🧾 Loan Entity - flat simple-interest loan paid in fixed installments
//
// State machine:
//   Active  (remaining_installments > 0)
//   Settled (remaining_installments == 0, terminal)
//
// Each payment: remaining_installments -= 1,
//               outstanding_total -= monthly_installment (2 dp)

use rusqlite::Row;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::decimal_column;
use crate::error::{in_range, LedgerResult};

// ============================================================================
// LOAN STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// Installments still due
    Active,

    /// Fully paid - no further payments accepted
    Settled,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "Active",
            LoanStatus::Settled => "Settled",
        }
    }
}

// ============================================================================
// LOAN ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: i64,
    pub account_id: i64,
    pub remaining_installments: i64,
    pub monthly_installment: Decimal,

    /// Annual rate in percent (10 = 10%)
    pub annual_rate: Decimal,

    pub principal: Decimal,

    /// Principal plus unpaid interest still owed
    pub outstanding_total: Decimal,
}

impl Loan {
    pub(crate) const COLUMNS: &'static str = "id, account_id, remaining_installments, \
         monthly_installment, annual_rate, principal, outstanding_total";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Loan {
            id: row.get(0)?,
            account_id: row.get(1)?,
            remaining_installments: row.get(2)?,
            monthly_installment: decimal_column(row, 3)?,
            annual_rate: decimal_column(row, 4)?,
            principal: decimal_column(row, 5)?,
            outstanding_total: decimal_column(row, 6)?,
        })
    }

    pub fn status(&self) -> LoanStatus {
        if self.remaining_installments > 0 {
            LoanStatus::Active
        } else {
            LoanStatus::Settled
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() == LoanStatus::Active
    }

    /// The loan as it stands after one more installment
    pub fn after_installment(&self) -> LedgerResult<Loan> {
        let outstanding = in_range(self.outstanding_total.checked_sub(self.monthly_installment))?;

        let mut next = self.clone();
        next.remaining_installments -= 1;
        next.outstanding_total = outstanding.round_dp(2);
        Ok(next)
    }
}

// ============================================================================
// LOAN TERMS (simulation result)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub total_interest: Decimal,
    pub total_to_pay: Decimal,
    pub monthly_installment: Decimal,
}
