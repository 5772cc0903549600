// 📈 Savings Projection - compound growth with monthly contributions
//
//   r = annual_rate_percent / 100 / 12
//   n = years × 12
//   final = capital × (1 + r)^n + contribution × ((1 + r)^n − 1) / r
//
// Pure arithmetic; never touches the store. Unlike the loan model this one
// DOES compound monthly.

use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use crate::error::{in_range, require_non_negative, LedgerError, LedgerResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsProjection {
    pub months: u32,
    pub final_capital: Decimal,

    /// Capital plus every monthly contribution
    pub total_contributed: Decimal,

    pub interest_earned: Decimal,
}

pub fn project_savings(
    capital: Decimal,
    annual_rate_percent: Decimal,
    years: u32,
    monthly_contribution: Decimal,
) -> LedgerResult<SavingsProjection> {
    require_non_negative("capital", capital)?;
    require_non_negative("annual rate", annual_rate_percent)?;
    require_non_negative("monthly contribution", monthly_contribution)?;
    if years == 0 {
        return Err(LedgerError::invalid("projection must span at least one year"));
    }

    let months = years
        .checked_mul(12)
        .ok_or_else(|| LedgerError::invalid("projection horizon too long"))?;
    let n = Decimal::from(months);
    let rate = annual_rate_percent / Decimal::ONE_HUNDRED / Decimal::from(12);

    let total_contributed = in_range(
        monthly_contribution
            .checked_mul(n)
            .and_then(|c| capital.checked_add(c)),
    )?;

    let final_capital = if rate.is_zero() {
        total_contributed
    } else {
        let growth = in_range((Decimal::ONE + rate).checked_powi(i64::from(months)))?;
        let grown = capital.checked_mul(growth);
        let annuity = (growth - Decimal::ONE)
            .checked_div(rate)
            .and_then(|factor| monthly_contribution.checked_mul(factor));

        in_range(grown.zip(annuity).and_then(|(g, a)| g.checked_add(a)))?
    }
    .round_dp(2);

    Ok(SavingsProjection {
        months,
        final_capital,
        total_contributed,
        interest_earned: final_capital - total_contributed,
    })
}
