// 🏛️ Loan Engine - simulate, originate and repay flat simple-interest loans
//
// Interest model (deliberately simple, NOT amortized/compounding):
//
//   monthly_rate        = annual_rate_percent / 12        (percent units)
//   total_interest      = round(principal × monthly_rate × months / 100, 2)
//   total_to_pay        = round(principal + total_interest, 2)
//   monthly_installment = round(total_to_pay / months, 2)
//
// Interest is spread flat across the term; every installment is the same.
// Rounding each installment means the last payment can leave a few cents of
// outstanding_total (positive or negative); the loan is still Settled once
// remaining_installments hits 0.

use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::db::{begin_write, decimal_param, insert_event, EntityKind, Event};
use crate::entities::{Loan, LoanTerms};
use crate::error::{
    in_range, require_cents, require_non_negative, require_positive, LedgerError, LedgerResult,
};
use crate::ledger::{find_account_by_id, require_account, write_balance};

const ACTOR: &str = "loan_engine";

// ============================================================================
// SIMULATION
// ============================================================================

/// Compute the terms of a loan without touching the store
pub fn simulate_terms(
    annual_rate_percent: Decimal,
    principal: Decimal,
    months: u32,
) -> LedgerResult<LoanTerms> {
    require_non_negative("annual rate", annual_rate_percent)?;
    require_positive("principal", principal)?;
    require_cents("principal", principal)?;
    if months == 0 {
        return Err(LedgerError::invalid("loan term must be at least one month"));
    }

    let months = Decimal::from(months);
    let monthly_rate = annual_rate_percent / Decimal::from(12);

    let total_interest = in_range(
        principal
            .checked_mul(monthly_rate)
            .and_then(|v| v.checked_mul(months))
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED)),
    )?
    .round_dp(2);
    let total_to_pay = in_range(principal.checked_add(total_interest))?.round_dp(2);
    let monthly_installment = in_range(total_to_pay.checked_div(months))?.round_dp(2);

    Ok(LoanTerms {
        total_interest,
        total_to_pay,
        monthly_installment,
    })
}

// ============================================================================
// ORIGINATION
// ============================================================================

/// Credit `principal` to the account and open a loan row, atomically
pub fn originate_loan(
    conn: &mut Connection,
    handle: &str,
    principal: Decimal,
    months: u32,
    monthly_installment: Decimal,
    annual_rate: Decimal,
    total_to_pay: Decimal,
) -> LedgerResult<Loan> {
    require_positive("principal", principal)?;
    require_positive("monthly installment", monthly_installment)?;
    require_positive("total to pay", total_to_pay)?;
    require_non_negative("annual rate", annual_rate)?;
    require_cents("principal", principal)?;
    require_cents("monthly installment", monthly_installment)?;
    require_cents("total to pay", total_to_pay)?;
    if months == 0 {
        return Err(LedgerError::invalid("loan term must be at least one month"));
    }

    let tx = begin_write(conn)?;
    let account = require_account(&tx, handle)?;

    // Proceeds are spendable immediately
    let credited = in_range(account.balance.checked_add(principal))?;
    write_balance(&tx, account.id, credited)?;

    tx.execute(
        "INSERT INTO loans (
            account_id, remaining_installments, monthly_installment,
            annual_rate, principal, outstanding_total
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            account.id,
            i64::from(months),
            decimal_param(monthly_installment),
            decimal_param(annual_rate),
            decimal_param(principal),
            decimal_param(total_to_pay),
        ],
    )?;

    let loan = Loan {
        id: tx.last_insert_rowid(),
        account_id: account.id,
        remaining_installments: i64::from(months),
        monthly_installment,
        annual_rate,
        principal,
        outstanding_total: total_to_pay,
    };

    insert_event(
        &tx,
        &Event::new(
            EntityKind::Loan,
            loan.id,
            "loan_originated",
            ACTOR,
            serde_json::json!({
                "handle": handle,
                "principal": principal,
                "months": months,
                "monthly_installment": monthly_installment,
                "annual_rate": annual_rate,
                "total_to_pay": total_to_pay,
            }),
        ),
    )?;

    tx.commit()?;

    tracing::info!(
        loan_id = loan.id,
        handle = %handle,
        principal = %principal,
        months,
        "loan originated"
    );
    Ok(loan)
}

/// Simulate the terms, then originate a loan on exactly those terms
pub fn request_loan(
    conn: &mut Connection,
    handle: &str,
    annual_rate_percent: Decimal,
    principal: Decimal,
    months: u32,
) -> LedgerResult<Loan> {
    let terms = simulate_terms(annual_rate_percent, principal, months)?;

    originate_loan(
        conn,
        handle,
        principal,
        months,
        terms.monthly_installment,
        annual_rate_percent,
        terms.total_to_pay,
    )
}

// ============================================================================
// QUERIES
// ============================================================================

/// Loans of the account with installments still due, oldest first
pub fn list_active_loans(conn: &Connection, handle: &str) -> LedgerResult<Vec<Loan>> {
    let account = require_account(conn, handle)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM loans
         WHERE account_id = ?1 AND remaining_installments > 0
         ORDER BY id ASC",
        Loan::COLUMNS
    ))?;

    let loans = stmt
        .query_map(params![account.id], Loan::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(loans)
}

pub fn get_loan(conn: &Connection, loan_id: i64) -> LedgerResult<Loan> {
    find_loan(conn, loan_id)?.ok_or(LedgerError::LoanNotFound(loan_id))
}

fn find_loan(conn: &Connection, loan_id: i64) -> LedgerResult<Option<Loan>> {
    let loan = conn
        .query_row(
            &format!("SELECT {} FROM loans WHERE id = ?1", Loan::COLUMNS),
            params![loan_id],
            Loan::from_row,
        )
        .optional()?;

    Ok(loan)
}

// ============================================================================
// REPAYMENT
// ============================================================================

/// Pay one installment of `loan_id` from the balance of `handle`
///
/// Guards (in order): loan exists and belongs to the account, loan is
/// Active, balance covers the installment. Balance debit, outstanding total
/// and installment count commit together or not at all.
pub fn pay_installment(conn: &mut Connection, loan_id: i64, handle: &str) -> LedgerResult<Loan> {
    let tx = begin_write(conn)?;

    let loan = find_loan(&tx, loan_id)?.ok_or(LedgerError::LoanNotFound(loan_id))?;
    let account = require_account(&tx, handle)?;

    // Someone else's loan looks exactly like a missing one
    if loan.account_id != account.id {
        tracing::warn!(loan_id, handle = %handle, "payment rejected: loan not owned by account");
        return Err(LedgerError::LoanNotFound(loan_id));
    }

    if !loan.is_active() {
        tracing::warn!(loan_id, "payment rejected: loan already settled");
        return Err(LedgerError::AlreadySettled(loan_id));
    }

    if !account.can_afford(loan.monthly_installment) {
        tracing::warn!(
            loan_id,
            handle = %handle,
            installment = %loan.monthly_installment,
            available = %account.balance,
            "payment rejected: insufficient balance"
        );
        return Err(LedgerError::InsufficientBalance {
            needed: loan.monthly_installment,
            available: account.balance,
        });
    }

    let paid = loan.after_installment()?;

    write_balance(&tx, account.id, account.balance - loan.monthly_installment)?;

    tx.execute(
        "UPDATE loans SET remaining_installments = ?1, outstanding_total = ?2 WHERE id = ?3",
        params![
            paid.remaining_installments,
            decimal_param(paid.outstanding_total),
            loan_id
        ],
    )?;

    insert_event(
        &tx,
        &Event::new(
            EntityKind::Loan,
            loan_id,
            "installment_paid",
            ACTOR,
            serde_json::json!({
                "handle": handle,
                "amount": loan.monthly_installment,
                "remaining_installments": paid.remaining_installments,
                "outstanding_total": paid.outstanding_total,
            }),
        ),
    )?;

    tx.commit()?;

    tracing::info!(
        loan_id,
        handle = %handle,
        status = paid.status().as_str(),
        remaining = paid.remaining_installments,
        outstanding = %paid.outstanding_total,
        "installment paid"
    );
    Ok(paid)
}

/// Handle of the account that owns a loan
pub fn loan_owner(conn: &Connection, loan_id: i64) -> LedgerResult<String> {
    let loan = get_loan(conn, loan_id)?;

    find_account_by_id(conn, loan.account_id)?
        .map(|account| account.handle)
        .ok_or_else(|| LedgerError::AccountNotFound(format!("#{}", loan.account_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_events_for_entity, open_in_memory};
    use crate::entities::LoanStatus;
    use crate::error::ErrorKind;
    use crate::ledger::{create_account, create_account_with_grant, get_balance};
    use rust_decimal_macros::dec;

    // ========================================================================
    // SIMULATION
    // ========================================================================

    #[test]
    fn test_simulate_terms_reference_case() {
        let terms = simulate_terms(dec!(12), dec!(120000), 12).unwrap();

        assert_eq!(terms.total_interest, dec!(14400.00));
        assert_eq!(terms.total_to_pay, dec!(134400.00));
        assert_eq!(terms.monthly_installment, dec!(11200.00));
    }

    #[test]
    fn test_simulate_terms_rounds_to_cents() {
        let terms = simulate_terms(dec!(10), dec!(50000), 10).unwrap();

        assert_eq!(terms.total_interest, dec!(4166.67));
        assert_eq!(terms.total_to_pay, dec!(54166.67));
        assert_eq!(terms.monthly_installment, dec!(5416.67));
    }

    #[test]
    fn test_simulate_terms_zero_rate() {
        let terms = simulate_terms(dec!(0), dec!(900), 3).unwrap();

        assert_eq!(terms.total_interest, dec!(0));
        assert_eq!(terms.total_to_pay, dec!(900));
        assert_eq!(terms.monthly_installment, dec!(300));
    }

    #[test]
    fn test_simulate_terms_is_flat_not_compounding() {
        // Doubling the term doubles the interest exactly
        let short = simulate_terms(dec!(24), dec!(10000), 6).unwrap();
        let long = simulate_terms(dec!(24), dec!(10000), 12).unwrap();

        assert_eq!(short.total_interest, dec!(1200.00));
        assert_eq!(long.total_interest, dec!(2400.00));
    }

    #[test]
    fn test_simulate_terms_rejects_bad_input() {
        assert!(simulate_terms(dec!(10), dec!(1000), 0).is_err());
        assert!(simulate_terms(dec!(10), dec!(0), 12).is_err());
        assert!(simulate_terms(dec!(10), dec!(-100), 12).is_err());
        assert!(simulate_terms(dec!(-1), dec!(1000), 12).is_err());

        let err = simulate_terms(dec!(10), dec!(1000.005), 12).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_simulate_terms_out_of_range() {
        let huge = Decimal::from_scientific("1e28").unwrap();

        let err = simulate_terms(dec!(100), huge, 1200).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = simulate_terms(Decimal::MAX, dec!(1000), 12).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    // ========================================================================
    // ORIGINATION
    // ========================================================================

    #[test]
    fn test_originate_loan_credits_principal() {
        let mut conn = open_in_memory().unwrap();
        let handle = create_account(&mut conn).unwrap();

        let loan = originate_loan(
            &mut conn,
            &handle,
            dec!(50000),
            10,
            dec!(5500),
            dec!(10),
            dec!(55000),
        )
        .unwrap();

        assert_eq!(get_balance(&conn, &handle).unwrap(), dec!(1050000));
        assert_eq!(loan.remaining_installments, 10);
        assert_eq!(loan.outstanding_total, dec!(55000));
        assert_eq!(loan.status(), LoanStatus::Active);

        let active = list_active_loans(&conn, &handle).unwrap();
        assert_eq!(active, vec![loan]);
    }

    #[test]
    fn test_originate_loan_unknown_account() {
        let mut conn = open_in_memory().unwrap();

        let err = originate_loan(
            &mut conn,
            "ghost",
            dec!(1000),
            2,
            dec!(550),
            dec!(10),
            dec!(1100),
        )
        .unwrap_err();

        assert!(matches!(err, LedgerError::AccountNotFound(_)));
        let loans: i64 = conn
            .query_row("SELECT COUNT(*) FROM loans", [], |row| row.get(0))
            .unwrap();
        assert_eq!(loans, 0);
    }

    #[test]
    fn test_originate_loan_rejects_bad_input() {
        let mut conn = open_in_memory().unwrap();
        let handle = create_account(&mut conn).unwrap();

        let err = originate_loan(&mut conn, &handle, dec!(1000), 0, dec!(10), dec!(1), dec!(10))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = originate_loan(&mut conn, &handle, dec!(0), 2, dec!(10), dec!(1), dec!(10))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let sub_cent = [
            (dec!(1000.001), dec!(550), dec!(1100)),
            (dec!(1000), dec!(550.005), dec!(1100)),
            (dec!(1000), dec!(550), dec!(1100.1234)),
        ];
        for (principal, installment, total) in sub_cent {
            let err = originate_loan(&mut conn, &handle, principal, 2, installment, dec!(10), total)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }

        assert_eq!(get_balance(&conn, &handle).unwrap(), dec!(1000000));
    }

    #[test]
    fn test_originate_loan_credit_overflow() {
        let mut conn = open_in_memory().unwrap();
        let handle = create_account_with_grant(&mut conn, Decimal::MAX).unwrap();

        let err = originate_loan(&mut conn, &handle, dec!(1), 1, dec!(1), dec!(0), dec!(1))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(get_balance(&conn, &handle).unwrap(), Decimal::MAX);
        assert!(list_active_loans(&conn, &handle).unwrap().is_empty());
    }

    #[test]
    fn test_request_loan_uses_simulated_terms() {
        let mut conn = open_in_memory().unwrap();
        let handle = create_account(&mut conn).unwrap();

        let loan = request_loan(&mut conn, &handle, dec!(12), dec!(120000), 12).unwrap();

        assert_eq!(loan.monthly_installment, dec!(11200.00));
        assert_eq!(loan.outstanding_total, dec!(134400.00));
        assert_eq!(loan.annual_rate, dec!(12));
        assert_eq!(get_balance(&conn, &handle).unwrap(), dec!(1120000));
        assert_eq!(loan_owner(&conn, loan.id).unwrap(), handle);
    }

    // ========================================================================
    // REPAYMENT
    // ========================================================================

    #[test]
    fn test_pay_installment() {
        let mut conn = open_in_memory().unwrap();
        let handle = create_account(&mut conn).unwrap();
        let loan = request_loan(&mut conn, &handle, dec!(12), dec!(120000), 12).unwrap();

        let paid = pay_installment(&mut conn, loan.id, &handle).unwrap();

        assert_eq!(paid.remaining_installments, 11);
        assert_eq!(paid.outstanding_total, dec!(123200.00));
        assert_eq!(get_balance(&conn, &handle).unwrap(), dec!(1108800));
        assert_eq!(get_loan(&conn, loan.id).unwrap(), paid);
    }

    #[test]
    fn test_pay_installment_until_settled() {
        let mut conn = open_in_memory().unwrap();
        let handle = create_account(&mut conn).unwrap();
        let loan = request_loan(&mut conn, &handle, dec!(12), dec!(120000), 12).unwrap();

        for _ in 0..loan.remaining_installments {
            pay_installment(&mut conn, loan.id, &handle).unwrap();
        }

        let settled = get_loan(&conn, loan.id).unwrap();
        assert_eq!(settled.remaining_installments, 0);
        assert_eq!(settled.outstanding_total, dec!(0));
        assert_eq!(settled.status(), LoanStatus::Settled);
        assert!(list_active_loans(&conn, &handle).unwrap().is_empty());

        let balance = get_balance(&conn, &handle).unwrap();
        let err = pay_installment(&mut conn, loan.id, &handle).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadySettled(id) if id == loan.id));
        assert_eq!(get_balance(&conn, &handle).unwrap(), balance);
    }

    #[test]
    fn test_pay_installment_rounding_residue() {
        let mut conn = open_in_memory().unwrap();
        let handle = create_account(&mut conn).unwrap();
        let loan = request_loan(&mut conn, &handle, dec!(10), dec!(50000), 10).unwrap();

        for _ in 0..10 {
            pay_installment(&mut conn, loan.id, &handle).unwrap();
        }

        // 10 × 5416.67 overshoots 54166.67 by three cents
        let settled = get_loan(&conn, loan.id).unwrap();
        assert_eq!(settled.remaining_installments, 0);
        assert_eq!(settled.outstanding_total, dec!(-0.03));
        assert!(settled.outstanding_total.abs() < dec!(0.01) * Decimal::from(10));
    }

    #[test]
    fn test_pay_installment_insufficient_balance() {
        let mut conn = open_in_memory().unwrap();
        let handle = create_account_with_grant(&mut conn, dec!(0)).unwrap();
        let loan = originate_loan(&mut conn, &handle, dec!(100), 2, dec!(60), dec!(10), dec!(120))
            .unwrap();
        let bystander = create_account(&mut conn).unwrap();
        crate::transfer::transfer(&mut conn, &handle, &bystander, dec!(50)).unwrap();

        let err = pay_installment(&mut conn, loan.id, &handle).unwrap_err();

        assert!(matches!(
            err,
            LedgerError::InsufficientBalance { needed, available }
                if needed == dec!(60) && available == dec!(50)
        ));
        let unchanged = get_loan(&conn, loan.id).unwrap();
        assert_eq!(unchanged, loan);
        assert_eq!(get_balance(&conn, &handle).unwrap(), dec!(50));
    }

    #[test]
    fn test_pay_installment_unknown_loan() {
        let mut conn = open_in_memory().unwrap();
        let handle = create_account(&mut conn).unwrap();

        let err = pay_installment(&mut conn, 404, &handle).unwrap_err();
        assert!(matches!(err, LedgerError::LoanNotFound(404)));
        assert!(get_loan(&conn, 404).unwrap_err().is_not_found());
    }

    #[test]
    fn test_pay_installment_foreign_loan() {
        let mut conn = open_in_memory().unwrap();
        let owner = create_account(&mut conn).unwrap();
        let stranger = create_account(&mut conn).unwrap();
        let loan = request_loan(&mut conn, &owner, dec!(12), dec!(1200), 12).unwrap();

        let err = pay_installment(&mut conn, loan.id, &stranger).unwrap_err();

        assert!(matches!(err, LedgerError::LoanNotFound(_)));
        assert_eq!(get_balance(&conn, &stranger).unwrap(), dec!(1000000));
        assert_eq!(get_loan(&conn, loan.id).unwrap().remaining_installments, 12);
    }

    #[test]
    fn test_list_active_loans_filters_settled() {
        let mut conn = open_in_memory().unwrap();
        let handle = create_account(&mut conn).unwrap();
        let other = create_account(&mut conn).unwrap();

        let short = request_loan(&mut conn, &handle, dec!(5), dec!(1000), 1).unwrap();
        let long = request_loan(&mut conn, &handle, dec!(5), dec!(1000), 6).unwrap();
        request_loan(&mut conn, &other, dec!(5), dec!(1000), 6).unwrap();

        pay_installment(&mut conn, short.id, &handle).unwrap();

        let active = list_active_loans(&conn, &handle).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, long.id);

        assert!(list_active_loans(&conn, "ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn test_loan_events() {
        let mut conn = open_in_memory().unwrap();
        let handle = create_account(&mut conn).unwrap();
        let loan = request_loan(&mut conn, &handle, dec!(12), dec!(1200), 2).unwrap();
        pay_installment(&mut conn, loan.id, &handle).unwrap();

        let events = get_events_for_entity(&conn, EntityKind::Loan, &loan.id.to_string()).unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["loan_originated", "installment_paid"]);
        assert_eq!(events[1].data["remaining_installments"], 1);
    }
}
