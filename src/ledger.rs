// 📒 Account Ledger - sole owner of balance and foreign_holding
//
// Public operations are the ledger's surface for the presentation layer.
// The pub(crate) helpers take a plain &Connection so the engines can call
// them on an open rusqlite::Transaction (which derefs to Connection): every
// balance read that guards a write happens inside the write's transaction.

use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::db::{
    begin_write, decimal_column, decimal_param, insert_event, EntityKind, Event,
};
use crate::entities::{Account, OPENING_GRANT};
use crate::error::{require_cents, require_non_negative, LedgerError, LedgerResult};

const ACTOR: &str = "ledger";

// ============================================================================
// PUBLIC OPERATIONS
// ============================================================================

/// Open a new account with the standard seed grant, returning its handle
pub fn create_account(conn: &mut Connection) -> LedgerResult<String> {
    create_account_with_grant(conn, OPENING_GRANT)
}

/// Open a new account with a custom seed grant
pub fn create_account_with_grant(conn: &mut Connection, grant: Decimal) -> LedgerResult<String> {
    require_non_negative("opening grant", grant)?;
    require_cents("opening grant", grant)?;

    let handle = uuid::Uuid::new_v4().to_string();
    let tx = begin_write(conn)?;

    tx.execute(
        "INSERT INTO accounts (handle, balance, foreign_holding) VALUES (?1, ?2, ?3)",
        params![handle, decimal_param(grant), decimal_param(Decimal::ZERO)],
    )?;

    insert_event(
        &tx,
        &Event::new(
            EntityKind::Account,
            &handle,
            "account_created",
            ACTOR,
            serde_json::json!({ "opening_grant": grant }),
        ),
    )?;

    tx.commit()?;

    tracing::info!(handle = %handle, grant = %grant, "account created");
    Ok(handle)
}

pub fn get_account(conn: &Connection, handle: &str) -> LedgerResult<Account> {
    require_account(conn, handle)
}

pub fn get_balance(conn: &Connection, handle: &str) -> LedgerResult<Decimal> {
    Ok(require_account(conn, handle)?.balance)
}

pub fn get_foreign_holding(conn: &Connection, handle: &str) -> LedgerResult<Decimal> {
    Ok(require_account(conn, handle)?.foreign_holding)
}

/// Overwrite the balance
///
/// No non-negativity check here: callers that debit must verify funds
/// inside their own transaction.
pub fn set_balance(conn: &mut Connection, handle: &str, new_amount: Decimal) -> LedgerResult<()> {
    require_cents("balance", new_amount)?;

    let tx = begin_write(conn)?;
    let account = require_account(&tx, handle)?;

    write_balance(&tx, account.id, new_amount)?;
    insert_event(
        &tx,
        &Event::new(
            EntityKind::Account,
            handle,
            "balance_set",
            ACTOR,
            serde_json::json!({ "from": account.balance, "to": new_amount }),
        ),
    )?;

    tx.commit()?;
    Ok(())
}

/// Overwrite the foreign holding with a new total (delta pre-added by caller)
pub fn add_foreign_holding(
    conn: &mut Connection,
    handle: &str,
    new_total: Decimal,
) -> LedgerResult<()> {
    let tx = begin_write(conn)?;
    let account = require_account(&tx, handle)?;

    write_foreign_holding(&tx, account.id, new_total)?;
    insert_event(
        &tx,
        &Event::new(
            EntityKind::Account,
            handle,
            "foreign_holding_set",
            ACTOR,
            serde_json::json!({ "from": account.foreign_holding, "to": new_total }),
        ),
    )?;

    tx.commit()?;
    Ok(())
}

/// Sum of every local balance in the store
pub fn total_balance(conn: &Connection) -> LedgerResult<Decimal> {
    let mut stmt = conn.prepare("SELECT balance FROM accounts")?;

    let balances = stmt
        .query_map([], |row| decimal_column(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(balances.into_iter().sum())
}

pub fn count_accounts(conn: &Connection) -> LedgerResult<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// TRANSACTION-SCOPED HELPERS
// ============================================================================

pub(crate) fn find_account(conn: &Connection, handle: &str) -> LedgerResult<Option<Account>> {
    let account = conn
        .query_row(
            &format!("SELECT {} FROM accounts WHERE handle = ?1", Account::COLUMNS),
            params![handle],
            Account::from_row,
        )
        .optional()?;

    Ok(account)
}

pub(crate) fn require_account(conn: &Connection, handle: &str) -> LedgerResult<Account> {
    find_account(conn, handle)?.ok_or_else(|| LedgerError::AccountNotFound(handle.to_string()))
}

pub(crate) fn find_account_by_id(conn: &Connection, id: i64) -> LedgerResult<Option<Account>> {
    let account = conn
        .query_row(
            &format!("SELECT {} FROM accounts WHERE id = ?1", Account::COLUMNS),
            params![id],
            Account::from_row,
        )
        .optional()?;

    Ok(account)
}

pub(crate) fn write_balance(conn: &Connection, account_id: i64, balance: Decimal) -> LedgerResult<()> {
    let updated = conn.execute(
        "UPDATE accounts SET balance = ?1 WHERE id = ?2",
        params![decimal_param(balance), account_id],
    )?;

    if updated == 0 {
        return Err(LedgerError::AccountNotFound(format!("#{}", account_id)));
    }
    Ok(())
}

pub(crate) fn write_foreign_holding(
    conn: &Connection,
    account_id: i64,
    holding: Decimal,
) -> LedgerResult<()> {
    let updated = conn.execute(
        "UPDATE accounts SET foreign_holding = ?1 WHERE id = ?2",
        params![decimal_param(holding), account_id],
    )?;

    if updated == 0 {
        return Err(LedgerError::AccountNotFound(format!("#{}", account_id)));
    }
    Ok(())
}
