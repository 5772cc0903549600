// 🔁 Transfer Engine - atomic local-currency movement between two accounts
//
// One IMMEDIATE transaction:
//   resolve recipient -> resolve sender -> check funds
//   -> credit recipient -> debit sender -> append transfer row -> event
//
// The sender's balance is read inside the transaction that debits it, so a
// concurrent debit can never slip between the check and the write.

use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::db::{
    begin_write, decimal_column, decimal_param, insert_event, EntityKind, Event,
};
use crate::entities::{Direction, Transfer, TransferEntry};
use crate::error::{in_range, require_cents, require_positive, LedgerError, LedgerResult};
use crate::ledger::{find_account, require_account, write_balance};

const ACTOR: &str = "transfer_engine";

/// Move `amount` from sender to recipient
pub fn transfer(
    conn: &mut Connection,
    sender_handle: &str,
    recipient_handle: &str,
    amount: Decimal,
) -> LedgerResult<Transfer> {
    require_positive("transfer amount", amount)?;
    require_cents("transfer amount", amount)?;
    if sender_handle == recipient_handle {
        return Err(LedgerError::invalid("cannot transfer to the same account"));
    }

    let tx = begin_write(conn)?;

    // 1. Recipient first: a bad recipient must not touch the sender
    let recipient = find_account(&tx, recipient_handle)?.ok_or_else(|| {
        tracing::warn!(recipient = %recipient_handle, "transfer rejected: unknown recipient");
        LedgerError::RecipientNotFound(recipient_handle.to_string())
    })?;

    // 2. Sender
    let sender = find_account(&tx, sender_handle)?
        .ok_or_else(|| LedgerError::SenderNotFound(sender_handle.to_string()))?;

    // 3. Funds, checked against the balance this transaction will overwrite
    if !sender.can_afford(amount) {
        tracing::warn!(
            sender = %sender_handle,
            amount = %amount,
            available = %sender.balance,
            "transfer rejected: insufficient balance"
        );
        return Err(LedgerError::InsufficientBalance {
            needed: amount,
            available: sender.balance,
        });
    }

    // 4. Both legs + ledger record
    let credited = in_range(recipient.balance.checked_add(amount))?;
    write_balance(&tx, recipient.id, credited)?;
    write_balance(&tx, sender.id, sender.balance - amount)?;

    tx.execute(
        "INSERT INTO transfers (sender_id, recipient_id, amount) VALUES (?1, ?2, ?3)",
        params![sender.id, recipient.id, decimal_param(amount)],
    )?;
    let transfer_id = tx.last_insert_rowid();

    insert_event(
        &tx,
        &Event::new(
            EntityKind::Transfer,
            transfer_id,
            "transfer_completed",
            ACTOR,
            serde_json::json!({
                "sender": sender_handle,
                "recipient": recipient_handle,
                "amount": amount,
            }),
        ),
    )?;

    tx.commit()?;

    tracing::info!(
        transfer_id,
        sender = %sender_handle,
        recipient = %recipient_handle,
        amount = %amount,
        "transfer completed"
    );

    Ok(Transfer {
        id: transfer_id,
        sender_account_id: sender.id,
        recipient_account_id: recipient.id,
        amount,
    })
}

/// Every transfer the account took part in, tagged with its side, oldest first
pub fn get_transfers_for(conn: &Connection, handle: &str) -> LedgerResult<Vec<TransferEntry>> {
    let account = require_account(conn, handle)?;

    let mut stmt = conn.prepare(
        "SELECT t.id, other.handle, t.amount, 'sent' AS direction
         FROM transfers t
         INNER JOIN accounts other ON t.recipient_id = other.id
         WHERE t.sender_id = ?1
         UNION ALL
         SELECT t.id, other.handle, t.amount, 'received' AS direction
         FROM transfers t
         INNER JOIN accounts other ON t.sender_id = other.id
         WHERE t.recipient_id = ?1
         ORDER BY 1 ASC",
    )?;

    let entries = stmt
        .query_map(params![account.id], |row| {
            let direction: String = row.get(3)?;

            Ok(TransferEntry {
                transfer_id: row.get(0)?,
                counterparty: row.get(1)?,
                amount: decimal_column(row, 2)?,
                direction: Direction::from_db(&direction).ok_or_else(|| {
                    rusqlite::Error::InvalidColumnType(
                        3,
                        "direction".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn get_transfer(conn: &Connection, transfer_id: i64) -> LedgerResult<Option<Transfer>> {
    let transfer = conn
        .query_row(
            "SELECT id, sender_id, recipient_id, amount FROM transfers WHERE id = ?1",
            params![transfer_id],
            Transfer::from_row,
        )
        .optional()?;

    Ok(transfer)
}

pub fn count_transfers(conn: &Connection) -> LedgerResult<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transfers", [], |row| row.get(0))?;

    Ok(count)
}
