// 🗄️ Store - SQLite schema, write transactions and the audit trail
//
// Amounts live in TEXT columns as normalized decimals. Every committed
// mutation appends one row to `events` inside its own transaction, so the
// audit trail never records an operation that rolled back.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::LedgerResult;

// ============================================================================
// AUDIT TRAIL ENTRIES
// ============================================================================

/// The kind of record an audit entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Keyed by account handle
    Account,
    /// Keyed by transfer id
    Transfer,
    /// Keyed by loan id
    Loan,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "account",
            EntityKind::Transfer => "transfer",
            EntityKind::Loan => "loan",
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "account" => Ok(EntityKind::Account),
            "transfer" => Ok(EntityKind::Transfer),
            "loan" => Ok(EntityKind::Loan),
            other => Err(format!(
                "unknown entity kind {:?} (expected account, transfer or loan)",
                other
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub recorded_at: DateTime<Utc>,
    pub entity: EntityKind,
    pub entity_id: String,
    pub event_type: String,
    pub actor: String,

    /// Operation-specific payload; amounts serialize as strings
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(
        entity: EntityKind,
        entity_id: impl ToString,
        event_type: &str,
        actor: &str,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            entity,
            entity_id: entity_id.to_string(),
            event_type: event_type.to_string(),
            actor: actor.to_string(),
            data,
        }
    }
}

/// Open (and migrate) a file-backed store
pub fn open_database(path: &Path, busy_timeout: Duration) -> LedgerResult<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;

    // WAL: readers don't block the single writer
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    tracing::debug!(path = %path.display(), journal_mode = %mode, "store opened");

    setup_database(&conn)?;
    Ok(conn)
}

/// Open (and migrate) a private in-memory store
pub fn open_in_memory() -> LedgerResult<Connection> {
    let conn = Connection::open_in_memory()?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> LedgerResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Accounts Table
    // Amounts are TEXT decimals, never REAL
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            handle TEXT UNIQUE NOT NULL,
            balance TEXT NOT NULL,
            foreign_holding TEXT NOT NULL DEFAULT '0',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Transfers Table (append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transfers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id INTEGER NOT NULL REFERENCES accounts(id),
            recipient_id INTEGER NOT NULL REFERENCES accounts(id),
            amount TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Loans Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS loans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL REFERENCES accounts(id),
            remaining_installments INTEGER NOT NULL,
            monthly_installment TEXT NOT NULL,
            annual_rate TEXT NOT NULL,
            principal TEXT NOT NULL,
            outstanding_total TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_sender ON transfers(sender_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_recipient ON transfers(recipient_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_loans_account ON loans(account_id, remaining_installments)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Begin a write transaction that holds the write lock from its first read
///
/// Balance checks and the writes that depend on them must run inside the
/// same IMMEDIATE transaction, otherwise two writers can both pass a check
/// against the same stale balance.
pub fn begin_write(conn: &mut Connection) -> LedgerResult<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// Append an entry to the audit trail (call on the mutation's transaction)
pub fn insert_event(conn: &Connection, event: &Event) -> LedgerResult<()> {
    let payload = serde_json::to_string(&event.data)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type, entity_type, entity_id, data, actor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.recorded_at.to_rfc3339(),
            event.event_type,
            event.entity.as_str(),
            event.entity_id,
            payload,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Audit trail of one account, transfer or loan, in commit order
pub fn get_events_for_entity(
    conn: &Connection,
    entity: EntityKind,
    entity_id: &str,
) -> LedgerResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map(params![entity.as_str(), entity_id], event_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let recorded_at: String = row.get(1)?;
    let entity: String = row.get(3)?;
    let payload: String = row.get(5)?;

    Ok(Event {
        event_id: row.get(0)?,
        recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
            .with_timezone(&Utc),
        event_type: row.get(2)?,
        entity: entity
            .parse::<EntityKind>()
            .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?,
        entity_id: row.get(4)?,
        data: serde_json::from_str(&payload)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
        actor: row.get(6)?,
    })
}

pub fn count_events(conn: &Connection) -> LedgerResult<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// DECIMAL COLUMNS
// ============================================================================

/// Read a TEXT decimal column
pub(crate) fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Render a decimal for a TEXT column (trailing zeros stripped)
pub(crate) fn decimal_param(value: Decimal) -> String {
    value.normalize().to_string()
}
