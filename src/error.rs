// ⚠️ Ledger Errors - one typed failure per operation outcome
//
// Every core operation returns either a value or exactly one LedgerError.
// ErrorKind groups the concrete variants into the five families the
// presentation layer translates into user-facing messages.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Account, recipient, sender or loan absent
    NotFound,

    /// Balance or foreign holding short of the requirement
    InsufficientFunds,

    /// Loan has no remaining installments
    AlreadySettled,

    /// Store read/write or transaction failure
    Persistence,

    /// Non-positive amount, non-positive term, self-transfer
    InvalidInput,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::AlreadySettled => "already_settled",
            ErrorKind::Persistence => "persistence",
            ErrorKind::InvalidInput => "invalid_input",
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    // === Lookup errors ===
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Sender not found: {0}")]
    SenderNotFound(String),

    #[error("Loan not found: {0}")]
    LoanNotFound(i64),

    // === Funds errors ===
    #[error("Insufficient balance: need {needed}, available {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("Insufficient foreign holding: need {needed}, available {available}")]
    InsufficientHolding { needed: Decimal, available: Decimal },

    // === Loan state ===
    #[error("Loan {0} is already settled")]
    AlreadySettled(i64),

    // === Input validation ===
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // === Store ===
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::AccountNotFound(_)
            | LedgerError::RecipientNotFound(_)
            | LedgerError::SenderNotFound(_)
            | LedgerError::LoanNotFound(_) => ErrorKind::NotFound,
            LedgerError::InsufficientBalance { .. } | LedgerError::InsufficientHolding { .. } => {
                ErrorKind::InsufficientFunds
            }
            LedgerError::AlreadySettled(_) => ErrorKind::AlreadySettled,
            LedgerError::Persistence(_) => ErrorKind::Persistence,
            LedgerError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        LedgerError::InvalidInput(message.into())
    }
}

/// Reject zero and negative amounts
pub(crate) fn require_positive(name: &str, value: Decimal) -> LedgerResult<()> {
    if value <= Decimal::ZERO {
        return Err(LedgerError::invalid(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Reject negative amounts (zero allowed)
pub(crate) fn require_non_negative(name: &str, value: Decimal) -> LedgerResult<()> {
    if value < Decimal::ZERO {
        return Err(LedgerError::invalid(format!(
            "{} must not be negative, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Reject local-currency amounts finer than a cent
pub(crate) fn require_cents(name: &str, value: Decimal) -> LedgerResult<()> {
    if value.normalize().scale() > 2 {
        return Err(LedgerError::invalid(format!(
            "{} must be a whole number of cents, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Unwrap a checked Decimal operation; `None` means it overflowed
pub(crate) fn in_range(value: Option<Decimal>) -> LedgerResult<Decimal> {
    value.ok_or_else(|| LedgerError::invalid("amount out of range"))
}
