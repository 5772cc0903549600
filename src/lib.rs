// Banca - Core Library
// Ledger, transfer, exchange and loan engines over a single SQLite store.
// Exposes every operation for the CLI and for tests; no HTTP, no templates.

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod loans;
pub mod savings;
pub mod transfer;

// Re-export commonly used types
pub use config::{Config, ConfigError, LogFormat};
pub use db::{
    EntityKind, Event,
    open_database, open_in_memory, setup_database,
    insert_event, get_events_for_entity, count_events,
};
pub use entities::{
    Account, OPENING_GRANT,
    Transfer, TransferEntry, Direction,
    Loan, LoanStatus, LoanTerms,
};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use exchange::{
    ExchangeReceipt, FixedRate, RateSource, Side,
    buy_foreign, sell_foreign, buy_foreign_at_market, sell_foreign_at_market,
};
pub use ledger::{
    create_account, create_account_with_grant,
    get_account, get_balance, get_foreign_holding,
    set_balance, add_foreign_holding,
    total_balance, count_accounts,
};
pub use loans::{
    simulate_terms, originate_loan, request_loan,
    list_active_loans, get_loan, pay_installment, loan_owner,
};
pub use savings::{SavingsProjection, project_savings};
pub use transfer::{transfer, get_transfers_for, get_transfer, count_transfers};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
