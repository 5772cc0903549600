// Banca CLI - drives the ledger core from the command line
//
// Usage:
//   banca open
//   banca balance <HANDLE>
//   banca transfer <FROM> <TO> <AMOUNT>
//   banca buy <HANDLE> <AMOUNT> --rate 1015.50
//   banca simulate <RATE> <PRINCIPAL> <MONTHS>
//   banca borrow <HANDLE> <RATE> <PRINCIPAL> <MONTHS>
//   banca pay <HANDLE> <LOAN_ID>
//
// Results go to stdout as JSON, logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use banca::{
    buy_foreign_at_market, create_account_with_grant, get_account, get_events_for_entity,
    get_loan, get_transfers_for, list_active_loans, open_database, pay_installment,
    project_savings, request_loan, sell_foreign_at_market, simulate_terms, transfer, Config,
    EntityKind, ErrorKind, FixedRate, LedgerError, LogFormat,
};

/// Banca - simulated bank ledger, currency desk and loan office
#[derive(Parser)]
#[command(name = "banca")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Database file path (overrides BANCA_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open a new account and print its handle
    Open,

    /// Show balance and foreign holding
    Balance { handle: String },

    /// Send local currency to another account
    Transfer {
        from: String,
        to: String,
        amount: Decimal,
    },

    /// Transfer history, both directions
    History { handle: String },

    /// Buy foreign currency
    Buy {
        handle: String,
        amount: Decimal,
        /// Local units per foreign unit (defaults to BANCA_FX_RATE)
        #[arg(long)]
        rate: Option<Decimal>,
    },

    /// Sell foreign currency
    Sell {
        handle: String,
        amount: Decimal,
        /// Local units per foreign unit (defaults to BANCA_FX_RATE)
        #[arg(long)]
        rate: Option<Decimal>,
    },

    /// Show loan terms without borrowing
    Simulate {
        /// Annual rate in percent
        rate: Decimal,
        principal: Decimal,
        months: u32,
    },

    /// Take a loan on the simulated terms
    Borrow {
        handle: String,
        /// Annual rate in percent
        rate: Decimal,
        principal: Decimal,
        months: u32,
    },

    /// Active loans of an account
    Loans { handle: String },

    /// One loan in detail
    Loan { id: i64 },

    /// Pay the next installment of a loan
    Pay { handle: String, loan_id: i64 },

    /// Project compound savings growth
    Project {
        capital: Decimal,
        /// Annual rate in percent
        rate: Decimal,
        years: u32,
        contribution: Decimal,
    },

    /// Audit trail of an entity (account handle, transfer id, loan id)
    Events {
        /// account, transfer or loan
        entity: EntityKind,
        entity_id: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    init_tracing(config.log_format);

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e.downcast_ref::<LedgerError>().map(LedgerError::kind);
            match kind {
                Some(kind) => eprintln!("❌ [{}] {:#}", kind.as_str(), e),
                None => eprintln!("❌ {:#}", e),
            }
            ExitCode::from(exit_code(kind))
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
}

fn run(cli: Cli, config: Config) -> Result<()> {
    let db_path = cli.db.unwrap_or_else(|| config.db_path.clone());
    let mut conn = open_database(&db_path, config.busy_timeout)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match cli.command {
        Command::Open => {
            let handle = create_account_with_grant(&mut conn, config.opening_grant)
                .context("Failed to open account")?;
            print_json(&get_account(&conn, &handle)?)
        }
        Command::Balance { handle } => print_json(&get_account(&conn, &handle)?),
        Command::Transfer { from, to, amount } => {
            let record = transfer(&mut conn, &from, &to, amount).context("Transfer failed")?;
            print_json(&record)
        }
        Command::History { handle } => print_json(&get_transfers_for(&conn, &handle)?),
        Command::Buy {
            handle,
            amount,
            rate,
        } => {
            let source = rate_source(rate, &config)?;
            let receipt = buy_foreign_at_market(&mut conn, &handle, amount, &source)
                .context("Purchase failed")?;
            print_json(&receipt)
        }
        Command::Sell {
            handle,
            amount,
            rate,
        } => {
            let source = rate_source(rate, &config)?;
            let receipt = sell_foreign_at_market(&mut conn, &handle, amount, &source)
                .context("Sale failed")?;
            print_json(&receipt)
        }
        Command::Simulate {
            rate,
            principal,
            months,
        } => print_json(&simulate_terms(rate, principal, months)?),
        Command::Borrow {
            handle,
            rate,
            principal,
            months,
        } => {
            let loan = request_loan(&mut conn, &handle, rate, principal, months)
                .context("Loan request failed")?;
            print_json(&loan)
        }
        Command::Loans { handle } => print_json(&list_active_loans(&conn, &handle)?),
        Command::Loan { id } => print_json(&get_loan(&conn, id)?),
        Command::Pay { handle, loan_id } => {
            let loan =
                pay_installment(&mut conn, loan_id, &handle).context("Installment payment failed")?;
            print_json(&loan)
        }
        Command::Project {
            capital,
            rate,
            years,
            contribution,
        } => print_json(&project_savings(capital, rate, years, contribution)?),
        Command::Events { entity, entity_id } => {
            print_json(&get_events_for_entity(&conn, entity, &entity_id)?)
        }
    }
}

fn rate_source(rate: Option<Decimal>, config: &Config) -> Result<FixedRate> {
    let rate = rate
        .or(config.fx_rate)
        .context("No exchange rate: pass --rate or set BANCA_FX_RATE")?;
    Ok(FixedRate::new(rate)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(kind: Option<ErrorKind>) -> u8 {
    match kind {
        Some(ErrorKind::InvalidInput) => 2,
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::InsufficientFunds) => 4,
        Some(ErrorKind::AlreadySettled) => 5,
        Some(ErrorKind::Persistence) | None => 1,
    }
}
