// ⚙️ Configuration - BANCA_* environment variables over built-in defaults
//
// A `.env` file in the working directory is loaded first when present.
// Invalid values fail startup with the offending variable named.

use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::entities::OPENING_GRANT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub opening_grant: Decimal,
    pub busy_timeout: Duration,

    /// Rate used by buy/sell when none is given on the command line
    pub fx_rate: Option<Decimal>,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("banca.db"),
            opening_grant: OPENING_GRANT,
            busy_timeout: Duration::from_millis(5000),
            fx_rate: None,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load `.env` if present, then read BANCA_* variables over the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup("BANCA_DB_PATH").filter(|v| !v.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup("BANCA_OPENING_GRANT") {
            let grant = parse_decimal("BANCA_OPENING_GRANT", &raw)?;
            if grant < Decimal::ZERO {
                return Err(invalid("BANCA_OPENING_GRANT", &raw, "must not be negative"));
            }
            if grant.normalize().scale() > 2 {
                return Err(invalid("BANCA_OPENING_GRANT", &raw, "must be whole cents"));
            }
            config.opening_grant = grant;
        }

        if let Some(raw) = lookup("BANCA_BUSY_TIMEOUT_MS") {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| invalid("BANCA_BUSY_TIMEOUT_MS", &raw, e))?;
            config.busy_timeout = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup("BANCA_FX_RATE").filter(|v| !v.trim().is_empty()) {
            let rate = parse_decimal("BANCA_FX_RATE", &raw)?;
            if rate <= Decimal::ZERO {
                return Err(invalid("BANCA_FX_RATE", &raw, "must be positive"));
            }
            config.fx_rate = Some(rate);
        }

        if let Some(raw) = lookup("BANCA_LOG_FORMAT") {
            config.log_format = match raw.trim().to_ascii_lowercase().as_str() {
                "text" | "" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => return Err(invalid("BANCA_LOG_FORMAT", &raw, "expected text or json")),
            };
        }

        Ok(config)
    }
}

fn parse_decimal(var: &'static str, raw: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(raw.trim()).map_err(|e| invalid(var, raw, e))
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
