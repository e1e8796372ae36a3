//! Server configuration loaded from environment variables.
//!
//! Every variable is optional:
//! - `CASINO_BIND_ADDR`: listen address, default `0.0.0.0:8001`
//! - `CASINO_SAVINGS_FRACTION` / `CASINO_LIQUIDITY_FRACTION`: share of a
//!   diverted loss sent to savings / the liquidity pool (0.9 / 0.1)
//! - `CASINO_SAVINGS_BASIS`: `session_loss` (default) or `per_bet`
//! - `CASINO_SESSION_TIMEOUT_SECS`: inactivity before a session is closed (900)
//! - `CASINO_SWEEP_INTERVAL_SECS`: how often idle sessions are swept (30)
//! - `CASINO_CHALLENGE_TTL_SECS`: lifetime of a sign-in challenge (300)
//! - `CASINO_TOKEN_TTL_SECS`: lifetime of a session token (86400)
//! - `CASINO_ADMIN_TOKEN`: enables the admin routes
//! - `CASINO_RATES_URL` / `CASINO_RATES_REFRESH_SECS`: live rate source (60)
//! - `CASINO_PAYMENT_GATEWAY_URL`: signing service for on-chain payouts
//!
//! Empty values are treated as unset.

use ledger::LedgerError;
use ledger::settlement::{SavingsBasis, SettlementConfig};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8001";
const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 900;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;
const DEFAULT_RATES_REFRESH_SECS: u64 = 60;
const DEFAULT_CHALLENGE_TTL_SECS: u64 = 5 * 60;
const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}: cannot parse '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be greater than 0")]
    Zero(&'static str),

    #[error(transparent)]
    Settlement(#[from] LedgerError),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub settlement: SettlementConfig,
    pub session_timeout: Duration,
    pub sweep_interval: Duration,
    pub challenge_ttl: Duration,
    pub token_ttl: Duration,
    pub admin_token: Option<String>,
    pub rates: RateFeedConfig,
    pub payment_gateway_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RateFeedConfig {
    pub url: Option<String>,
    pub refresh: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            settlement: SettlementConfig::default(),
            session_timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            challenge_ttl: Duration::from_secs(DEFAULT_CHALLENGE_TTL_SECS),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            admin_token: None,
            rates: RateFeedConfig {
                url: None,
                refresh: Duration::from_secs(DEFAULT_RATES_REFRESH_SECS),
            },
            payment_gateway_url: None,
        }
    }
}

/// Loads the configuration from the process environment.
pub fn fetch_config() -> Result<AppConfig, ConfigError> {
    from_lookup(|name| std::env::var(name).ok())
}

/// Builds the configuration from any variable source.
///
/// # Errors
///
/// Returns [`ConfigError`] when a value does not parse, a duration is zero,
/// or the resulting settlement fractions are out of range.
pub fn from_lookup<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());
    let mut config = AppConfig::default();

    if let Some(addr) = var("CASINO_BIND_ADDR") {
        config.bind_addr = addr;
    }
    if let Some(value) = var("CASINO_SAVINGS_FRACTION") {
        config.settlement.savings_fraction = parse("CASINO_SAVINGS_FRACTION", &value)?;
    }
    if let Some(value) = var("CASINO_LIQUIDITY_FRACTION") {
        config.settlement.liquidity_fraction = parse("CASINO_LIQUIDITY_FRACTION", &value)?;
    }
    if let Some(value) = var("CASINO_SAVINGS_BASIS") {
        config.settlement.savings_basis = parse::<SavingsBasis>("CASINO_SAVINGS_BASIS", &value)?;
    }
    config.settlement.validate()?;

    if let Some(value) = var("CASINO_SESSION_TIMEOUT_SECS") {
        config.session_timeout = seconds("CASINO_SESSION_TIMEOUT_SECS", &value)?;
    }
    if let Some(value) = var("CASINO_SWEEP_INTERVAL_SECS") {
        config.sweep_interval = seconds("CASINO_SWEEP_INTERVAL_SECS", &value)?;
    }
    if let Some(value) = var("CASINO_CHALLENGE_TTL_SECS") {
        config.challenge_ttl = seconds("CASINO_CHALLENGE_TTL_SECS", &value)?;
    }
    if let Some(value) = var("CASINO_TOKEN_TTL_SECS") {
        config.token_ttl = seconds("CASINO_TOKEN_TTL_SECS", &value)?;
    }
    if let Some(value) = var("CASINO_RATES_REFRESH_SECS") {
        config.rates.refresh = seconds("CASINO_RATES_REFRESH_SECS", &value)?;
    }
    config.admin_token = var("CASINO_ADMIN_TOKEN");
    config.rates.url = var("CASINO_RATES_URL");
    config.payment_gateway_url = var("CASINO_PAYMENT_GATEWAY_URL");

    Ok(config)
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

fn seconds(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse(name, value)?;
    if secs == 0 {
        return Err(ConfigError::Zero(name));
    }
    Ok(Duration::from_secs(secs))
}
