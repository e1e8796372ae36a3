//! Error type shared by every ledger operation.
//!
//! Business-rule failures are raised before any balance is touched, so a
//! caller that receives one of these can assume the account is unchanged.

use rust_decimal::Decimal;

use crate::types::{BalanceKind, Currency};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A debit would drive a balance below zero.
    #[error("insufficient {currency} in {kind} balance: requested {requested}, available {available}")]
    InsufficientFunds {
        kind: BalanceKind,
        currency: Currency,
        requested: Decimal,
        available: Decimal,
    },

    #[error("liquidity pool holds {available} {currency}, {requested} requested")]
    InsufficientLiquidity {
        currency: Currency,
        requested: Decimal,
        available: Decimal,
    },

    /// The wager is non-positive or outside the configured bet limits.
    #[error("invalid bet: {0}")]
    InvalidBet(String),

    /// Amounts must be positive and fit the currency precision.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown currency pair {from}/{to}")]
    UnknownCurrencyPair { from: String, to: String },

    #[error("unknown currency '{0}'")]
    UnknownCurrency(String),

    #[error("unknown wallet type '{0}'")]
    UnknownBalanceKind(String),

    #[error("account '{0}' not found")]
    AccountNotFound(String),

    /// Raw message from the payment rail, not parsed further.
    #[error("external transfer failed: {0}")]
    ExternalTransferFailed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LedgerError {
    /// Stable machine-readable code used in API responses.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::InsufficientLiquidity { .. } => "insufficient_liquidity",
            LedgerError::InvalidBet(_) => "invalid_bet",
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::UnknownCurrencyPair { .. } => "unknown_currency_pair",
            LedgerError::UnknownCurrency(_) => "unknown_currency",
            LedgerError::UnknownBalanceKind(_) => "unknown_wallet_type",
            LedgerError::AccountNotFound(_) => "account_not_found",
            LedgerError::ExternalTransferFailed(_) => "external_transfer_failed",
            LedgerError::InvalidConfig(_) => "invalid_config",
        }
    }
}
