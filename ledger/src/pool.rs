//! Process-wide liquidity pool fed by diverted losses.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

use crate::account::BalanceMap;
use crate::error::{LedgerError, Result};
use crate::types::{Currency, checked_add};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolSnapshot {
    pub balances: BalanceMap,
    pub total_contributed: BalanceMap,
    pub total_drawn: BalanceMap,
}

#[derive(Debug, Default)]
pub struct LiquidityPool {
    state: Mutex<PoolSnapshot>,
}

impl LiquidityPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the pool. Fails, leaving the pool alone, when either
    /// running total would overflow.
    pub fn contribute(&self, currency: Currency, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let balance = checked_add(
            state.balances.get(&currency).copied().unwrap_or_default(),
            amount,
        )?;
        let contributed = checked_add(
            state.total_contributed.get(&currency).copied().unwrap_or_default(),
            amount,
        )?;
        state.balances.insert(currency, balance);
        state.total_contributed.insert(currency, contributed);
        Ok(())
    }

    /// Takes `amount` out of the pool; fails past the pool balance.
    pub fn draw(&self, currency: Currency, amount: Decimal) -> Result<Decimal> {
        currency.validate_amount(amount)?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let balance = state.balances.entry(currency).or_default();
        if *balance < amount {
            return Err(LedgerError::InsufficientLiquidity {
                currency,
                requested: amount,
                available: *balance,
            });
        }
        let remaining = *balance - amount;
        let drawn = checked_add(
            state.total_drawn.get(&currency).copied().unwrap_or_default(),
            amount,
        )?;
        state.balances.insert(currency, remaining);
        state.total_drawn.insert(currency, drawn);
        Ok(remaining)
    }

    pub fn balance(&self, currency: Currency) -> Decimal {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.balances.get(&currency).copied().unwrap_or_default()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
