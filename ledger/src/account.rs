//! Per-account balance ledger.
//!
//! An [`Account`] keeps three books (deposit, winnings, savings) per
//! currency. Every public mutation validates first and only then touches
//! balances, so an `Err` always leaves the account exactly as it was. Each
//! change to a book appends one [`LedgerEntry`] to the account's log.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{LedgerError, Result};
use crate::fairness::SeedChain;
use crate::settlement::{GameRecord, Session};
use crate::types::{BalanceKind, Currency, checked_add, checked_mul, current_timestamp};

pub type BalanceMap = BTreeMap<Currency, Decimal>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Books {
    pub deposit_balance: BalanceMap,
    pub winnings_balance: BalanceMap,
    pub savings_balance: BalanceMap,
}

impl Books {
    fn zeroed() -> Self {
        let zero: BalanceMap = Currency::ALL.iter().map(|c| (*c, Decimal::ZERO)).collect();
        Books {
            deposit_balance: zero.clone(),
            winnings_balance: zero.clone(),
            savings_balance: zero,
        }
    }

    pub fn book(&self, kind: BalanceKind) -> &BalanceMap {
        match kind {
            BalanceKind::Deposit => &self.deposit_balance,
            BalanceKind::Winnings => &self.winnings_balance,
            BalanceKind::Savings => &self.savings_balance,
        }
    }

    fn book_mut(&mut self, kind: BalanceKind) -> &mut BalanceMap {
        match kind {
            BalanceKind::Deposit => &mut self.deposit_balance,
            BalanceKind::Winnings => &mut self.winnings_balance,
            BalanceKind::Savings => &mut self.savings_balance,
        }
    }

    pub fn get(&self, kind: BalanceKind, currency: Currency) -> Decimal {
        self.book(kind).get(&currency).copied().unwrap_or_default()
    }
}

/// All three books for one currency at a point in time
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub deposit: Decimal,
    pub winnings: Decimal,
    pub savings: Decimal,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Deposit,
    Debit,
    Credit,
    Transfer,
    Convert,
    Wager,
    Payout,
    SavingsDiversion,
    Withdrawal,
    WithdrawalReversal,
}

/// One immutable line of the transaction log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub timestamp: u64,
    pub operation: Operation,
    pub balance: BalanceKind,
    pub currency: Currency,
    /// Signed change applied to `balance`
    pub amount: Decimal,
    /// Books for `currency` after the change
    pub balances: BalanceSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Account {
    address: String,
    created_at: u64,
    books: Books,
    pub(crate) sessions: BTreeMap<Currency, Session>,
    pub(crate) liquidity_contributed: BalanceMap,
    pub(crate) games: Vec<GameRecord>,
    pub(crate) seeds: SeedChain,
    log: Vec<LedgerEntry>,
}

impl Account {
    pub fn new(address: &str) -> Self {
        Account {
            address: address.to_string(),
            created_at: current_timestamp(),
            books: Books::zeroed(),
            sessions: BTreeMap::new(),
            liquidity_contributed: BalanceMap::new(),
            games: Vec::new(),
            seeds: SeedChain::new(),
            log: Vec::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn books(&self) -> &Books {
        &self.books
    }

    pub fn balance(&self, kind: BalanceKind, currency: Currency) -> Decimal {
        self.books.get(kind, currency)
    }

    pub fn snapshot(&self, currency: Currency) -> BalanceSnapshot {
        BalanceSnapshot {
            deposit: self.balance(BalanceKind::Deposit, currency),
            winnings: self.balance(BalanceKind::Winnings, currency),
            savings: self.balance(BalanceKind::Savings, currency),
        }
    }

    pub fn log(&self) -> &[LedgerEntry] {
        &self.log
    }

    pub fn games(&self) -> &[GameRecord] {
        &self.games
    }

    pub fn sessions(&self) -> &BTreeMap<Currency, Session> {
        &self.sessions
    }

    /// Highest deposit balance seen in the open session, zero when idle
    pub fn session_peak(&self, currency: Currency) -> Decimal {
        self.sessions
            .get(&currency)
            .map(|s| s.peak)
            .unwrap_or_default()
    }

    pub fn liquidity_contributed(&self) -> &BalanceMap {
        &self.liquidity_contributed
    }

    pub fn seeds(&self) -> &SeedChain {
        &self.seeds
    }

    /// Credits the deposit book.
    pub fn deposit(&mut self, currency: Currency, amount: Decimal) -> Result<Decimal> {
        currency.validate_amount(amount)?;
        self.apply(BalanceKind::Deposit, currency, amount, Operation::Deposit, None)
    }

    pub fn debit(&mut self, kind: BalanceKind, currency: Currency, amount: Decimal) -> Result<Decimal> {
        self.ensure_available(kind, currency, amount)?;
        self.apply(kind, currency, -amount, Operation::Debit, None)
    }

    pub fn credit(&mut self, kind: BalanceKind, currency: Currency, amount: Decimal) -> Result<Decimal> {
        currency.validate_amount(amount)?;
        self.apply(kind, currency, amount, Operation::Credit, None)
    }

    /// Moves funds between two books of the same currency.
    pub fn transfer(
        &mut self,
        from: BalanceKind,
        to: BalanceKind,
        currency: Currency,
        amount: Decimal,
    ) -> Result<()> {
        self.ensure_available(from, currency, amount)?;
        if from == to {
            return Ok(());
        }
        self.ensure_credit(to, currency, amount)?;
        let reference = Some(format!("{from}->{to}"));
        self.apply(from, currency, -amount, Operation::Transfer, reference.clone())?;
        self.apply(to, currency, amount, Operation::Transfer, reference)?;
        Ok(())
    }

    /// Converts `amount` of `from` into `to` at `rate`, inside the deposit book.
    ///
    /// The credited amount is truncated to the target precision and returned.
    pub fn convert(
        &mut self,
        from: Currency,
        to: Currency,
        amount: Decimal,
        rate: Decimal,
    ) -> Result<Decimal> {
        if rate <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "conversion rate {rate} must be greater than 0"
            )));
        }
        self.ensure_available(BalanceKind::Deposit, from, amount)?;
        let credited = to.truncate(checked_mul(amount, rate)?);
        if credited.is_zero() {
            return Err(LedgerError::InvalidAmount(format!(
                "{amount} {from} converts to less than the smallest unit of {to}"
            )));
        }
        if from == to {
            return Ok(amount);
        }

        self.ensure_credit(BalanceKind::Deposit, to, credited)?;

        let reference = Some(format!("{from}->{to}@{rate}"));
        self.apply(BalanceKind::Deposit, from, -amount, Operation::Convert, reference.clone())?;
        self.apply(BalanceKind::Deposit, to, credited, Operation::Convert, reference)?;
        Ok(credited)
    }

    /// Debits funds leaving the platform; returns the log entry id.
    pub fn withdraw(
        &mut self,
        kind: BalanceKind,
        currency: Currency,
        amount: Decimal,
        destination: &str,
    ) -> Result<u64> {
        self.ensure_available(kind, currency, amount)?;
        self.apply(
            kind,
            currency,
            -amount,
            Operation::Withdrawal,
            Some(destination.to_string()),
        )?;
        Ok(self.last_entry_id())
    }

    /// Compensates a withdrawal whose payment did not go through.
    pub fn reverse_withdrawal(
        &mut self,
        kind: BalanceKind,
        currency: Currency,
        amount: Decimal,
        withdrawal_id: u64,
    ) -> Result<Decimal> {
        currency.validate_amount(amount)?;
        self.apply(
            kind,
            currency,
            amount,
            Operation::WithdrawalReversal,
            Some(format!("withdrawal #{withdrawal_id}")),
        )
    }

    pub(crate) fn ensure_available(
        &self,
        kind: BalanceKind,
        currency: Currency,
        amount: Decimal,
    ) -> Result<()> {
        currency.validate_amount(amount)?;
        let available = self.balance(kind, currency);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                kind,
                currency,
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    /// Checks that crediting `amount` keeps the book representable.
    pub(crate) fn ensure_credit(
        &self,
        kind: BalanceKind,
        currency: Currency,
        amount: Decimal,
    ) -> Result<()> {
        checked_add(self.balance(kind, currency), amount).map(|_| ())
    }

    /// Applies a pre-validated signed change and logs it. Returns the new balance.
    ///
    /// Fails, leaving the book alone, only when the sum does not fit a `Decimal`.
    pub(crate) fn apply(
        &mut self,
        kind: BalanceKind,
        currency: Currency,
        delta: Decimal,
        operation: Operation,
        reference: Option<String>,
    ) -> Result<Decimal> {
        let new_balance = checked_add(self.balance(kind, currency), delta)?;
        debug_assert!(new_balance >= Decimal::ZERO, "{kind} {currency} went negative");
        self.books.book_mut(kind).insert(currency, new_balance);

        let entry = LedgerEntry {
            id: self.log.len() as u64 + 1,
            timestamp: current_timestamp(),
            operation,
            balance: kind,
            currency,
            amount: delta,
            balances: self.snapshot(currency),
            reference,
        };
        self.log.push(entry);
        Ok(new_balance)
    }

    fn last_entry_id(&self) -> u64 {
        self.log.last().map(|e| e.id).unwrap_or_default()
    }
}
