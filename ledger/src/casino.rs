//! The ledger service: accounts, settlement, conversion and the pool
//! behind one API.
//!
//! Every method that touches an account takes that account's lock for
//! its whole duration. The pool is only locked while an account lock is
//! already held (never the other way round), so there is a single lock
//! order and no cross-account locking.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::account::{Account, BalanceMap, LedgerEntry, Operation};
use crate::error::Result;
use crate::fairness::SeedCommitment;
use crate::pool::{LiquidityPool, PoolSnapshot};
use crate::rates::ConversionTable;
use crate::repository::{AccountRepository, lock};
use crate::settlement::{
    self, Bet, BetResult, GameRecord, SessionClose, SettingsUpdate, SettlementConfig,
};
use crate::types::{BalanceKind, Currency, checked_add};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletView {
    pub wallet_address: String,
    pub deposit_balance: BalanceMap,
    pub winnings_balance: BalanceMap,
    pub savings_balance: BalanceMap,
    pub session_peak: BalanceMap,
    pub liquidity_contributed: BalanceMap,
}

impl WalletView {
    fn of(account: &Account) -> Self {
        let books = account.books();
        WalletView {
            wallet_address: account.address().to_string(),
            deposit_balance: books.deposit_balance.clone(),
            winnings_balance: books.winnings_balance.clone(),
            savings_balance: books.savings_balance.clone(),
            session_peak: account
                .sessions()
                .iter()
                .map(|(c, s)| (*c, s.peak))
                .collect(),
            liquidity_contributed: account.liquidity_contributed().clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BetReceipt {
    pub record: GameRecord,
    /// Commitment for the player's next bet
    pub next_commitment: SeedCommitment,
    pub wallet: WalletView,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionReceipt {
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub amount: Decimal,
    pub rate: Decimal,
    pub converted_amount: Decimal,
    pub wallet: WalletView,
}

/// A committed withdrawal debit awaiting the payment rail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawalTicket {
    pub wallet_address: String,
    pub wallet_type: BalanceKind,
    pub currency: Currency,
    pub amount: Decimal,
    pub destination_address: String,
    pub entry_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub sessions: Vec<SessionClose>,
    pub contributions: BalanceMap,
    pub wallet: WalletView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsHistoryItem {
    pub entry_id: u64,
    pub timestamp: u64,
    pub currency: Currency,
    pub amount: Decimal,
    pub running_total: Decimal,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameStats {
    pub total_games: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    /// Percentage, 0 when no games were played
    pub win_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsSummary {
    pub wallet_address: String,
    pub total_savings: BalanceMap,
    pub total_usd: Decimal,
    pub savings_history: Vec<SavingsHistoryItem>,
    pub stats: GameStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolView {
    pub wallet_address: String,
    pub contributions: BalanceMap,
    pub contributions_usd: Decimal,
    pub pool: PoolSnapshot,
}

pub struct Casino {
    accounts: Arc<dyn AccountRepository>,
    pool: LiquidityPool,
    config: RwLock<SettlementConfig>,
    rates: RwLock<ConversionTable>,
}

impl Casino {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        config: SettlementConfig,
        rates: ConversionTable,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Casino {
            accounts,
            pool: LiquidityPool::new(),
            config: RwLock::new(config),
            rates: RwLock::new(rates),
        })
    }

    pub fn settings(&self) -> SettlementConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_settings(&self, update: SettingsUpdate) -> Result<SettlementConfig> {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let next = config.merged(update)?;
        tracing::info!(
            savings_fraction = %next.savings_fraction,
            liquidity_fraction = %next.liquidity_fraction,
            basis = %next.savings_basis,
            "settlement settings updated"
        );
        *config = next.clone();
        Ok(next)
    }

    pub fn rates(&self) -> ConversionTable {
        self.rates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn apply_quotes(&self, quotes: &BTreeMap<String, Decimal>, now: u64) -> Result<usize> {
        self.rates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_quotes(quotes, now)
    }

    pub fn open_account(&self, address: &str) -> WalletView {
        let handle = self.accounts.get_or_create(address);
        WalletView::of(&lock(&handle))
    }

    pub fn wallet(&self, address: &str) -> Result<WalletView> {
        let handle = self.accounts.get(address)?;
        Ok(WalletView::of(&lock(&handle)))
    }

    pub fn deposit(&self, address: &str, currency: Currency, amount: Decimal) -> Result<WalletView> {
        let handle = self.accounts.get(address)?;
        let mut account = lock(&handle);
        account.deposit(currency, amount)?;
        Ok(WalletView::of(&account))
    }

    pub fn transfer(
        &self,
        address: &str,
        from: BalanceKind,
        to: BalanceKind,
        currency: Currency,
        amount: Decimal,
    ) -> Result<WalletView> {
        let handle = self.accounts.get(address)?;
        let mut account = lock(&handle);
        account.transfer(from, to, currency, amount)?;
        Ok(WalletView::of(&account))
    }

    /// Converts inside the deposit book at the current table rate.
    pub fn convert(
        &self,
        address: &str,
        from: Currency,
        to: Currency,
        amount: Decimal,
    ) -> Result<ConversionReceipt> {
        let rate = self.rates().rate(from, to)?;
        let handle = self.accounts.get(address)?;
        let mut account = lock(&handle);
        let converted_amount = account.convert(from, to, amount, rate)?;
        Ok(ConversionReceipt {
            from_currency: from,
            to_currency: to,
            amount,
            rate,
            converted_amount,
            wallet: WalletView::of(&account),
        })
    }

    pub fn place_bet(&self, address: &str, bet: &Bet) -> Result<BetReceipt> {
        let config = self.settings();
        let handle = self.accounts.get(address)?;
        let mut account = lock(&handle);

        let record = settlement::settle_bet(&mut account, bet, &config)?;
        if let Err(e) = self.pool.contribute(record.currency, record.liquidity_added) {
            tracing::error!("liquidity of {} {} not pooled: {e}", record.liquidity_added, record.currency);
        }

        Ok(BetReceipt {
            next_commitment: account.seeds().commitment(),
            wallet: WalletView::of(&account),
            record,
        })
    }

    /// Cash-out: closes every open session on the account.
    pub fn end_session(&self, address: &str) -> Result<SessionReport> {
        let config = self.settings();
        let handle = self.accounts.get(address)?;
        let mut account = lock(&handle);

        let sessions = settlement::end_session(&mut account, &config);
        let contributions = self.contribute_closes(&sessions);
        Ok(SessionReport {
            sessions,
            contributions,
            wallet: WalletView::of(&account),
        })
    }

    /// Closes sessions idle for at least `timeout_ms`, across all accounts.
    pub fn end_idle_sessions(&self, now: u64, timeout_ms: u64) -> Vec<(String, SessionClose)> {
        let config = self.settings();
        let mut closed = Vec::new();
        for address in self.accounts.addresses() {
            let Ok(handle) = self.accounts.get(&address) else {
                continue;
            };
            let mut account = lock(&handle);
            let sessions = settlement::end_idle_sessions(&mut account, &config, now, timeout_ms);
            self.contribute_closes(&sessions);
            closed.extend(sessions.into_iter().map(|s| (address.clone(), s)));
        }
        closed
    }

    fn contribute_closes(&self, sessions: &[SessionClose]) -> BalanceMap {
        let mut contributions = BalanceMap::new();
        for close in sessions {
            if let Err(e) = self.pool.contribute(close.currency, close.liquidity_added) {
                tracing::error!("liquidity of {} {} not pooled: {e}", close.liquidity_added, close.currency);
                continue;
            }
            let entry = contributions.entry(close.currency).or_default();
            *entry = entry.saturating_add(close.liquidity_added);
        }
        contributions
    }

    /// Debits a withdrawal before the on-chain payment is attempted.
    pub fn begin_withdrawal(
        &self,
        address: &str,
        kind: BalanceKind,
        currency: Currency,
        amount: Decimal,
        destination: &str,
    ) -> Result<WithdrawalTicket> {
        let handle = self.accounts.get(address)?;
        let entry_id = lock(&handle).withdraw(kind, currency, amount, destination)?;
        Ok(WithdrawalTicket {
            wallet_address: address.to_string(),
            wallet_type: kind,
            currency,
            amount,
            destination_address: destination.to_string(),
            entry_id,
        })
    }

    pub fn reverse_withdrawal(&self, ticket: &WithdrawalTicket) -> Result<WalletView> {
        let handle = self.accounts.get(&ticket.wallet_address)?;
        let mut account = lock(&handle);
        account.reverse_withdrawal(
            ticket.wallet_type,
            ticket.currency,
            ticket.amount,
            ticket.entry_id,
        )?;
        tracing::warn!(
            "reversed withdrawal #{} of {} {} for {}",
            ticket.entry_id,
            ticket.amount,
            ticket.currency,
            ticket.wallet_address
        );
        Ok(WalletView::of(&account))
    }

    pub fn pool(&self) -> PoolSnapshot {
        self.pool.snapshot()
    }

    pub fn pool_view(&self, address: &str) -> Result<PoolView> {
        let handle = self.accounts.get(address)?;
        let contributions = lock(&handle).liquidity_contributed().clone();
        let rates = self.rates();
        let mut contributions_usd = Decimal::ZERO;
        for (currency, amount) in &contributions {
            contributions_usd = checked_add(contributions_usd, rates.usd_value(*currency, *amount)?)?;
        }
        Ok(PoolView {
            wallet_address: address.to_string(),
            contributions,
            contributions_usd,
            pool: self.pool.snapshot(),
        })
    }

    pub fn draw_pool(&self, currency: Currency, amount: Decimal) -> Result<Decimal> {
        let remaining = self.pool.draw(currency, amount)?;
        tracing::info!("drew {} {} from liquidity pool, {} left", amount, currency, remaining);
        Ok(remaining)
    }

    pub fn fairness_commitment(&self, address: &str) -> Result<SeedCommitment> {
        let handle = self.accounts.get(address)?;
        let commitment = lock(&handle).seeds().commitment();
        Ok(commitment)
    }

    /// Most recent games first
    pub fn game_history(&self, address: &str, limit: usize) -> Result<Vec<GameRecord>> {
        let handle = self.accounts.get(address)?;
        let account = lock(&handle);
        Ok(account.games().iter().rev().take(limit).cloned().collect())
    }

    /// Most recent entries first
    pub fn transactions(&self, address: &str, limit: usize) -> Result<Vec<LedgerEntry>> {
        let handle = self.accounts.get(address)?;
        let account = lock(&handle);
        Ok(account.log().iter().rev().take(limit).cloned().collect())
    }

    pub fn savings_summary(&self, address: &str, history_limit: usize) -> Result<SavingsSummary> {
        let handle = self.accounts.get(address)?;
        let account = lock(&handle);
        let rates = self.rates();

        let total_savings = account.books().savings_balance.clone();
        let mut total_usd = Decimal::ZERO;
        for (currency, amount) in &total_savings {
            total_usd = checked_add(total_usd, rates.usd_value(*currency, *amount)?)?;
        }

        let savings_history = account
            .log()
            .iter()
            .rev()
            .filter(|e| e.balance == BalanceKind::Savings && e.operation == Operation::SavingsDiversion)
            .take(history_limit)
            .map(|e| SavingsHistoryItem {
                entry_id: e.id,
                timestamp: e.timestamp,
                currency: e.currency,
                amount: e.amount,
                running_total: e.balances.savings,
                source: e.reference.clone(),
            })
            .collect();

        let total_games = account.games().len() as u64;
        let total_wins = account
            .games()
            .iter()
            .filter(|g| g.result == BetResult::Win)
            .count() as u64;
        let win_rate = if total_games == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(total_wins) * Decimal::ONE_HUNDRED / Decimal::from(total_games)).round_dp(2)
        };

        Ok(SavingsSummary {
            wallet_address: address.to_string(),
            total_savings,
            total_usd,
            savings_history,
            stats: GameStats {
                total_games,
                total_wins,
                total_losses: total_games - total_wins,
                win_rate,
            },
        })
    }
}
