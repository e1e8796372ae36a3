//! Bet settlement and the savings-on-loss rule.
//!
//! A bet debits the wager from the deposit book, resolves the game with
//! the account's committed seed and credits any payout to the winnings
//! book. Losses are diverted into savings and the liquidity pool according
//! to [`SavingsBasis`]:
//!
//! - `SessionLoss`: nothing moves per bet. When the session closes with a
//!   net loss, `min(net loss, session peak)` is split into savings and
//!   liquidity.
//! - `PerBet`: every losing wager is split immediately.
//!
//! The liquidity share is returned to the caller, which owns the pool.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::account::{Account, BalanceSnapshot, Operation};
use crate::error::{LedgerError, Result};
use crate::fairness::SeedReveal;
use crate::games::{self, GameModel};
use crate::types::{BalanceKind, Currency, GameType, checked_add, checked_mul, current_timestamp};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsBasis {
    /// Divert the session's net loss when the session closes
    SessionLoss,
    /// Divert each losing wager as it settles
    PerBet,
}

impl fmt::Display for SavingsBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SavingsBasis::SessionLoss => f.write_str("session_loss"),
            SavingsBasis::PerBet => f.write_str("per_bet"),
        }
    }
}

impl FromStr for SavingsBasis {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "session_loss" | "session" => Ok(SavingsBasis::SessionLoss),
            "per_bet" | "bet" => Ok(SavingsBasis::PerBet),
            other => Err(LedgerError::InvalidConfig(format!(
                "unknown savings basis '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetLimits {
    pub min_bet: Decimal,
    pub max_bet: Decimal,
}

impl BetLimits {
    fn new(min_bet: Decimal, max_bet: Decimal) -> Self {
        BetLimits { min_bet, max_bet }
    }

    pub fn default_for(currency: Currency) -> Self {
        match currency {
            Currency::CRT => BetLimits::new(Decimal::from(100), Decimal::from(1_000_000)),
            Currency::DOGE => BetLimits::new(Decimal::ONE, Decimal::from(100_000)),
            Currency::TRX => BetLimits::new(Decimal::ONE, Decimal::from(10_000)),
            Currency::USDC => BetLimits::new(Decimal::new(1, 1), Decimal::from(1_000)),
        }
    }
}

/// Admin-tunable settlement parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementConfig {
    pub savings_fraction: Decimal,
    pub liquidity_fraction: Decimal,
    pub savings_basis: SavingsBasis,
    pub bet_limits: BTreeMap<Currency, BetLimits>,
    pub games: BTreeMap<GameType, GameModel>,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        SettlementConfig {
            savings_fraction: Decimal::new(9, 1),
            liquidity_fraction: Decimal::new(1, 1),
            savings_basis: SavingsBasis::SessionLoss,
            bet_limits: Currency::ALL
                .iter()
                .map(|c| (*c, BetLimits::default_for(*c)))
                .collect(),
            games: GameType::ALL
                .iter()
                .map(|g| (*g, GameModel::default_for(*g)))
                .collect(),
        }
    }
}

/// Partial update of [`SettlementConfig`]; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub savings_fraction: Option<Decimal>,
    pub liquidity_fraction: Option<Decimal>,
    pub savings_basis: Option<SavingsBasis>,
    #[serde(default)]
    pub bet_limits: BTreeMap<Currency, BetLimits>,
    #[serde(default)]
    pub games: BTreeMap<GameType, GameModel>,
}

impl SettlementConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, fraction) in [
            ("savings_fraction", self.savings_fraction),
            ("liquidity_fraction", self.liquidity_fraction),
        ] {
            if fraction < Decimal::ZERO || fraction > Decimal::ONE {
                return Err(LedgerError::InvalidConfig(format!(
                    "{name} {fraction} must be between 0 and 1"
                )));
            }
        }
        if self.savings_fraction + self.liquidity_fraction > Decimal::ONE {
            return Err(LedgerError::InvalidConfig(format!(
                "savings_fraction + liquidity_fraction = {} exceeds 1",
                self.savings_fraction + self.liquidity_fraction
            )));
        }
        for (currency, limits) in &self.bet_limits {
            if limits.min_bet <= Decimal::ZERO || limits.min_bet > limits.max_bet {
                return Err(LedgerError::InvalidConfig(format!(
                    "{currency}: invalid bet limits {}..{}",
                    limits.min_bet, limits.max_bet
                )));
            }
        }
        for (game, model) in &self.games {
            model.validate(*game)?;
        }
        Ok(())
    }

    /// Returns a validated copy with `update` applied.
    pub fn merged(&self, update: SettingsUpdate) -> Result<Self> {
        let mut next = self.clone();
        if let Some(fraction) = update.savings_fraction {
            next.savings_fraction = fraction;
        }
        if let Some(fraction) = update.liquidity_fraction {
            next.liquidity_fraction = fraction;
        }
        if let Some(basis) = update.savings_basis {
            next.savings_basis = basis;
        }
        next.bet_limits.extend(update.bet_limits);
        next.games.extend(update.games);
        next.validate()?;
        Ok(next)
    }

    pub fn limits(&self, currency: Currency) -> BetLimits {
        self.bet_limits
            .get(&currency)
            .copied()
            .unwrap_or_else(|| BetLimits::default_for(currency))
    }

    pub fn game_model(&self, game: GameType) -> GameModel {
        self.games
            .get(&game)
            .cloned()
            .unwrap_or_else(|| GameModel::default_for(game))
    }
}

#[derive(Debug, Clone)]
pub struct Bet {
    pub game: GameType,
    pub currency: Currency,
    pub amount: Decimal,
    /// Player-chosen seed; the wallet address is used when absent
    pub client_seed: Option<String>,
}

/// Running totals for one currency since the last session close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Highest deposit balance held before any bet of this session reduced it
    pub peak: Decimal,
    pub wagered: Decimal,
    pub paid_out: Decimal,
    pub bets: u64,
    pub started_at: u64,
    pub last_activity: u64,
}

impl Session {
    fn open(peak: Decimal, now: u64) -> Self {
        Session {
            peak,
            wagered: Decimal::ZERO,
            paid_out: Decimal::ZERO,
            bets: 0,
            started_at: now,
            last_activity: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.bets > 0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetResult {
    Win,
    Loss,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameRecord {
    pub game_id: String,
    pub game_type: GameType,
    pub currency: Currency,
    pub bet_amount: Decimal,
    pub result: BetResult,
    pub multiplier: Decimal,
    pub payout: Decimal,
    pub savings_contribution: Decimal,
    pub liquidity_added: Decimal,
    pub session_peak: Decimal,
    pub balances: BalanceSnapshot,
    pub fairness: SeedReveal,
    pub timestamp: u64,
}

/// Outcome of closing one currency's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionClose {
    pub currency: Currency,
    pub peak: Decimal,
    pub wagered: Decimal,
    pub paid_out: Decimal,
    /// `paid_out - wagered`; negative for a losing session
    pub net: Decimal,
    pub bets: u64,
    pub savings_contribution: Decimal,
    pub liquidity_added: Decimal,
    pub started_at: u64,
    pub ended_at: u64,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
struct Diversion {
    savings: Decimal,
    liquidity: Decimal,
}

impl Diversion {
    /// Splits `basis` into its savings and liquidity shares.
    fn split(currency: Currency, basis: Decimal, config: &SettlementConfig) -> Result<Self> {
        Ok(Diversion {
            savings: currency.truncate(checked_mul(basis, config.savings_fraction)?),
            liquidity: currency.truncate(checked_mul(basis, config.liquidity_fraction)?),
        })
    }

    /// Fails if crediting this diversion would overflow the account.
    fn check(&self, account: &Account, currency: Currency) -> Result<Decimal> {
        account.ensure_credit(BalanceKind::Savings, currency, self.savings)?;
        let contributed = account
            .liquidity_contributed
            .get(&currency)
            .copied()
            .unwrap_or_default();
        checked_add(contributed, self.liquidity)
    }
}

/// Credits the savings share to the account and records the liquidity
/// share, which the caller hands to the pool. Fails without touching the
/// account.
fn divert(
    account: &mut Account,
    currency: Currency,
    diversion: Diversion,
    reference: &str,
) -> Result<Diversion> {
    let contributed = diversion.check(account, currency)?;

    if diversion.savings > Decimal::ZERO {
        account.apply(
            BalanceKind::Savings,
            currency,
            diversion.savings,
            Operation::SavingsDiversion,
            Some(reference.to_string()),
        )?;
    }
    if diversion.liquidity > Decimal::ZERO {
        account.liquidity_contributed.insert(currency, contributed);
    }
    Ok(diversion)
}

/// Settles one bet against `account`.
///
/// # Errors
///
/// - [`LedgerError::InvalidBet`] for non-positive amounts, amounts outside
///   the currency's bet limits or finer than its precision.
/// - [`LedgerError::InsufficientFunds`] when the wager exceeds the deposit
///   balance.
/// - [`LedgerError::InvalidAmount`] when the largest possible payout or
///   diversion would not fit the account's totals.
///
/// On error the account is untouched.
pub fn settle_bet(account: &mut Account, bet: &Bet, config: &SettlementConfig) -> Result<GameRecord> {
    let currency = bet.currency;
    let amount = bet.amount;

    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidBet(
            "bet amount must be greater than 0".to_string(),
        ));
    }
    currency
        .validate_amount(amount)
        .map_err(|e| LedgerError::InvalidBet(e.to_string()))?;

    let available = account.balance(BalanceKind::Deposit, currency);
    if amount > available {
        return Err(LedgerError::InsufficientFunds {
            kind: BalanceKind::Deposit,
            currency,
            requested: amount,
            available,
        });
    }

    let limits = config.limits(currency);
    if amount < limits.min_bet || amount > limits.max_bet {
        return Err(LedgerError::InvalidBet(format!(
            "{amount} {currency} is outside the allowed range {} - {}",
            limits.min_bet, limits.max_bet
        )));
    }

    // Every total the bet can touch must stay representable
    let model = config.game_model(bet.game);
    let max_payout = currency.truncate(checked_mul(amount, model.max_multiplier())?);
    account.ensure_credit(BalanceKind::Winnings, currency, max_payout)?;
    let per_bet = Diversion::split(currency, amount, config)?;
    if config.savings_basis == SavingsBasis::PerBet {
        per_bet.check(account, currency)?;
    }
    if let Some(session) = account.sessions.get(&currency).filter(|s| s.is_active()) {
        checked_add(session.wagered, amount)?;
        checked_add(session.paid_out, max_payout)?;
    }

    // Validated; from here on the bet always completes
    let now = current_timestamp();
    let client_seed = bet
        .client_seed
        .clone()
        .unwrap_or_else(|| account.address().to_string());

    let session = account
        .sessions
        .entry(currency)
        .or_insert_with(|| Session::open(available, now));
    if !session.is_active() {
        *session = Session::open(available, now);
    }
    session.peak = session.peak.max(available);
    let session_peak = session.peak;

    let (reveal, mut rng) = account.seeds.draw(&client_seed);
    let outcome = games::outcome(&model, &mut rng);
    let game_id = format!("game_{}", &reveal.server_seed_hash[..12]);

    account.apply(
        BalanceKind::Deposit,
        currency,
        -amount,
        Operation::Wager,
        Some(game_id.clone()),
    )?;

    let payout = if outcome.is_win {
        currency.truncate(checked_mul(amount, outcome.multiplier)?)
    } else {
        Decimal::ZERO
    };
    if payout > Decimal::ZERO {
        account.apply(
            BalanceKind::Winnings,
            currency,
            payout,
            Operation::Payout,
            Some(game_id.clone()),
        )?;
    }

    let diversion = if !outcome.is_win && config.savings_basis == SavingsBasis::PerBet {
        divert(account, currency, per_bet, &game_id)?
    } else {
        Diversion::default()
    };

    if let Some(session) = account.sessions.get_mut(&currency) {
        session.wagered = checked_add(session.wagered, amount)?;
        session.paid_out = checked_add(session.paid_out, payout)?;
        session.bets += 1;
        session.last_activity = now;
    }

    let record = GameRecord {
        game_id,
        game_type: bet.game,
        currency,
        bet_amount: amount,
        result: if outcome.is_win {
            BetResult::Win
        } else {
            BetResult::Loss
        },
        multiplier: outcome.multiplier,
        payout,
        savings_contribution: diversion.savings,
        liquidity_added: diversion.liquidity,
        session_peak,
        balances: account.snapshot(currency),
        fairness: reveal,
        timestamp: now,
    };
    tracing::debug!(
        account = account.address(),
        game = %record.game_type,
        result = ?record.result,
        "settled {} {}",
        amount,
        currency
    );
    account.games.push(record.clone());
    Ok(record)
}

/// Closes every active session on the account.
pub fn end_session(account: &mut Account, config: &SettlementConfig) -> Vec<SessionClose> {
    close_sessions(account, config, current_timestamp(), |_| true)
}

/// Closes sessions whose last bet is at least `timeout_ms` older than `now`.
pub fn end_idle_sessions(
    account: &mut Account,
    config: &SettlementConfig,
    now: u64,
    timeout_ms: u64,
) -> Vec<SessionClose> {
    close_sessions(account, config, now, |session| {
        now.saturating_sub(session.last_activity) >= timeout_ms
    })
}

fn close_sessions<F>(
    account: &mut Account,
    config: &SettlementConfig,
    now: u64,
    should_close: F,
) -> Vec<SessionClose>
where
    F: Fn(&Session) -> bool,
{
    let due: Vec<(Currency, Session)> = account
        .sessions
        .iter()
        .filter(|(_, s)| s.is_active() && should_close(s))
        .map(|(c, s)| (*c, s.clone()))
        .collect();

    let mut closed = Vec::with_capacity(due.len());
    for (currency, session) in due {
        let net = session.paid_out - session.wagered;
        let diversion = if config.savings_basis == SavingsBasis::SessionLoss && net < Decimal::ZERO {
            let basis = (-net).min(session.peak);
            Diversion::split(currency, basis, config)
                .and_then(|diversion| divert(account, currency, diversion, "session close"))
                .unwrap_or_else(|e| {
                    tracing::error!(
                        account = account.address(),
                        %currency,
                        "session loss of {basis} not diverted: {e}"
                    );
                    Diversion::default()
                })
        } else {
            Diversion::default()
        };

        let deposit_now = account.balance(BalanceKind::Deposit, currency);
        account
            .sessions
            .insert(currency, Session::open(deposit_now, now));

        closed.push(SessionClose {
            currency,
            peak: session.peak,
            wagered: session.wagered,
            paid_out: session.paid_out,
            net,
            bets: session.bets,
            savings_contribution: diversion.savings,
            liquidity_added: diversion.liquidity,
            started_at: session.started_at,
            ended_at: now,
        });
    }
    closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::{BPS_DENOMINATOR, PayoutTable};
    use rust_decimal_macros::dec;

    fn config_with_win_rate(win_rate_bps: u32, basis: SavingsBasis) -> SettlementConfig {
        let mut config = SettlementConfig {
            savings_basis: basis,
            ..SettlementConfig::default()
        };
        config.games.insert(
            GameType::Roulette,
            GameModel {
                win_rate_bps,
                payout: PayoutTable::Choice {
                    multipliers: vec![dec!(2)],
                },
            },
        );
        config
    }

    fn always_lose(basis: SavingsBasis) -> SettlementConfig {
        config_with_win_rate(0, basis)
    }

    fn always_win() -> SettlementConfig {
        config_with_win_rate(BPS_DENOMINATOR, SavingsBasis::SessionLoss)
    }

    fn bet(amount: Decimal) -> Bet {
        Bet {
            game: GameType::Roulette,
            currency: Currency::DOGE,
            amount,
            client_seed: None,
        }
    }

    fn funded(amount: Decimal) -> Account {
        let mut account = Account::new("DWallet");
        account.deposit(Currency::DOGE, amount).unwrap();
        account
    }

    #[test]
    fn test_losing_bet_debits_deposit() {
        let mut account = funded(dec!(100));
        let record = settle_bet(&mut account, &bet(dec!(10)), &always_lose(SavingsBasis::SessionLoss)).unwrap();

        assert_eq!(record.result, BetResult::Loss);
        assert_eq!(record.payout, dec!(0));
        assert_eq!(record.savings_contribution, dec!(0));
        assert_eq!(account.balance(BalanceKind::Deposit, Currency::DOGE), dec!(90));
        assert_eq!(account.session_peak(Currency::DOGE), dec!(100));
        assert_eq!(account.games().len(), 1);
    }

    #[test]
    fn test_winning_bet_credits_winnings() {
        let mut account = funded(dec!(100));
        let record = settle_bet(&mut account, &bet(dec!(10)), &always_win()).unwrap();

        assert_eq!(record.result, BetResult::Win);
        assert_eq!(record.multiplier, dec!(2));
        assert_eq!(record.payout, dec!(20));
        assert_eq!(account.balance(BalanceKind::Deposit, Currency::DOGE), dec!(90));
        assert_eq!(account.balance(BalanceKind::Winnings, Currency::DOGE), dec!(20));
    }

    #[test]
    fn test_bet_above_deposit_is_insufficient_funds() {
        let mut account = funded(dec!(5));
        let before = account.books().clone();
        let err = settle_bet(&mut account, &bet(dec!(6)), &always_lose(SavingsBasis::PerBet)).unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(account.books(), &before);
        assert!(account.games().is_empty());
        assert!(account.sessions().is_empty());
    }

    #[test]
    fn test_bet_outside_limits_is_invalid() {
        let mut account = funded(dec!(200_000));
        let config = always_lose(SavingsBasis::SessionLoss);

        // DOGE limits are 1 - 100000
        let low = settle_bet(&mut account, &bet(dec!(0.5)), &config).unwrap_err();
        let high = settle_bet(&mut account, &bet(dec!(100_001)), &config).unwrap_err();
        let zero = settle_bet(&mut account, &bet(dec!(0)), &config).unwrap_err();

        assert!(matches!(low, LedgerError::InvalidBet(_)));
        assert!(matches!(high, LedgerError::InvalidBet(_)));
        assert!(matches!(zero, LedgerError::InvalidBet(_)));
        assert_eq!(account.balance(BalanceKind::Deposit, Currency::DOGE), dec!(200_000));
    }

    #[test]
    fn test_session_loss_diverts_on_close() {
        let mut account = funded(dec!(100));
        let config = always_lose(SavingsBasis::SessionLoss);
        settle_bet(&mut account, &bet(dec!(10)), &config).unwrap();

        let closed = end_session(&mut account, &config);

        assert_eq!(closed.len(), 1);
        let close = &closed[0];
        assert_eq!(close.peak, dec!(100));
        assert_eq!(close.net, dec!(-10));
        assert_eq!(close.savings_contribution, dec!(9));
        assert_eq!(close.liquidity_added, dec!(1));
        assert_eq!(account.balance(BalanceKind::Savings, Currency::DOGE), dec!(9));
        assert_eq!(account.liquidity_contributed()[&Currency::DOGE], dec!(1));
        // peak resets to the post-settlement deposit balance
        assert_eq!(account.session_peak(Currency::DOGE), dec!(90));
        assert!(!account.sessions()[&Currency::DOGE].is_active());
    }

    #[test]
    fn test_per_bet_diverts_immediately() {
        let mut account = funded(dec!(100));
        let config = always_lose(SavingsBasis::PerBet);
        let record = settle_bet(&mut account, &bet(dec!(10)), &config).unwrap();

        assert_eq!(record.savings_contribution, dec!(9));
        assert_eq!(record.liquidity_added, dec!(1));
        assert_eq!(account.balance(BalanceKind::Savings, Currency::DOGE), dec!(9));

        // closing the session moves nothing further
        let closed = end_session(&mut account, &config);
        assert_eq!(closed[0].savings_contribution, dec!(0));
        assert_eq!(account.balance(BalanceKind::Savings, Currency::DOGE), dec!(9));
    }

    #[test]
    fn test_winning_session_diverts_nothing() {
        let mut account = funded(dec!(100));
        settle_bet(&mut account, &bet(dec!(10)), &always_win()).unwrap();

        let closed = end_session(&mut account, &always_win());
        assert_eq!(closed[0].net, dec!(10));
        assert_eq!(closed[0].savings_contribution, dec!(0));
        assert_eq!(account.balance(BalanceKind::Savings, Currency::DOGE), dec!(0));
    }

    #[test]
    fn test_session_peak_tracks_highest_pre_bet_balance() {
        let mut account = funded(dec!(50));
        let config = always_lose(SavingsBasis::SessionLoss);
        settle_bet(&mut account, &bet(dec!(10)), &config).unwrap();
        assert_eq!(account.session_peak(Currency::DOGE), dec!(50));

        account.deposit(Currency::DOGE, dec!(60)).unwrap();
        settle_bet(&mut account, &bet(dec!(10)), &config).unwrap();
        assert_eq!(account.session_peak(Currency::DOGE), dec!(100));

        settle_bet(&mut account, &bet(dec!(10)), &config).unwrap();
        assert_eq!(account.session_peak(Currency::DOGE), dec!(100));
    }

    #[test]
    fn test_idle_sessions_close_after_timeout() {
        let mut account = funded(dec!(100));
        let config = always_lose(SavingsBasis::SessionLoss);
        let record = settle_bet(&mut account, &bet(dec!(10)), &config).unwrap();

        let fresh = end_idle_sessions(&mut account, &config, record.timestamp + 1_000, 60_000);
        assert!(fresh.is_empty());

        let stale = end_idle_sessions(&mut account, &config, record.timestamp + 60_000, 60_000);
        assert_eq!(stale.len(), 1);
        assert_eq!(account.balance(BalanceKind::Savings, Currency::DOGE), dec!(9));
    }

    #[test]
    fn test_end_session_without_bets_is_empty() {
        let mut account = funded(dec!(100));
        assert!(end_session(&mut account, &SettlementConfig::default()).is_empty());
    }

    #[test]
    fn test_payout_that_cannot_fit_winnings_is_rejected() {
        let mut account = funded(dec!(100));
        account
            .apply(BalanceKind::Winnings, Currency::DOGE, Decimal::MAX, Operation::Payout, None)
            .unwrap();
        let before = account.books().clone();
        let nonce = account.seeds().commitment().nonce;

        let err = settle_bet(&mut account, &bet(dec!(10)), &always_win()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
        assert_eq!(account.books(), &before);
        assert_eq!(account.seeds().commitment().nonce, nonce);
        assert!(account.games().is_empty());
    }

    #[test]
    fn test_per_bet_diversion_that_cannot_fit_savings_is_rejected() {
        let mut account = funded(dec!(100));
        account
            .apply(BalanceKind::Savings, Currency::DOGE, Decimal::MAX, Operation::SavingsDiversion, None)
            .unwrap();
        let before = account.books().clone();

        let err = settle_bet(&mut account, &bet(dec!(10)), &always_lose(SavingsBasis::PerBet)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
        assert_eq!(account.books(), &before);
    }

    #[test]
    fn test_game_record_and_log_wire_shape() {
        let mut account = funded(dec!(100));
        let record = settle_bet(&mut account, &bet(dec!(10)), &always_lose(SavingsBasis::PerBet)).unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["game_type"], "Roulette");
        assert_eq!(json["currency"], "DOGE");
        assert_eq!(json["result"], "loss");
        assert_eq!(json["bet_amount"], "10");
        assert_eq!(json["savings_contribution"], "9");
        assert_eq!(json["balances"]["deposit"], "90");
        assert_eq!(json["fairness"]["server_seed_hash"], record.fairness.server_seed_hash);

        let log = serde_json::to_value(account.log()).unwrap();
        assert_eq!(log[0]["operation"], "deposit");
        assert_eq!(log[0]["balance"], "deposit");
        assert!(log[0].get("reference").is_none());
        assert_eq!(log[1]["operation"], "wager");
        assert_eq!(log[1]["amount"], "-10");
        assert_eq!(log[1]["reference"], record.game_id);
        assert_eq!(log[2]["operation"], "savings_diversion");
        assert_eq!(log[2]["balance"], "savings");
    }

    #[test]
    fn test_config_validation() {
        let config = SettlementConfig::default();
        config.validate().unwrap();

        let update = SettingsUpdate {
            savings_fraction: Some(dec!(0.95)),
            ..SettingsUpdate::default()
        };
        assert!(matches!(config.merged(update), Err(LedgerError::InvalidConfig(_))));

        let update = SettingsUpdate {
            savings_fraction: Some(dec!(0.5)),
            liquidity_fraction: Some(dec!(0.2)),
            savings_basis: Some(SavingsBasis::PerBet),
            ..SettingsUpdate::default()
        };
        let merged = config.merged(update).unwrap();
        assert_eq!(merged.savings_fraction, dec!(0.5));
        assert_eq!(merged.savings_basis, SavingsBasis::PerBet);
        assert_eq!(merged.bet_limits, config.bet_limits);
    }

    #[test]
    fn test_savings_basis_parse() {
        assert_eq!("per-bet".parse::<SavingsBasis>().unwrap(), SavingsBasis::PerBet);
        assert_eq!("SESSION_LOSS".parse::<SavingsBasis>().unwrap(), SavingsBasis::SessionLoss);
        assert!("peak".parse::<SavingsBasis>().is_err());
    }

    #[test]
    fn test_revealed_seed_replays_outcome() {
        let mut account = funded(dec!(1_000));
        let config = SettlementConfig::default();
        let model = config.game_model(GameType::Roulette);
        for _ in 0..20 {
            let record = settle_bet(&mut account, &bet(dec!(5)), &config).unwrap();
            let replay = crate::fairness::replay(&model, &record.fairness);
            assert_eq!(replay.is_win, record.result == BetResult::Win);
            assert_eq!(replay.multiplier, record.multiplier);
        }
    }
}
