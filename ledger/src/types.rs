use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{LedgerError, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    CRT,
    DOGE,
    TRX,
    USDC,
}

impl Currency {
    pub const ALL: [Currency; 4] = [Currency::CRT, Currency::DOGE, Currency::TRX, Currency::USDC];

    /// Number of fractional digits an amount of this currency may carry
    pub fn precision(self) -> u32 {
        match self {
            Currency::CRT => 9,
            Currency::DOGE => 8,
            Currency::TRX => 6,
            Currency::USDC => 6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Currency::CRT => "CRT",
            Currency::DOGE => "DOGE",
            Currency::TRX => "TRX",
            Currency::USDC => "USDC",
        }
    }

    /// Truncates toward zero so that rounding never creates funds
    pub fn truncate(self, amount: Decimal) -> Decimal {
        amount
            .round_dp_with_strategy(self.precision(), RoundingStrategy::ToZero)
            .normalize()
    }

    /// Checks that `amount` is strictly positive and representable in this currency.
    pub fn validate_amount(self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "{amount} {self} must be greater than 0"
            )));
        }
        if amount > MAX_AMOUNT {
            return Err(LedgerError::InvalidAmount(format!(
                "{amount} {self} exceeds the per-operation limit of {MAX_AMOUNT}"
            )));
        }
        if amount.normalize().scale() > self.precision() {
            return Err(LedgerError::InvalidAmount(format!(
                "{amount} {self} exceeds {} decimal places",
                self.precision()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CRT" => Ok(Currency::CRT),
            "DOGE" => Ok(Currency::DOGE),
            "TRX" => Ok(Currency::TRX),
            "USDC" => Ok(Currency::USDC),
            _ => Err(LedgerError::UnknownCurrency(s.to_string())),
        }
    }
}

/// The three named books every account keeps per currency.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceKind {
    /// Funds available for wagering
    Deposit,
    /// Accumulated wins, withdrawable
    Winnings,
    /// Diverted losses held in the vault, withdrawable
    Savings,
}

impl BalanceKind {
    pub const ALL: [BalanceKind; 3] = [
        BalanceKind::Deposit,
        BalanceKind::Winnings,
        BalanceKind::Savings,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BalanceKind::Deposit => "deposit",
            BalanceKind::Winnings => "winnings",
            BalanceKind::Savings => "savings",
        }
    }
}

impl fmt::Display for BalanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BalanceKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" | "gaming" => Ok(BalanceKind::Deposit),
            "winnings" => Ok(BalanceKind::Winnings),
            "savings" | "vault" => Ok(BalanceKind::Savings),
            _ => Err(LedgerError::UnknownBalanceKind(s.to_string())),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameType {
    #[serde(rename = "Slot Machine")]
    SlotMachine,
    Roulette,
    Dice,
    Plinko,
    Keno,
    Mines,
}

impl GameType {
    pub const ALL: [GameType; 6] = [
        GameType::SlotMachine,
        GameType::Roulette,
        GameType::Dice,
        GameType::Plinko,
        GameType::Keno,
        GameType::Mines,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GameType::SlotMachine => "Slot Machine",
            GameType::Roulette => "Roulette",
            GameType::Dice => "Dice",
            GameType::Plinko => "Plinko",
            GameType::Keno => "Keno",
            GameType::Mines => "Mines",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GameType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slot machine" | "slots" | "slot" => Ok(GameType::SlotMachine),
            "roulette" => Ok(GameType::Roulette),
            "dice" => Ok(GameType::Dice),
            "plinko" => Ok(GameType::Plinko),
            "keno" => Ok(GameType::Keno),
            "mines" => Ok(GameType::Mines),
            other => Err(LedgerError::InvalidBet(format!("unknown game '{other}'"))),
        }
    }
}

/// Largest amount a single operation accepts (10^18 units)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA764_0000, 0x0DE0_B6B3, 0, false, 0);

/// `a + b`, as an error instead of a panic when it does not fit a `Decimal`.
pub fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::InvalidAmount(format!("{a} + {b} is out of range")))
}

/// `a * b`, as an error instead of a panic when it does not fit a `Decimal`.
pub fn checked_mul(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| LedgerError::InvalidAmount(format!("{a} * {b} is out of range")))
}

/// Milliseconds since the unix epoch
#[inline(always)]
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_parse_is_case_insensitive() {
        assert_eq!("doge".parse::<Currency>().unwrap(), Currency::DOGE);
        assert_eq!(" Usdc ".parse::<Currency>().unwrap(), Currency::USDC);
        assert_eq!(
            "SOL".parse::<Currency>(),
            Err(LedgerError::UnknownCurrency("SOL".to_string()))
        );
    }

    #[test]
    fn test_validate_amount_rejects_non_positive() {
        assert!(Currency::CRT.validate_amount(dec!(0)).is_err());
        assert!(Currency::CRT.validate_amount(dec!(-1)).is_err());
        assert!(Currency::CRT.validate_amount(dec!(0.000000001)).is_ok());
    }

    #[test]
    fn test_validate_amount_rejects_oversized() {
        assert_eq!(MAX_AMOUNT, Decimal::from(1_000_000_000_000_000_000u64));
        assert!(Currency::DOGE.validate_amount(MAX_AMOUNT).is_ok());
        assert!(Currency::DOGE.validate_amount(MAX_AMOUNT + dec!(1)).is_err());
        assert!(Currency::CRT.validate_amount(Decimal::MAX).is_err());
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        assert_eq!(checked_add(dec!(1.5), dec!(2)).unwrap(), dec!(3.5));
        assert!(matches!(
            checked_add(Decimal::MAX, dec!(1)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert_eq!(checked_mul(dec!(10), dec!(21.5)).unwrap(), dec!(215));
        assert!(matches!(
            checked_mul(Decimal::MAX, dec!(2)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_validate_amount_rejects_excess_precision() {
        assert!(Currency::USDC.validate_amount(dec!(1.1234567)).is_err());
        assert!(Currency::USDC.validate_amount(dec!(1.123456)).is_ok());
        // trailing zeros do not count
        assert!(Currency::USDC.validate_amount(dec!(1.10000000)).is_ok());
    }

    #[test]
    fn test_truncate_rounds_toward_zero() {
        assert_eq!(Currency::TRX.truncate(dec!(1.2345679)), dec!(1.234567));
        assert_eq!(Currency::DOGE.truncate(dec!(215.0)), dec!(215));
    }

    #[test]
    fn test_game_type_aliases() {
        assert_eq!("slots".parse::<GameType>().unwrap(), GameType::SlotMachine);
        assert_eq!("Slot Machine".parse::<GameType>().unwrap(), GameType::SlotMachine);
        assert!(matches!(
            "Blackjack".parse::<GameType>(),
            Err(LedgerError::InvalidBet(_))
        ));
    }

    #[test]
    fn test_balance_kind_aliases() {
        assert_eq!("gaming".parse::<BalanceKind>().unwrap(), BalanceKind::Deposit);
        assert_eq!("vault".parse::<BalanceKind>().unwrap(), BalanceKind::Savings);
    }
}
