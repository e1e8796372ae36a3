//! Outcome models for each game.
//!
//! Every game is a win-rate check followed by a draw from its payout table.
//! The functions here are pure given the RNG, which keeps settlement
//! reproducible from a revealed seed.

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::types::GameType;

/// Win rates are expressed in basis points of this
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Largest multiplier a payout table may carry
pub const MAX_MULTIPLIER: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoutTable {
    /// Uniform pick from a fixed list of multipliers
    Choice { multipliers: Vec<Decimal> },
    /// Uniform multiplier in `[min, max]`, in steps of 0.01
    Range { min: Decimal, max: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameModel {
    pub win_rate_bps: u32,
    pub payout: PayoutTable,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub is_win: bool,
    /// Zero on a loss
    pub multiplier: Decimal,
}

fn choice(multipliers: &[i64]) -> PayoutTable {
    PayoutTable::Choice {
        multipliers: multipliers.iter().map(|m| Decimal::from(*m)).collect(),
    }
}

impl GameModel {
    pub fn default_for(game: GameType) -> Self {
        match game {
            GameType::SlotMachine => GameModel {
                win_rate_bps: 1_500,
                payout: choice(&[2, 3, 5, 10, 25]),
            },
            GameType::Roulette => GameModel {
                win_rate_bps: 4_700,
                payout: choice(&[2]),
            },
            GameType::Dice => GameModel {
                win_rate_bps: 4_900,
                payout: PayoutTable::Range {
                    min: Decimal::new(150, 2),
                    max: Decimal::from(10),
                },
            },
            GameType::Plinko => GameModel {
                win_rate_bps: 2_000,
                payout: PayoutTable::Choice {
                    multipliers: vec![
                        Decimal::new(15, 1),
                        Decimal::from(2),
                        Decimal::from(4),
                        Decimal::from(9),
                        Decimal::from(26),
                        Decimal::from(130),
                        Decimal::from(1000),
                    ],
                },
            },
            GameType::Keno => GameModel {
                win_rate_bps: 2_500,
                payout: choice(&[3, 12, 42, 108, 810]),
            },
            GameType::Mines => GameModel {
                win_rate_bps: 3_000,
                payout: PayoutTable::Range {
                    min: Decimal::from(2),
                    max: Decimal::from(50),
                },
            },
        }
    }

    /// Largest multiplier a win can draw.
    pub fn max_multiplier(&self) -> Decimal {
        match &self.payout {
            PayoutTable::Choice { multipliers } => {
                multipliers.iter().copied().max().unwrap_or_default()
            }
            PayoutTable::Range { max, .. } => *max,
        }
    }

    pub fn validate(&self, game: GameType) -> Result<()> {
        if self.win_rate_bps > BPS_DENOMINATOR {
            return Err(LedgerError::InvalidConfig(format!(
                "{game}: win rate {} bps exceeds {BPS_DENOMINATOR}",
                self.win_rate_bps
            )));
        }
        if self.max_multiplier() > MAX_MULTIPLIER {
            return Err(LedgerError::InvalidConfig(format!(
                "{game}: multipliers above {MAX_MULTIPLIER} are not allowed"
            )));
        }
        match &self.payout {
            PayoutTable::Choice { multipliers } => {
                if multipliers.is_empty() {
                    return Err(LedgerError::InvalidConfig(format!(
                        "{game}: payout table is empty"
                    )));
                }
                if multipliers.iter().any(|m| *m <= Decimal::ZERO) {
                    return Err(LedgerError::InvalidConfig(format!(
                        "{game}: multipliers must be positive"
                    )));
                }
            }
            PayoutTable::Range { min, max } => {
                if *min <= Decimal::ZERO || min > max {
                    return Err(LedgerError::InvalidConfig(format!(
                        "{game}: invalid multiplier range {min}..{max}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Resolves one round of `model`.
pub fn outcome<R: Rng + ?Sized>(model: &GameModel, rng: &mut R) -> Outcome {
    let roll = rng.gen_range(0..BPS_DENOMINATOR);
    if roll >= model.win_rate_bps {
        return Outcome {
            is_win: false,
            multiplier: Decimal::ZERO,
        };
    }

    let multiplier = match &model.payout {
        PayoutTable::Choice { multipliers } => {
            multipliers[rng.gen_range(0..multipliers.len())]
        }
        PayoutTable::Range { min, max } => {
            let steps = ((*max - *min) * Decimal::ONE_HUNDRED)
                .trunc()
                .to_i64()
                .unwrap_or(0);
            let step = rng.gen_range(0..=steps);
            *min + Decimal::new(step, 2)
        }
    };

    Outcome {
        is_win: true,
        multiplier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rust_decimal_macros::dec;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_default_models_are_valid() {
        for game in GameType::ALL {
            GameModel::default_for(game).validate(game).unwrap();
        }
    }

    #[test]
    fn test_zero_win_rate_always_loses() {
        let model = GameModel {
            win_rate_bps: 0,
            payout: choice(&[2]),
        };
        let mut rng = rng();
        for _ in 0..1_000 {
            let result = outcome(&model, &mut rng);
            assert!(!result.is_win);
            assert_eq!(result.multiplier, Decimal::ZERO);
        }
    }

    #[test]
    fn test_full_win_rate_always_wins_from_table() {
        let model = GameModel::default_for(GameType::SlotMachine);
        let model = GameModel {
            win_rate_bps: BPS_DENOMINATOR,
            ..model
        };
        let allowed = [dec!(2), dec!(3), dec!(5), dec!(10), dec!(25)];
        let mut rng = rng();
        for _ in 0..1_000 {
            let result = outcome(&model, &mut rng);
            assert!(result.is_win);
            assert!(allowed.contains(&result.multiplier));
        }
    }

    #[test]
    fn test_range_payout_stays_in_bounds() {
        let model = GameModel {
            win_rate_bps: BPS_DENOMINATOR,
            payout: PayoutTable::Range {
                min: dec!(1.5),
                max: dec!(10),
            },
        };
        let mut rng = rng();
        for _ in 0..1_000 {
            let m = outcome(&model, &mut rng).multiplier;
            assert!(m >= dec!(1.5) && m <= dec!(10));
            assert!(m.scale() <= 2);
        }
    }

    #[test]
    fn test_win_rate_is_roughly_respected() {
        let model = GameModel::default_for(GameType::Roulette);
        let mut rng = rng();
        let wins = (0..20_000)
            .filter(|_| outcome(&model, &mut rng).is_win)
            .count();
        // 47% of 20k = 9400
        assert!((9_000..9_800).contains(&wins), "wins = {wins}");
    }

    #[test]
    fn test_validate_rejects_bad_models() {
        let too_likely = GameModel {
            win_rate_bps: 10_001,
            payout: choice(&[2]),
        };
        assert!(too_likely.validate(GameType::Dice).is_err());

        let empty = GameModel {
            win_rate_bps: 100,
            payout: PayoutTable::Choice { multipliers: vec![] },
        };
        assert!(empty.validate(GameType::Keno).is_err());

        let inverted = GameModel {
            win_rate_bps: 100,
            payout: PayoutTable::Range {
                min: dec!(5),
                max: dec!(2),
            },
        };
        assert!(inverted.validate(GameType::Mines).is_err());

        let unbounded = GameModel {
            win_rate_bps: 100,
            payout: PayoutTable::Range {
                min: dec!(2),
                max: Decimal::MAX,
            },
        };
        assert!(unbounded.validate(GameType::Dice).is_err());
        assert_eq!(GameModel::default_for(GameType::Plinko).max_multiplier(), dec!(1000));
    }
}
