//! Currency conversion table.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::error::{LedgerError, Result};
use crate::types::{Currency, checked_mul};

/// Directed pair rates, `amount_to = amount_from * rate(from, to)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionTable {
    rates: BTreeMap<(Currency, Currency), Decimal>,
    updated_at: u64,
}

impl Default for ConversionTable {
    /// Static fallback quotes used until a live source answers
    fn default() -> Self {
        use Currency::*;
        let quotes = [
            (CRT, DOGE, Decimal::new(215, 1)),
            (CRT, TRX, Decimal::new(98, 1)),
            (CRT, USDC, Decimal::new(15, 2)),
            (DOGE, CRT, Decimal::new(47, 3)),
            (DOGE, TRX, Decimal::new(456, 3)),
            (DOGE, USDC, Decimal::new(7, 3)),
            (TRX, CRT, Decimal::new(102, 3)),
            (TRX, DOGE, Decimal::new(219, 2)),
            (TRX, USDC, Decimal::new(15, 3)),
            (USDC, CRT, Decimal::new(667, 2)),
            (USDC, DOGE, Decimal::new(14286, 2)),
            (USDC, TRX, Decimal::new(6667, 2)),
        ];
        ConversionTable {
            rates: quotes
                .into_iter()
                .map(|(from, to, rate)| ((from, to), rate))
                .collect(),
            updated_at: 0,
        }
    }
}

/// Splits a `"CRT_DOGE"` style key.
pub fn parse_pair(key: &str) -> Result<(Currency, Currency)> {
    let unknown = || LedgerError::UnknownCurrencyPair {
        from: key.to_string(),
        to: String::new(),
    };
    let (from, to) = key.split_once(&['_', '/', '-'][..]).ok_or_else(unknown)?;
    match (from.parse::<Currency>(), to.parse::<Currency>()) {
        (Ok(from), Ok(to)) => Ok((from, to)),
        _ => Err(LedgerError::UnknownCurrencyPair {
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

impl ConversionTable {
    pub fn empty() -> Self {
        ConversionTable {
            rates: BTreeMap::new(),
            updated_at: 0,
        }
    }

    pub fn rate(&self, from: Currency, to: Currency) -> Result<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        self.rates
            .get(&(from, to))
            .copied()
            .ok_or_else(|| LedgerError::UnknownCurrencyPair {
                from: from.to_string(),
                to: to.to_string(),
            })
    }

    /// Like [`rate`](Self::rate) for symbols coming off the wire.
    pub fn rate_for_symbols(&self, from: &str, to: &str) -> Result<Decimal> {
        match (from.parse::<Currency>(), to.parse::<Currency>()) {
            (Ok(from), Ok(to)) => self.rate(from, to),
            _ => Err(LedgerError::UnknownCurrencyPair {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    pub fn set_rate(&mut self, from: Currency, to: Currency, rate: Decimal) -> Result<()> {
        if rate <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "rate {from}/{to} must be greater than 0, got {rate}"
            )));
        }
        if from != to {
            self.rates.insert((from, to), rate);
        }
        Ok(())
    }

    /// Applies quotes keyed like `"CRT_DOGE"`. Nothing is applied if any quote is bad.
    pub fn apply_quotes(&mut self, quotes: &BTreeMap<String, Decimal>, now: u64) -> Result<usize> {
        let mut next = self.clone();
        for (key, rate) in quotes {
            let (from, to) = parse_pair(key)?;
            next.set_rate(from, to, *rate)?;
        }
        next.updated_at = now;
        *self = next;
        Ok(quotes.len())
    }

    pub fn updated_at(&self) -> u64 {
        self.updated_at
    }

    /// Rates keyed `"FROM_TO"`, the shape clients expect
    pub fn quotes(&self) -> BTreeMap<String, Decimal> {
        self.rates
            .iter()
            .map(|((from, to), rate)| (format!("{from}_{to}"), *rate))
            .collect()
    }

    /// Values `amount` in USD through the USDC leg of the table.
    pub fn usd_value(&self, currency: Currency, amount: Decimal) -> Result<Decimal> {
        checked_mul(amount, self.rate(currency, Currency::USDC)?)
    }

    /// Largest `|rate(a,b) * rate(b,a) - 1|` over pairs quoted both ways.
    /// A product too large for a `Decimal` counts as `Decimal::MAX`.
    pub fn max_round_trip_deviation(&self) -> Decimal {
        self.rates
            .iter()
            .filter_map(|((from, to), rate)| {
                self.rates.get(&(*to, *from)).map(|back| {
                    rate.checked_mul(*back)
                        .map_or(Decimal::MAX, |product| (product - Decimal::ONE).abs())
                })
            })
            .max()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_same_currency_is_identity() {
        let table = ConversionTable::empty();
        for currency in Currency::ALL {
            assert_eq!(table.rate(currency, currency).unwrap(), Decimal::ONE);
        }
    }

    #[test]
    fn test_default_crt_doge_rate() {
        let table = ConversionTable::default();
        assert_eq!(table.rate(Currency::CRT, Currency::DOGE).unwrap(), dec!(21.5));
        assert_eq!(table.quotes().len(), 12);
    }

    #[test]
    fn test_missing_pair_is_unknown() {
        let table = ConversionTable::empty();
        assert!(matches!(
            table.rate(Currency::CRT, Currency::TRX),
            Err(LedgerError::UnknownCurrencyPair { .. })
        ));
        assert!(matches!(
            ConversionTable::default().rate_for_symbols("CRT", "SOL"),
            Err(LedgerError::UnknownCurrencyPair { .. })
        ));
    }

    #[test]
    fn test_apply_quotes_is_all_or_nothing() {
        let mut table = ConversionTable::default();
        let mut quotes = BTreeMap::new();
        quotes.insert("CRT_DOGE".to_string(), dec!(22));
        quotes.insert("CRT_BTC".to_string(), dec!(0.000002));

        assert!(table.apply_quotes(&quotes, 1).is_err());
        assert_eq!(table.rate(Currency::CRT, Currency::DOGE).unwrap(), dec!(21.5));

        quotes.remove("CRT_BTC");
        assert_eq!(table.apply_quotes(&quotes, 7).unwrap(), 1);
        assert_eq!(table.rate(Currency::CRT, Currency::DOGE).unwrap(), dec!(22));
        assert_eq!(table.updated_at(), 7);
    }

    #[test]
    fn test_usd_value_uses_usdc_leg() {
        let table = ConversionTable::default();
        assert_eq!(table.usd_value(Currency::CRT, dec!(100)).unwrap(), dec!(15));
        assert_eq!(table.usd_value(Currency::USDC, dec!(3)).unwrap(), dec!(3));
    }

    #[test]
    fn test_usd_value_overflow_is_an_error() {
        let table = ConversionTable::default();
        assert!(matches!(
            table.usd_value(Currency::CRT, Decimal::MAX),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_round_trip_deviation_survives_huge_quotes() {
        let mut table = ConversionTable::empty();
        let huge = Decimal::from_i128_with_scale(10i128.pow(20), 0);
        table.set_rate(Currency::CRT, Currency::DOGE, huge).unwrap();
        table.set_rate(Currency::DOGE, Currency::CRT, huge).unwrap();
        assert_eq!(table.max_round_trip_deviation(), Decimal::MAX);
    }

    #[test]
    fn test_round_trip_deviation() {
        let mut table = ConversionTable::empty();
        table.set_rate(Currency::CRT, Currency::DOGE, dec!(20)).unwrap();
        table.set_rate(Currency::DOGE, Currency::CRT, dec!(0.05)).unwrap();
        assert_eq!(table.max_round_trip_deviation(), dec!(0));

        table.set_rate(Currency::DOGE, Currency::CRT, dec!(0.06)).unwrap();
        assert_eq!(table.max_round_trip_deviation(), dec!(0.2));
    }

    #[test]
    fn test_parse_pair_separators() {
        assert_eq!(parse_pair("trx/usdc").unwrap(), (Currency::TRX, Currency::USDC));
        assert!(parse_pair("CRTDOGE").is_err());
    }
}
