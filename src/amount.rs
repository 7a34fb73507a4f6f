use crate::error::GameError;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    iter::Sum,
    str::FromStr,
};

/// Base units per whole coin (nine decimal places, like TON nanocoins).
pub const UNITS_PER_COIN: u64 = 1_000_000_000;
const DECIMALS: usize = 9;

/// Non-negative fixed-point currency amount.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "f64", into = "f64")]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_units(units: u64) -> Self {
        Amount(units)
    }

    pub const fn from_coins(coins: u64) -> Self {
        Amount(coins.saturating_mul(UNITS_PER_COIN))
    }

    /// Converts a decimal coin value, rounding to the nearest base unit.
    pub fn from_f64(coins: f64) -> Result<Self, GameError> {
        if !coins.is_finite() || coins < 0.0 {
            return Err(GameError::InvalidAmount(format!("{coins} is not a valid amount")));
        }
        let units = (coins * UNITS_PER_COIN as f64).round();
        if units >= u64::MAX as f64 {
            return Err(GameError::InvalidAmount(format!("{coins} is too large")));
        }
        Ok(Amount(units as u64))
    }

    pub const fn units(self) -> u64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / UNITS_PER_COIN as f64
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Multiplies by a non-negative factor, rounding to the nearest unit.
    pub fn scale(self, factor: f64) -> Amount {
        if !factor.is_finite() || factor <= 0.0 {
            return Amount::ZERO;
        }
        Amount((self.0 as f64 * factor).round() as u64)
    }

    /// Rejects zero so bet and exchange inputs are strictly positive.
    pub fn ensure_positive(self) -> Result<Amount, GameError> {
        if self.is_zero() {
            return Err(GameError::InvalidAmount(String::from(
                "amount must be greater than zero",
            )));
        }
        Ok(self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNITS_PER_COIN;
        let frac = self.0 % UNITS_PER_COIN;
        if frac == 0 {
            return write!(f, "{whole}.0");
        }
        let digits = format!("{frac:0width$}", width = DECIMALS);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = GameError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || GameError::InvalidAmount(format!("'{raw}' is not a valid amount"));
        let trimmed = raw.trim();
        let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        if frac.len() > DECIMALS {
            return Err(GameError::InvalidAmount(format!(
                "'{raw}' has more than {DECIMALS} decimal places"
            )));
        }
        let whole_units = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u64>()
                .ok()
                .and_then(|w| w.checked_mul(UNITS_PER_COIN))
                .ok_or_else(invalid)?
        };
        let frac_units = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<width$}", width = DECIMALS)
                .parse::<u64>()
                .map_err(|_| invalid())?
        };
        whole_units
            .checked_add(frac_units)
            .map(Amount)
            .ok_or_else(invalid)
    }
}

impl TryFrom<f64> for Amount {
    type Error = GameError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Amount::from_f64(value)
    }
}

impl From<Amount> for f64 {
    fn from(amount: Amount) -> Self {
        amount.as_f64()
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Amount::saturating_add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
