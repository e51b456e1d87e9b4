use std::{fmt::Display, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

const MINOR_UNITS: i64 = 100;

//--------------------------------------       Amount        ---------------------------------------------------------
/// A monetary amount, held as a signed number of minor units (cents).
///
/// On the wire amounts are decimal strings with at most two fractional digits (`"100.00"`, `"7.5"`, `"-12"`). In the
/// database they are stored as plain integers.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[sqlx(transparent)]
pub struct Amount(i64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented as an amount: {0}")]
pub struct AmountConversionError(String);

impl Amount {
    pub fn from_minor_units(value: i64) -> Self {
        Self(value)
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Arithmetic on amounts never wraps. An overflow is reported as an error.
    pub fn checked_add(self, rhs: Self) -> Result<Self, AmountConversionError> {
        self.0.checked_add(rhs.0).map(Self).ok_or_else(|| AmountConversionError(format!("{self} + {rhs}")))
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, AmountConversionError> {
        self.0.checked_sub(rhs.0).map(Self).ok_or_else(|| AmountConversionError(format!("{self} - {rhs}")))
    }

    /// Totals `amounts`, failing instead of wrapping.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Result<Self, AmountConversionError> {
        amounts.into_iter().try_fold(Self::default(), Self::checked_add)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for Amount {
    type Err = AmountConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AmountConversionError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) if !f.is_empty() => (w, f),
            Some(_) => return Err(err()),
            None => (digits, ""),
        };
        let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || fraction.len() > 2 || !all_digits(fraction) {
            return Err(err());
        }
        let whole = whole.parse::<i64>().map_err(|_| err())?;
        let fraction = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| err())? * 10,
            _ => fraction.parse::<i64>().map_err(|_| err())?,
        };
        let units = whole.checked_mul(MINOR_UNITS).and_then(|w| w.checked_add(fraction)).ok_or_else(err)?;
        Ok(Self(if negative { -units } else { units }))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let minor = MINOR_UNITS.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / minor, abs % minor)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
