//! Arbitrary-precision token amounts.
//!
//! `Currency` counts in token-precision units (10^-9 of a token). Amounts on
//! this chain only ever shrink by explicit subtraction; there is no negative
//! value, so the backing integer is unsigned and subtraction is checked.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{CodecError, Decoder, Encoder};
use crate::config::TOKEN_PRECISION;

/// An unsigned, arbitrary-precision amount of token-precision units.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Currency(BigUint);

impl Currency {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn from_units(units: u128) -> Self {
        Self(BigUint::from(units))
    }

    pub fn from_big(big: BigUint) -> Self {
        Self(big)
    }

    pub fn big(&self) -> &BigUint {
        &self.0
    }

    pub fn into_big(self) -> BigUint {
        self.0
    }

    /// Whole tokens, for tests and display helpers.
    pub fn from_tokens(tokens: u64) -> Self {
        Self(BigUint::from(tokens) * BigUint::from(10u64).pow(TOKEN_PRECISION))
    }

    /// Parses a decimal token string (`"35000.853"`) into units, at most
    /// [`TOKEN_PRECISION`] fractional digits.
    pub fn from_token_str(s: &str) -> Result<Self, CodecError> {
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if frac.len() > TOKEN_PRECISION as usize {
            return Err(CodecError::InvalidLength);
        }
        if whole.is_empty() && frac.is_empty() {
            return Err(CodecError::InvalidLength);
        }
        let mut digits = String::with_capacity(whole.len() + TOKEN_PRECISION as usize);
        digits.push_str(if whole.is_empty() { "0" } else { whole });
        digits.push_str(frac);
        for _ in frac.len()..TOKEN_PRECISION as usize {
            digits.push('0');
        }
        let big = BigUint::parse_bytes(digits.as_bytes(), 10).ok_or(CodecError::InvalidHex)?;
        Ok(Self(big))
    }

    /// Renders as a decimal token string, trailing fractional zeros trimmed.
    pub fn to_token_str(&self) -> String {
        let units = self.0.to_str_radix(10);
        let precision = TOKEN_PRECISION as usize;
        let (whole, frac) = if units.len() > precision {
            let split = units.len() - precision;
            (units[..split].to_string(), units[split..].to_string())
        } else {
            ("0".to_string(), format!("{:0>width$}", units, width = precision))
        };
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            whole
        } else {
            format!("{whole}.{frac}")
        }
    }

    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        if self.0 >= other.0 {
            Some(Self(&self.0 - &other.0))
        } else {
            None
        }
    }

    /// Subtraction that treats underflow as a programming error upstream:
    /// callers are expected to have compared first.
    pub fn saturating_sub(&self, other: &Self) -> Self {
        self.checked_sub(other).unwrap_or_else(Self::zero)
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_big_uint(&self.0);
    }

    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        Ok(Self(dec.take_big_uint()?))
    }
}

impl Add for Currency {
    type Output = Currency;

    fn add(self, rhs: Currency) -> Currency {
        Currency(self.0 + rhs.0)
    }
}

impl Add<&Currency> for Currency {
    type Output = Currency;

    fn add(self, rhs: &Currency) -> Currency {
        Currency(self.0 + &rhs.0)
    }
}

impl AddAssign<&Currency> for Currency {
    fn add_assign(&mut self, rhs: &Currency) {
        self.0 += &rhs.0;
    }
}

impl Sum for Currency {
    fn sum<I: Iterator<Item = Currency>>(iter: I) -> Currency {
        iter.fold(Currency::zero(), |acc, c| acc + c)
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.0)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Currency {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let big = BigUint::parse_bytes(s.as_bytes(), 10).ok_or(CodecError::InvalidHex)?;
        Ok(Self(big))
    }
}

impl From<u64> for Currency {
    fn from(v: u64) -> Self {
        Self(BigUint::from(v))
    }
}

// JSON carries amounts as base-10 unit strings so precision never leaks
// through a float.
impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_str_radix(10))
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
