//! Amount type for handling monetary values with optional currency symbols.
//!
//! This module provides the `Amount` type which wraps `Decimal` and handles parsing values that
//! may or may not include a currency symbol and thousands separators.
//!
//! Both `1,234.56` and `1.234,56` are accepted: when both `.` and `,` appear, the last one is the
//! decimal separator. A single separator is the decimal separator (`800,00`, `12.5`) unless it is
//! followed by exactly three digits, as in `1,234` or `1.500`. Those read as a thousand or as a
//! fraction depending on the locale, so they are rejected as ambiguous.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Currency symbols recognized before or after the digits.
const SYMBOLS: [char; 3] = ['€', '$', '£'];

/// Represents how an amount was (or should be) formatted as text.
///
/// # Examples
///  - `symbol: Some('€'), trailing: false, grouped: true` -> `-€60,000.00`
///  - `symbol: Some('€'), trailing: true, grouped: false` -> `-60000.00€`
///  - `symbol: None, grouped: true, decimal_comma: true` -> `-60.000,00`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AmountFormat {
    /// The currency symbol found in the text, if any.
    symbol: Option<char>,
    /// Whether the symbol follows the digits.
    trailing: bool,
    /// Whether thousands separators are present.
    grouped: bool,
    /// Whether `,` separates the decimals and `.` the thousands.
    decimal_comma: bool,
}

/// Represents a monetary amount.
///
/// The text formatting an amount was parsed from is remembered so that it can be written back to
/// the source spreadsheet unchanged, but it is not significant for equality, ordering or hashing:
/// two amounts are equal when their numeric values are equal.
///
/// ```
/// # use expense_sheet::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("-5000.00").unwrap();
/// let b = Amount::from_str("-€5,000.00").unwrap();
/// assert_eq!(a, b);
/// assert_ne!(a.to_string(), b.to_string());
/// assert_eq!(b.to_string(), "-€5,000.00");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Amount {
    value: Decimal,
    format: AmountFormat,
}

impl Amount {
    /// Creates a new Amount from a Decimal value with plain formatting.
    pub const fn new(value: Decimal) -> Self {
        Self {
            value,
            format: AmountFormat {
                symbol: None,
                trailing: false,
                grouped: false,
                decimal_comma: false,
            },
        }
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value.is_sign_negative()
    }

    /// The value with 2 decimal places and comma grouping, without any currency symbol.
    pub fn grouped(&self) -> String {
        grouped(self.value)
    }
}

/// Formats a value with 2 decimal places and comma thousands grouping, e.g. `-1,234.50`. Halves
/// round away from zero.
pub fn grouped(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let plain = format!("{:.2}", rounded.abs());
    let (whole, cents) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut out = String::with_capacity(plain.len() + whole.len() / 3 + 1);
    for (ix, digit) in whole.chars().enumerate() {
        if ix > 0 && (whole.len() - ix) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    format!("{sign}{out}.{cents}")
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Amount {}

impl Hash for Amount {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

/// An error that can occur when parsing strings into `Amount` values.
#[derive(Debug, thiserror::Error)]
pub enum AmountError {
    #[error("the amount is blank")]
    Blank,
    #[error("'{0}' has more than one minus sign")]
    DoubleSign(String),
    #[error("'{0}' could be a thousands separator or a decimal separator")]
    Ambiguous(String),
    #[error("'{text}' is not a number: {source}")]
    Invalid {
        text: String,
        #[source]
        source: rust_decimal::Error,
    },
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Blank);
        }

        let invalid = |source| AmountError::Invalid {
            text: trimmed.to_string(),
            source,
        };

        // "-€50.00" carries the sign outside the symbol; "€-50.00" is handled by Decimal itself.
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };

        let (symbol, trailing, digits) = strip_symbol(unsigned);
        let digits = digits.trim();
        let separators = Separators::detect(digits)?;
        let canonical = separators.canonical(digits);

        if negative && canonical.starts_with('-') {
            return Err(AmountError::DoubleSign(trimmed.to_string()));
        }

        let value = Decimal::from_str(&canonical).map_err(invalid)?;
        let value = if negative { -value } else { value };
        Ok(Amount {
            value,
            format: AmountFormat {
                symbol,
                trailing,
                grouped: separators.group.is_some(),
                decimal_comma: separators.decimal == Some(','),
            },
        })
    }
}

/// The thousands and decimal separators used by one amount.
#[derive(Debug, Clone, Copy, Default)]
struct Separators {
    group: Option<char>,
    decimal: Option<char>,
}

impl Separators {
    fn detect(digits: &str) -> Result<Self, AmountError> {
        let count = |c: char| digits.matches(c).count();
        let separators = match (digits.rfind('.'), digits.rfind(',')) {
            (Some(dot), Some(comma)) if dot > comma => Self {
                group: Some(','),
                decimal: Some('.'),
            },
            (Some(_), Some(_)) => Self {
                group: Some('.'),
                decimal: Some(','),
            },
            (Some(_), None) if count('.') > 1 => Self {
                group: Some('.'),
                decimal: None,
            },
            (None, Some(_)) if count(',') > 1 => Self {
                group: Some(','),
                decimal: None,
            },
            (Some(ix), None) | (None, Some(ix)) => {
                if looks_like_a_thousand(digits, ix) {
                    return Err(AmountError::Ambiguous(digits.to_string()));
                }
                Self {
                    group: None,
                    decimal: digits[ix..].chars().next(),
                }
            }
            (None, None) => Self::default(),
        };
        Ok(separators)
    }

    /// `digits` with the thousands separators removed and `.` as the decimal separator.
    fn canonical(&self, digits: &str) -> String {
        digits
            .chars()
            .filter(|&c| Some(c) != self.group)
            .map(|c| if Some(c) == self.decimal { '.' } else { c })
            .collect()
    }
}

/// True for `1,234` and `12.500`: one to three digits that do not start with zero, the separator
/// at `ix`, then exactly three digits.
fn looks_like_a_thousand(digits: &str, ix: usize) -> bool {
    let before = digits[..ix].trim_start_matches('-');
    let after = &digits[ix + 1..];
    after.len() == 3
        && after.chars().all(|c| c.is_ascii_digit())
        && (1..=3).contains(&before.len())
        && before.chars().all(|c| c.is_ascii_digit())
        && !before.starts_with('0')
}

/// Splits a leading or trailing currency symbol off `s`.
fn strip_symbol(s: &str) -> (Option<char>, bool, &str) {
    for symbol in SYMBOLS {
        if let Some(rest) = s.strip_prefix(symbol) {
            return (Some(symbol), false, rest);
        }
        if let Some(rest) = s.strip_suffix(symbol) {
            return (Some(symbol), true, rest);
        }
    }
    (None, false, s)
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let num = if self.format.grouped {
            grouped(self.value.abs())
        } else {
            self.value.abs().to_string()
        };
        let num = if self.format.decimal_comma {
            num.chars()
                .map(|c| match c {
                    '.' => ',',
                    ',' => '.',
                    c => c,
                })
                .collect()
        } else {
            num
        };
        match (self.format.symbol, self.format.trailing) {
            (Some(symbol), false) => write!(f, "{sign}{symbol}{num}"),
            (Some(symbol), true) => write!(f, "{sign}{num}{symbol}"),
            (None, _) => write!(f, "{sign}{num}"),
        }
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.value.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
