use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::utils::validation::is_valid_currency_code;

/// Mapping of currency code to its rate against the base currency
///
/// Ordered so that logs and reports list codes alphabetically
pub type CurrencyRates = BTreeMap<CurrencyCode, Decimal>;

/// Rejected currency code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid currency code: '{0}' (expected three ASCII letters)")]
pub struct InvalidCurrencyCode(pub String);

/// ISO-4217-like currency code (e.g. "EUR", "USD")
///
/// Always three uppercase ASCII letters. Lowercase input is accepted and
/// upper-cased, surrounding whitespace is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse and normalize a currency code
    pub fn new(code: &str) -> Result<Self, InvalidCurrencyCode> {
        let trimmed = code.trim();
        if !is_valid_currency_code(trimmed) {
            return Err(InvalidCurrencyCode(code.to_string()));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// The euro, default base currency of the Fixer.io free tier
    pub fn eur() -> Self {
        Self("EUR".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = InvalidCurrencyCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = InvalidCurrencyCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}
