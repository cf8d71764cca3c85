use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::currency::{CurrencyCode, CurrencyRates};

/// Result of one fetch from a rate source
///
/// Transient: created per call, consumed by the sync job and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Base currency every rate is expressed against
    pub base: CurrencyCode,

    /// When the provider collected the rates
    pub collected_at: DateTime<Utc>,

    /// Business date reported by the provider, if any
    pub date: Option<NaiveDate>,

    /// Units of each currency per one unit of `base`
    pub rates: CurrencyRates,
}

impl RateSnapshot {
    pub fn new(base: CurrencyCode, collected_at: DateTime<Utc>, rates: CurrencyRates) -> Self {
        Self {
            base,
            collected_at,
            date: None,
            rates,
        }
    }

    /// Set business date
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Requested codes the provider did not return
    pub fn missing_codes<'a>(
        &self,
        requested: &'a BTreeSet<CurrencyCode>,
    ) -> Vec<&'a CurrencyCode> {
        requested
            .iter()
            .filter(|code| !self.rates.contains_key(*code))
            .collect()
    }
}
