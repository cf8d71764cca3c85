use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::CurrencyCode;

/// Rate record - one row of the currency rates table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    /// Currency code, unique key
    pub code: CurrencyCode,

    /// Units of `code` per one unit of the base currency, at the stored precision
    pub rate_to_base: Decimal,

    /// Server-assigned timestamp of the last insert or update
    pub last_update: DateTime<Utc>,
}

/// Format of SQLite's CURRENT_TIMESTAMP
pub const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a CURRENT_TIMESTAMP value (always UTC)
pub fn parse_sqlite_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, SQLITE_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Outcome of one batch upsert
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    /// Codes that had no record before
    pub inserted: Vec<CurrencyCode>,

    /// Codes whose existing record was updated
    pub updated: Vec<CurrencyCode>,
}

impl UpsertSummary {
    pub fn total(&self) -> usize {
        self.inserted.len() + self.updated.len()
    }
}

/// Outcome of a forced replica sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSync {
    /// Replication frame the replica reached, `None` when nothing was replicated
    pub frame_no: Option<u64>,

    /// Frames pulled from the primary by this sync
    pub frames_synced: usize,
}
