//! Rate Source Module
//!
//! Remote providers of exchange rates against a fixed base currency:
//! - `error` - Error types for fetch operations
//! - `response` - Fixer.io response body and its conversion into a snapshot
//! - `fixer` - reqwest-based Fixer.io client

pub mod error;
pub mod fixer;
pub mod response;

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::models::{CurrencyCode, RateSnapshot};

pub use error::{SourceError, SourceResult};
pub use fixer::{FixerClient, FixerConfig};
pub use response::FixerResponse;

/// Rate source trait - one outbound request per call, no retries, no state
/// kept between calls
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Provider name used in logs
    fn name(&self) -> &str;

    /// Base currency every snapshot is expressed against
    fn base_currency(&self) -> &CurrencyCode;

    /// Fetch every rate the provider offers
    async fn fetch_all(&self) -> SourceResult<RateSnapshot>;

    /// Fetch only the given codes (an empty set means all)
    async fn fetch_subset(&self, codes: &BTreeSet<CurrencyCode>) -> SourceResult<RateSnapshot>;
}
