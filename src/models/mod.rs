pub mod currency;
pub mod snapshot;

pub use currency::{CurrencyCode, CurrencyRates, InvalidCurrencyCode};
pub use snapshot::RateSnapshot;
