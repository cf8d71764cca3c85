// Library Crate Root
// lib.rs

// main.rs imports through lib.rs like an external crate, and so do the
// integration tests under tests/
pub mod config;
pub mod database;
pub mod datasource;
pub mod jobs;
pub mod models;
pub mod utils;

// pub use = re-export at crate root
pub use config::{AppConfig, ConfigError};
pub use database::{DatabaseError, LibsqlRateRepository, RateRepository, StoreConfig, StoreMode};
pub use datasource::{FixerClient, FixerConfig, RateSource, SourceError};
pub use jobs::{RateSyncJob, SyncCycleError, SyncReport, SyncStep};
pub use models::{CurrencyCode, CurrencyRates, RateSnapshot};
