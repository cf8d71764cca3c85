/// Repository implementations
///
/// - `RateRepository` is the contract the sync job depends on
/// - `LibsqlRateRepository` backs it with a libSQL embedded replica or a local database

pub mod rate_repository;

pub use rate_repository::{LibsqlRateRepository, RateRepository, SqlRow};
