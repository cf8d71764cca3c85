/// Database module for the libSQL (Turso) rate store
///
/// This module provides:
/// - Connection bootstrap for an embedded replica or a plain local database
/// - Repository pattern implementation of the rate store
/// - Database models and schema

pub mod connection;
pub mod models;
pub mod repositories;
pub mod schema;

pub use connection::{
    establish_connection, DatabaseError, ReplicaConfig, StoreConfig, StoreConnection, StoreMode,
};
pub use repositories::{LibsqlRateRepository, RateRepository};
