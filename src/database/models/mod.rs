pub mod rate;

pub use rate::{parse_sqlite_timestamp, RateRecord, ReplicaSync, UpsertSummary};
