/// Batch jobs
///
/// Contains the jobs run by the binary:
/// - Rate synchronization from the rate source into the replicated store

pub mod rate_sync_job;

pub use rate_sync_job::{RateSyncJob, StepTimings, SyncCycleError, SyncReport, SyncStep};
