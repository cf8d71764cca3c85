use crate::database::models::{ReplicaSync, UpsertSummary};
use crate::database::{DatabaseError, RateRepository};
use crate::datasource::{RateSource, SourceError};
use crate::models::{CurrencyCode, CurrencyRates, RateSnapshot};
use crate::utils::precision::normalize_rate;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Default upper bound for a single step
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(120);

/// Steps of one synchronization cycle, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncStep {
    Fetch,
    Upsert,
    Sync,
    Verify,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStep::Fetch => "fetch",
            SyncStep::Upsert => "upsert",
            SyncStep::Sync => "replica sync",
            SyncStep::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Errors that abort a synchronization cycle
///
/// Sync and verify failures do not abort; they are recorded in `SyncReport`.
#[derive(Debug, Error)]
pub enum SyncCycleError {
    #[error("Fetching rates failed: {0}")]
    Fetch(#[source] SourceError),

    #[error("Upserting rates failed: {0}")]
    Upsert(#[source] DatabaseError),

    #[error("Cycle cancelled during {step} step")]
    Cancelled { step: SyncStep },

    #[error("{step} step timed out after {}s", .timeout.as_secs_f64())]
    TimedOut { step: SyncStep, timeout: Duration },
}

impl SyncCycleError {
    /// Step the cycle stopped at
    pub fn step(&self) -> SyncStep {
        match self {
            SyncCycleError::Fetch(_) => SyncStep::Fetch,
            SyncCycleError::Upsert(_) => SyncStep::Upsert,
            SyncCycleError::Cancelled { step } | SyncCycleError::TimedOut { step, .. } => *step,
        }
    }

    /// Returns true if the cycle was stopped from outside rather than failing
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            SyncCycleError::Cancelled { .. } | SyncCycleError::TimedOut { .. }
        )
    }
}

/// Wall-clock duration of each step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepTimings {
    pub fetch: Duration,
    pub upsert: Duration,
    pub sync: Duration,
    pub verify: Duration,
}

/// Outcome of a cycle that got past the upsert step
#[derive(Debug)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,

    /// Base currency and collection time of the fetched snapshot
    pub base: CurrencyCode,
    pub collected_at: DateTime<Utc>,
    pub fetched: usize,

    pub upsert: UpsertSummary,

    /// Set when the replica sync succeeded
    pub replica: Option<ReplicaSync>,
    /// Set when the replica sync failed; local data is written but not propagated
    pub sync_error: Option<DatabaseError>,

    /// Rates read back after the sync
    pub stored: Option<CurrencyRates>,
    /// Set when the read-back failed
    pub verify_error: Option<DatabaseError>,
    /// Fetched codes whose stored rate differs from the fetched one
    pub mismatched: Vec<CurrencyCode>,

    pub timings: StepTimings,
}

impl SyncReport {
    /// Returns true if the data was written but not fully propagated or verified
    pub fn is_degraded(&self) -> bool {
        self.sync_error.is_some() || self.verify_error.is_some()
    }

    pub fn degraded_steps(&self) -> Vec<SyncStep> {
        let mut steps = Vec::new();
        if self.sync_error.is_some() {
            steps.push(SyncStep::Sync);
        }
        if self.verify_error.is_some() {
            steps.push(SyncStep::Verify);
        }
        steps
    }
}

/// Rate synchronization job
///
/// One cycle: fetch rates, upsert them, force a replica sync, read the store back
pub struct RateSyncJob {
    rate_source: Arc<dyn RateSource>,
    rate_repository: Arc<dyn RateRepository>,
    symbols: BTreeSet<CurrencyCode>,
    step_timeout: Duration,
}

impl RateSyncJob {
    /// Create a new rate sync job
    pub fn new(rate_source: Arc<dyn RateSource>, rate_repository: Arc<dyn RateRepository>) -> Self {
        Self {
            rate_source,
            rate_repository,
            symbols: BTreeSet::new(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    /// Restrict the fetch to these codes (empty means all)
    pub fn with_symbols(mut self, symbols: impl IntoIterator<Item = CurrencyCode>) -> Self {
        self.symbols = symbols.into_iter().collect();
        self
    }

    /// Set per-step timeout
    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    /// Run one synchronization cycle
    ///
    /// Fetch and upsert failures abort the cycle. Sync and verify failures are
    /// recorded in the report, which is then degraded. Cancelling `cancel`
    /// drops the in-flight step and stops the cycle.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<SyncReport, SyncCycleError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("rate_sync", %run_id);

        self.sync_rates(run_id, cancel).instrument(span).await
    }

    /// Run `fut` as `step`, bounded by the step timeout and the cancellation token
    async fn guarded<T>(
        &self,
        step: SyncStep,
        cancel: &CancellationToken,
        fut: impl Future<Output = T>,
    ) -> Result<(T, Duration), SyncCycleError> {
        if cancel.is_cancelled() {
            return Err(SyncCycleError::Cancelled { step });
        }

        let start = Instant::now();

        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(SyncCycleError::Cancelled { step }),

            result = tokio::time::timeout(self.step_timeout, fut) => match result {
                Ok(value) => Ok((value, start.elapsed())),
                Err(_) => Err(SyncCycleError::TimedOut {
                    step,
                    timeout: self.step_timeout,
                }),
            },
        }
    }

    async fn fetch(&self) -> Result<RateSnapshot, SourceError> {
        let snapshot = if self.symbols.is_empty() {
            self.rate_source.fetch_all().await?
        } else {
            self.rate_source.fetch_subset(&self.symbols).await?
        };

        // Never let rates against another base reach the store
        let expected = self.rate_source.base_currency();
        if &snapshot.base != expected {
            return Err(SourceError::BaseMismatch {
                expected: expected.clone(),
                actual: snapshot.base.to_string(),
            });
        }

        Ok(snapshot)
    }

    async fn sync_rates(
        &self,
        run_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, SyncCycleError> {
        let started_at = Utc::now();
        let mut timings = StepTimings::default();

        tracing::info!(
            "Starting rate synchronization from {}",
            self.rate_source.name()
        );

        // Fetch
        let (fetched, elapsed) = self.guarded(SyncStep::Fetch, cancel, self.fetch()).await?;
        let snapshot = fetched.map_err(|e| {
            tracing::error!("❌ Failed to fetch rates: {}", e);
            SyncCycleError::Fetch(e)
        })?;
        timings.fetch = elapsed;

        tracing::info!(
            "📥 Fetched {} rates against {} in {}ms (collected at {})",
            snapshot.len(),
            snapshot.base,
            elapsed.as_millis(),
            snapshot.collected_at
        );
        for (code, rate) in &snapshot.rates {
            tracing::debug!("   1 {} -> {} = {}", snapshot.base, code, rate);
        }
        let missing = snapshot.missing_codes(&self.symbols);
        if !missing.is_empty() {
            tracing::warn!("⚠️  Provider returned no rate for {:?}", missing);
        }
        if snapshot.is_empty() {
            tracing::warn!("⚠️  Snapshot is empty, nothing to upsert");
        }

        // Upsert
        let (upserted, elapsed) = self
            .guarded(
                SyncStep::Upsert,
                cancel,
                self.rate_repository.upsert_rates(&snapshot.rates),
            )
            .await?;
        let upsert = upserted.map_err(|e| {
            tracing::error!("❌ Failed to upsert rates: {}", e);
            SyncCycleError::Upsert(e)
        })?;
        timings.upsert = elapsed;

        tracing::info!(
            "Database records updated in {}ms ({} inserted, {} updated)",
            elapsed.as_millis(),
            upsert.inserted.len(),
            upsert.updated.len()
        );

        // Replica sync
        let (synced, elapsed) = self
            .guarded(SyncStep::Sync, cancel, self.rate_repository.sync_replica())
            .await?;
        timings.sync = elapsed;

        let (replica, sync_error) = match synced {
            Ok(replica) => {
                tracing::info!(
                    "Synced embedded replica in {}ms (frame {:?}, {} frames pulled)",
                    elapsed.as_millis(),
                    replica.frame_no,
                    replica.frames_synced
                );
                (Some(replica), None)
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️  Replica sync failed, local records are not yet propagated: {}",
                    e
                );
                (None, Some(e))
            }
        };

        // Verify
        let (read_back, elapsed) = self
            .guarded(SyncStep::Verify, cancel, self.rate_repository.get_rates())
            .await?;
        timings.verify = elapsed;

        let mut mismatched = Vec::new();
        let (stored, verify_error) = match read_back {
            Ok(stored) => {
                tracing::info!(
                    "--- DATABASE RECORDS ({} rows, fetched in {}ms) ---",
                    stored.len(),
                    elapsed.as_millis()
                );
                for (code, rate) in &stored {
                    tracing::info!("   {} -> {}", code, rate);
                }

                mismatched = snapshot
                    .rates
                    .iter()
                    .filter(|(code, rate)| stored.get(*code) != Some(&normalize_rate(**rate)))
                    .map(|(code, _)| code.clone())
                    .collect();
                if !mismatched.is_empty() {
                    tracing::warn!(
                        "⚠️  Stored rates differ from fetched ones for {:?}",
                        mismatched
                    );
                }

                (Some(stored), None)
            }
            Err(e) => {
                tracing::warn!("⚠️  Failed to read back rates: {}", e);
                (None, Some(e))
            }
        };

        let report = SyncReport {
            run_id,
            started_at,
            base: snapshot.base,
            collected_at: snapshot.collected_at,
            fetched: snapshot.rates.len(),
            upsert,
            replica,
            sync_error,
            stored,
            verify_error,
            mismatched,
            timings,
        };

        if report.is_degraded() {
            tracing::warn!(
                "Rate synchronization finished degraded (failed steps: {:?})",
                report.degraded_steps()
            );
        } else {
            tracing::info!("✅ Rate synchronization completed: {} rates synced", report.fetched);
        }

        Ok(report)
    }
}
