use currency_rates_sync::{
    AppConfig, FixerClient, LibsqlRateRepository, RateRepository, RateSyncJob, StoreConfig,
    SyncCycleError,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code when the rates were stored but replica sync or read-back failed
const EXIT_DEGRADED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file (if present)
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "currency_rates_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            tracing::error!("❌ Failed to load .env file: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Build the HTTP client first so a bad source config never opens a replica
    let rate_source = match FixerClient::new(config.fixer.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("❌ Failed to create Fixer.io client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match &config.store {
        StoreConfig::Replica(replica) => tracing::info!(
            "🗄️  Opening embedded replica '{}' of {} (sync every {}s)",
            replica.db_name,
            replica.url,
            replica.sync_interval_secs
        ),
        StoreConfig::Local { path } => {
            tracing::info!("🗄️  Opening local database at {}", path)
        }
    }

    let repository = match LibsqlRateRepository::open(&config.store).await {
        Ok(repository) => Arc::new(repository),
        Err(e) => {
            tracing::error!("❌ Failed to open rate store: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("✅ Rate store ready ({:?} mode)", repository.mode());

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("🛑 Interrupt received, cancelling rate synchronization");
                cancel.cancel();
            }
        }
    });

    let job = RateSyncJob::new(rate_source, repository.clone())
        .with_symbols(config.symbols.iter().cloned())
        .with_step_timeout(config.step_timeout);

    let outcome = job.run_once(&cancel).await;
    ctrl_c.abort();

    let mut exit_code = match &outcome {
        Ok(report) if report.is_degraded() => {
            for step in report.degraded_steps() {
                tracing::warn!("⚠️  {} step failed", step);
            }
            ExitCode::from(EXIT_DEGRADED)
        }
        Ok(report) => {
            tracing::info!(
                "Run {} finished: {} inserted, {} updated in {}ms",
                report.run_id,
                report.upsert.inserted.len(),
                report.upsert.updated.len(),
                (report.timings.fetch
                    + report.timings.upsert
                    + report.timings.sync
                    + report.timings.verify)
                    .as_millis()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_failure(e);
            ExitCode::FAILURE
        }
    };

    // The store is closed on every path so the replica directory is removed
    if let Err(e) = repository.close().await {
        tracing::error!("❌ Failed to close rate store: {}", e);
        exit_code = ExitCode::FAILURE;
    }

    exit_code
}

fn report_failure(e: &SyncCycleError) {
    if e.is_cancellation() {
        tracing::warn!("🛑 Rate synchronization stopped during {} step: {}", e.step(), e);
    } else {
        tracing::error!("❌ Rate synchronization failed at {} step: {}", e.step(), e);
    }
}
