use crate::database::connection::{
    establish_connection, establish_local, establish_replica, DatabaseError, ReplicaConfig,
    StoreConfig, StoreConnection, StoreMode,
};
use crate::database::models::{parse_sqlite_timestamp, RateRecord, ReplicaSync, UpsertSummary};
use crate::database::schema::CURRENCY_RATES_TABLE;
use crate::models::{CurrencyCode, CurrencyRates};
use crate::utils::precision::{self, format_rate, normalize_rate, sql_rate_column};
use crate::utils::validation::is_valid_rate;
use libsql::params::Params;
use libsql::{Connection, Database, Value};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tempfile::TempDir;

/// One result row of a generic query, positional values
pub type SqlRow = Vec<Value>;

/// Rate repository trait - defines interface for the currency rates store
///
/// Generic query/execute access plus the domain operations used by the sync job
#[async_trait::async_trait]
pub trait RateRepository: Send + Sync {
    /// Run a statement returning rows
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<SqlRow>, DatabaseError>;

    /// Run a statement, returning the number of affected rows
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, DatabaseError>;

    /// Get every stored rate, read through the local cache
    async fn get_rates(&self) -> Result<CurrencyRates, DatabaseError>;

    /// Get every stored record including its last update timestamp
    async fn get_records(&self) -> Result<Vec<RateRecord>, DatabaseError>;

    /// Insert absent codes and update present ones in a single transaction
    async fn upsert_rates(&self, rates: &CurrencyRates) -> Result<UpsertSummary, DatabaseError>;

    /// Push local writes to the primary and pull its state
    async fn sync_replica(&self) -> Result<ReplicaSync, DatabaseError>;

    /// Release the connection and local files; closing twice is a no-op
    async fn close(&self) -> Result<(), DatabaseError>;
}

// Compile-time check that the libSQL store satisfies the contract
const _: fn() = || {
    fn assert_repository<T: RateRepository + 'static>() {}
    assert_repository::<LibsqlRateRepository>();
};

/// Resources released by `close`
struct OpenStore {
    database: Arc<Database>,
    connection: Connection,
    local_directory: Option<TempDir>,
}

/// libSQL implementation of RateRepository
///
/// Backed either by an embedded replica of a Turso primary or by a plain
/// local database. The single connection is cloned per operation.
pub struct LibsqlRateRepository {
    table: &'static str,
    mode: StoreMode,
    store: Mutex<Option<OpenStore>>,
}

impl LibsqlRateRepository {
    /// Wrap an established connection
    pub fn new(store: StoreConnection) -> Self {
        Self {
            table: CURRENCY_RATES_TABLE,
            mode: store.mode,
            store: Mutex::new(Some(OpenStore {
                database: Arc::new(store.database),
                connection: store.connection,
                local_directory: store.local_directory,
            })),
        }
    }

    pub async fn open(config: &StoreConfig) -> Result<Self, DatabaseError> {
        Ok(Self::new(establish_connection(config).await?))
    }

    pub async fn open_replica(config: &ReplicaConfig) -> Result<Self, DatabaseError> {
        Ok(Self::new(establish_replica(config).await?))
    }

    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        Ok(Self::new(establish_local(path).await?))
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.store.lock().is_none()
    }

    fn connection(&self) -> Result<Connection, DatabaseError> {
        self.store
            .lock()
            .as_ref()
            .map(|store| store.connection.clone())
            .ok_or(DatabaseError::Closed)
    }

    fn database(&self) -> Result<Arc<Database>, DatabaseError> {
        self.store
            .lock()
            .as_ref()
            .map(|store| Arc::clone(&store.database))
            .ok_or(DatabaseError::Closed)
    }

    fn query_error(&self, context: impl Into<String>, err: libsql::Error) -> DatabaseError {
        DatabaseError::QueryError {
            table: self.table.to_string(),
            context: context.into(),
            reason: err.to_string(),
        }
    }

    fn decode_error(&self, reason: impl Into<String>) -> DatabaseError {
        DatabaseError::DecodeError {
            table: self.table.to_string(),
            reason: reason.into(),
        }
    }

    fn transaction_error(&self, stage: &'static str, err: libsql::Error) -> DatabaseError {
        DatabaseError::TransactionError {
            table: self.table.to_string(),
            stage,
            reason: err.to_string(),
        }
    }

    fn write_error(
        &self,
        operation: &'static str,
        code: &CurrencyCode,
        err: libsql::Error,
    ) -> DatabaseError {
        DatabaseError::WriteError {
            table: self.table.to_string(),
            operation,
            code: code.to_string(),
            reason: err.to_string(),
        }
    }

    fn parse_code(&self, code: &str) -> Result<CurrencyCode, DatabaseError> {
        CurrencyCode::new(code).map_err(|e| self.decode_error(e.to_string()))
    }

    fn parse_rate(&self, code: &CurrencyCode, rate: &str) -> Result<Decimal, DatabaseError> {
        precision::parse_rate(rate)
            .map_err(|e| self.decode_error(format!("rate '{}' for {}: {}", rate, code, e)))
    }

    async fn record_exists(
        &self,
        conn: &Connection,
        code: &CurrencyCode,
    ) -> Result<bool, DatabaseError> {
        let sql = format!("SELECT 1 FROM {} WHERE code = ?1", self.table);
        let context = || format!("rows with code {}", code);

        let mut rows = conn
            .query(&sql, Params::Positional(vec![Value::Text(code.to_string())]))
            .await
            .map_err(|e| self.query_error(context(), e))?;

        let row = rows
            .next()
            .await
            .map_err(|e| self.query_error(context(), e))?;

        Ok(row.is_some())
    }

    /// Apply every upsert on `conn`; the caller owns the transaction
    async fn apply_upserts(
        &self,
        conn: &Connection,
        rates: &[(&CurrencyCode, Decimal)],
    ) -> Result<UpsertSummary, DatabaseError> {
        let insert_sql = format!(
            "INSERT INTO {} (code, to_euro_rate) VALUES (?1, ?2)",
            self.table
        );
        let update_sql = format!(
            "UPDATE {} SET to_euro_rate = ?1, last_update_date = CURRENT_TIMESTAMP WHERE code = ?2",
            self.table
        );

        let mut summary = UpsertSummary::default();

        for (code, rate) in rates {
            let code_value = Value::Text(code.to_string());
            let rate_value = Value::Text(format_rate(*rate));

            if self.record_exists(conn, code).await? {
                conn.execute(&update_sql, Params::Positional(vec![rate_value, code_value]))
                    .await
                    .map_err(|e| self.write_error("UPDATE", code, e))?;
                summary.updated.push((*code).clone());
            } else {
                conn.execute(&insert_sql, Params::Positional(vec![code_value, rate_value]))
                    .await
                    .map_err(|e| self.write_error("INSERT", code, e))?;
                summary.inserted.push((*code).clone());
            }
        }

        Ok(summary)
    }
}

#[async_trait::async_trait]
impl RateRepository for LibsqlRateRepository {
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<SqlRow>, DatabaseError> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(sql, Params::Positional(params))
            .await
            .map_err(|e| self.query_error(sql, e))?;
        let column_count = rows.column_count();

        let mut result = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| self.query_error(sql, e))? {
            let values = (0..column_count)
                .map(|idx| row.get_value(idx))
                .collect::<Result<SqlRow, _>>()
                .map_err(|e| self.query_error(sql, e))?;
            result.push(values);
        }

        Ok(result)
    }

    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, DatabaseError> {
        let conn = self.connection()?;

        conn.execute(sql, Params::Positional(params))
            .await
            .map_err(|e| self.query_error(sql, e))
    }

    async fn get_rates(&self) -> Result<CurrencyRates, DatabaseError> {
        let records = self.get_records().await?;

        Ok(records
            .into_iter()
            .map(|record| (record.code, record.rate_to_base))
            .collect())
    }

    async fn get_records(&self) -> Result<Vec<RateRecord>, DatabaseError> {
        let conn = self.connection()?;
        let sql = format!(
            "SELECT code, {}, last_update_date FROM {} ORDER BY code",
            sql_rate_column("to_euro_rate"),
            self.table
        );

        let mut rows = conn
            .query(&sql, ())
            .await
            .map_err(|e| self.query_error("reading all rates", e))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| self.query_error("reading all rates", e))?
        {
            let code: String = row
                .get(0)
                .map_err(|e| self.decode_error(format!("code column: {}", e)))?;
            let rate: String = row
                .get(1)
                .map_err(|e| self.decode_error(format!("rate column: {}", e)))?;
            let last_update: String = row
                .get(2)
                .map_err(|e| self.decode_error(format!("last_update_date column: {}", e)))?;

            let code = self.parse_code(&code)?;
            let rate_to_base = self.parse_rate(&code, &rate)?;
            let last_update = parse_sqlite_timestamp(&last_update).ok_or_else(|| {
                self.decode_error(format!("last_update_date '{}' for {}", last_update, code))
            })?;

            records.push(RateRecord {
                code,
                rate_to_base,
                last_update,
            });
        }

        Ok(records)
    }

    async fn upsert_rates(&self, rates: &CurrencyRates) -> Result<UpsertSummary, DatabaseError> {
        let conn = self.connection()?;

        // Reject the whole batch before touching the table
        let mut normalized = Vec::with_capacity(rates.len());
        for (code, rate) in rates {
            let stored = normalize_rate(*rate);
            if !is_valid_rate(stored) {
                return Err(DatabaseError::InvalidRate {
                    code: code.to_string(),
                    rate: rate.to_string(),
                });
            }
            normalized.push((code, stored));
        }

        if normalized.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let tx = conn
            .transaction()
            .await
            .map_err(|e| self.transaction_error("BEGIN", e))?;

        match self.apply_upserts(&tx, &normalized).await {
            Ok(summary) => {
                tx.commit()
                    .await
                    .map_err(|e| self.transaction_error("COMMIT", e))?;

                tracing::debug!(
                    "Upserted {} rates into '{}' ({} inserted, {} updated)",
                    summary.total(),
                    self.table,
                    summary.inserted.len(),
                    summary.updated.len()
                );

                Ok(summary)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!("Rollback on '{}' failed: {}", self.table, rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn sync_replica(&self) -> Result<ReplicaSync, DatabaseError> {
        let database = self.database()?;

        if self.mode == StoreMode::Local {
            tracing::debug!("Local store has no primary, skipping replica sync");
            return Ok(ReplicaSync::default());
        }

        let replicated = database
            .sync()
            .await
            .map_err(|e| DatabaseError::SyncError(e.to_string()))?;

        Ok(ReplicaSync {
            frame_no: replicated.frame_no(),
            frames_synced: replicated.frames_synced(),
        })
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        let Some(store) = self.store.lock().take() else {
            return Ok(());
        };
        let OpenStore {
            database,
            connection,
            local_directory,
        } = store;

        let mut first_error: Option<DatabaseError> = None;

        drop(connection);

        // A handle still held by an in-flight operation is released when that finishes
        let handle_released = match Arc::try_unwrap(database) {
            Ok(database) => {
                drop(database);
                true
            }
            Err(database) => {
                tracing::warn!(
                    "Database handle still shared by {} other owner(s) at close",
                    Arc::strong_count(&database) - 1
                );
                first_error.get_or_insert(DatabaseError::CloseError {
                    step: "closing database",
                    reason: "handle still in use".to_string(),
                });
                false
            }
        };

        if let Some(directory) = local_directory {
            if handle_released {
                let path = directory.path().display().to_string();
                match directory.close() {
                    Ok(()) => tracing::debug!("Removed local replica files at {}", path),
                    Err(e) => {
                        first_error.get_or_insert(DatabaseError::CloseError {
                            step: "deleting temporary files",
                            reason: format!("{}: {}", path, e),
                        });
                    }
                }
            } else {
                // Files stay on disk while another owner can still reach them
                let path = directory.into_path();
                tracing::warn!("Keeping local replica files at {}", path.display());
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                tracing::info!("Database closed");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    fn rates(entries: &[(&str, Decimal)]) -> CurrencyRates {
        entries.iter().map(|(c, r)| (code(c), *r)).collect()
    }

    async fn memory_repository() -> LibsqlRateRepository {
        LibsqlRateRepository::open_local(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_reads_empty() {
        let repo = memory_repository().await;

        assert!(repo.get_rates().await.unwrap().is_empty());
        assert_eq!(repo.mode(), StoreMode::Local);
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let repo = memory_repository().await;

        let summary = repo
            .upsert_rates(&rates(&[("USD", dec!(1.1)), ("GBP", dec!(0.85))]))
            .await
            .unwrap();
        assert_eq!(summary.inserted, vec![code("GBP"), code("USD")]);
        assert!(summary.updated.is_empty());

        let stored = repo.get_rates().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[&code("USD")].to_string(), "1.10000");
        assert_eq!(stored[&code("GBP")].to_string(), "0.85000");

        let summary = repo
            .upsert_rates(&rates(&[("USD", dec!(1.2))]))
            .await
            .unwrap();
        assert!(summary.inserted.is_empty());
        assert_eq!(summary.updated, vec![code("USD")]);

        let stored = repo.get_rates().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[&code("USD")].to_string(), "1.20000");
        assert_eq!(stored[&code("GBP")].to_string(), "0.85000");
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let repo = memory_repository().await;
        let input = rates(&[("USD", dec!(1.08412)), ("JPY", dec!(161.9)), ("CHF", dec!(0.95))]);

        repo.upsert_rates(&input).await.unwrap();
        let first = repo.get_rates().await.unwrap();

        let summary = repo.upsert_rates(&input).await.unwrap();
        let second = repo.get_rates().await.unwrap();

        assert_eq!(summary.updated.len(), 3);
        assert_eq!(first, second);

        let count = repo
            .query("SELECT COUNT(*) FROM currency_rates", vec![])
            .await
            .unwrap();
        assert_eq!(count, vec![vec![Value::Integer(3)]]);
    }

    #[tokio::test]
    async fn test_precision_round_trip() {
        let repo = memory_repository().await;

        repo.upsert_rates(&rates(&[
            ("USD", dec!(1.234567)),
            ("JPY", dec!(161.987654)),
            ("BTC", dec!(0.0000163)),
            ("KWD", dec!(0.33)),
        ]))
        .await
        .unwrap();

        let stored = repo.get_rates().await.unwrap();
        assert_eq!(stored[&code("USD")].to_string(), "1.23457");
        assert_eq!(stored[&code("JPY")].to_string(), "161.98765");
        assert_eq!(stored[&code("BTC")].to_string(), "0.000016300");
        assert_eq!(stored[&code("KWD")].to_string(), "0.33000");

        // Writing what was read back changes nothing
        repo.upsert_rates(&stored).await.unwrap();
        assert_eq!(repo.get_rates().await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_invalid_rate_rejected_without_writes() {
        let repo = memory_repository().await;

        for invalid in [Decimal::ZERO, dec!(-0.5)] {
            let err = repo
                .upsert_rates(&rates(&[("USD", dec!(1.1)), ("XBT", invalid)]))
                .await
                .unwrap_err();

            assert!(matches!(err, DatabaseError::InvalidRate { ref code, .. } if code == "XBT"));
            assert!(err.is_rolled_back());
        }
        assert!(repo.get_rates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tiny_positive_rate_is_stored() {
        let repo = memory_repository().await;

        let summary = repo
            .upsert_rates(&rates(&[
                ("USD", dec!(1.0865)),
                ("GBP", dec!(0.87542)),
                ("BTC", dec!(0.000004)),
                ("XAU", dec!(0.0000041234567)),
            ]))
            .await
            .unwrap();
        assert_eq!(summary.inserted.len(), 4);

        let stored = repo.get_rates().await.unwrap();
        assert_eq!(stored[&code("BTC")], dec!(0.000004));
        assert_eq!(stored[&code("XAU")], dec!(0.0000041235));
        assert_eq!(stored[&code("USD")].to_string(), "1.08650");

        // Writing what was read back changes nothing
        repo.upsert_rates(&stored).await.unwrap();
        assert_eq!(repo.get_rates().await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_dropped_transaction_leaves_store_unchanged() {
        let repo = memory_repository().await;
        repo.upsert_rates(&rates(&[("GBP", dec!(0.85))])).await.unwrap();

        // Same state a cancelled upsert leaves behind: writes applied, no commit
        {
            let conn = repo.connection().unwrap();
            let tx = conn.transaction().await.unwrap();
            let (gbp, usd) = (code("GBP"), code("USD"));
            let pending = [(&gbp, dec!(0.90000)), (&usd, dec!(1.10000))];
            let summary = repo.apply_upserts(&tx, &pending).await.unwrap();
            assert_eq!(summary.total(), 2);
            drop(tx);
        }

        assert_eq!(repo.get_rates().await.unwrap(), rates(&[("GBP", dec!(0.85))]));

        // The connection is still usable for the next cycle
        let summary = repo
            .upsert_rates(&rates(&[("GBP", dec!(0.9)), ("USD", dec!(1.1))]))
            .await
            .unwrap();
        assert_eq!(summary.inserted, vec![code("USD")]);
        assert_eq!(summary.updated, vec![code("GBP")]);
        assert_eq!(repo.get_rates().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_write_failure_rolls_back_batch() {
        let repo = memory_repository().await;
        repo.upsert_rates(&rates(&[("GBP", dec!(0.85))])).await.unwrap();

        repo.execute(
            "CREATE TRIGGER reject_xxx BEFORE INSERT ON currency_rates \
             WHEN NEW.code = 'XXX' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
            vec![],
        )
        .await
        .unwrap();

        let err = repo
            .upsert_rates(&rates(&[
                ("AAA", dec!(2.5)),
                ("GBP", dec!(0.9)),
                ("XXX", dec!(1.0)),
            ]))
            .await
            .unwrap_err();

        match err {
            DatabaseError::WriteError { operation, code, .. } => {
                assert_eq!(operation, "INSERT");
                assert_eq!(code, "XXX");
            }
            other => panic!("expected WriteError, got {:?}", other),
        }

        // AAA insert and GBP update were rolled back
        let stored = repo.get_rates().await.unwrap();
        assert_eq!(stored, rates(&[("GBP", dec!(0.85000))]));
    }

    #[tokio::test]
    async fn test_records_carry_last_update() {
        let repo = memory_repository().await;
        let before = chrono::Utc::now() - chrono::Duration::seconds(5);

        repo.upsert_rates(&rates(&[("USD", dec!(1.1))])).await.unwrap();

        let records = repo.get_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, code("USD"));
        assert_eq!(records[0].rate_to_base, dec!(1.10000));
        assert!(records[0].last_update >= before);
    }

    #[tokio::test]
    async fn test_update_refreshes_last_update() {
        let repo = memory_repository().await;
        repo.upsert_rates(&rates(&[("USD", dec!(1.1))])).await.unwrap();

        repo.execute(
            "UPDATE currency_rates SET last_update_date = '2000-01-01 00:00:00'",
            vec![],
        )
        .await
        .unwrap();
        let stale = repo.get_records().await.unwrap();
        assert_eq!(stale[0].last_update.timestamp(), 946684800);

        repo.upsert_rates(&rates(&[("USD", dec!(1.1))])).await.unwrap();
        let fresh = repo.get_records().await.unwrap();
        assert!(fresh[0].last_update > stale[0].last_update);
    }

    #[tokio::test]
    async fn test_generic_query_and_execute() {
        let repo = memory_repository().await;

        let affected = repo
            .execute(
                "INSERT INTO currency_rates (code, to_euro_rate) VALUES (?1, ?2)",
                vec![Value::Text("SEK".to_string()), Value::Text("11.25".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = repo
            .query(
                "SELECT code FROM currency_rates WHERE code = ?1",
                vec![Value::Text("SEK".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Text("SEK".to_string())]]);

        let err = repo.query("SELECT * FROM missing_table", vec![]).await.unwrap_err();
        assert!(matches!(err, DatabaseError::QueryError { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_code_is_decode_error() {
        let repo = memory_repository().await;
        repo.execute(
            "INSERT INTO currency_rates (code, to_euro_rate) VALUES ('usdollar', 1.1)",
            vec![],
        )
        .await
        .unwrap();

        let err = repo.get_rates().await.unwrap_err();
        assert!(matches!(err, DatabaseError::DecodeError { .. }));
    }

    #[tokio::test]
    async fn test_local_sync_is_noop() {
        let repo = memory_repository().await;
        repo.upsert_rates(&rates(&[("USD", dec!(1.1))])).await.unwrap();

        assert_eq!(repo.sync_replica().await.unwrap(), ReplicaSync::default());
        assert_eq!(repo.get_rates().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let repo = memory_repository().await;

        repo.close().await.unwrap();
        assert!(repo.is_closed());
        repo.close().await.unwrap();

        assert!(matches!(repo.get_rates().await, Err(DatabaseError::Closed)));
        assert!(matches!(repo.sync_replica().await, Err(DatabaseError::Closed)));
        assert!(matches!(
            repo.upsert_rates(&rates(&[("USD", dec!(1.1))])).await,
            Err(DatabaseError::Closed)
        ));
        assert!(matches!(
            repo.upsert_rates(&CurrencyRates::new()).await,
            Err(DatabaseError::Closed)
        ));
        assert!(matches!(repo.query("SELECT 1", vec![]).await, Err(DatabaseError::Closed)));
    }

    #[tokio::test]
    async fn test_close_removes_local_directory() {
        let directory = tempfile::Builder::new().prefix("libsql-").tempdir().unwrap();
        let directory_path = directory.path().to_path_buf();
        let db_path = directory_path.join("currency-rates.db");

        let mut store = establish_local(db_path.to_str().unwrap()).await.unwrap();
        store.local_directory = Some(directory);
        let repo = LibsqlRateRepository::new(store);

        repo.upsert_rates(&rates(&[("USD", dec!(1.1))])).await.unwrap();
        assert!(db_path.exists());

        repo.close().await.unwrap();
        assert!(!directory_path.exists());
    }

    #[tokio::test]
    async fn test_close_keeps_directory_while_handle_shared() {
        let directory = tempfile::Builder::new().prefix("libsql-").tempdir().unwrap();
        let directory_path = directory.path().to_path_buf();
        let db_path = directory_path.join("currency-rates.db");

        let mut store = establish_local(db_path.to_str().unwrap()).await.unwrap();
        store.local_directory = Some(directory);
        let repo = LibsqlRateRepository::new(store);
        repo.upsert_rates(&rates(&[("USD", dec!(1.1))])).await.unwrap();

        let in_flight = repo.database().unwrap();
        let err = repo.close().await.unwrap_err();

        assert!(matches!(err, DatabaseError::CloseError { step: "closing database", .. }));
        assert!(repo.is_closed());
        assert!(db_path.exists());

        drop(in_flight);
        std::fs::remove_dir_all(&directory_path).unwrap();
    }
}
