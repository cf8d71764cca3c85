use libsql::{Builder, Connection, Database};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;

use super::schema::ensure_schema;

/// Embedded replica (Turso) configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Primary database URL (e.g. "libsql://currency-rates-acme.turso.io")
    pub url: String,

    /// Auth token for the primary
    pub auth_token: String,

    /// File name of the local replica, `.db` is appended
    #[serde(default = "default_db_name")]
    pub db_name: String,

    /// Interval of the background sync with the primary
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Create the rates table when it is missing
    #[serde(default = "default_true")]
    pub ensure_schema: bool,
}

impl ReplicaConfig {
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: auth_token.into(),
            db_name: default_db_name(),
            sync_interval_secs: default_sync_interval(),
            ensure_schema: true,
        }
    }
}

// Keeps the auth token out of logs
impl std::fmt::Debug for ReplicaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaConfig")
            .field("url", &self.url)
            .field("auth_token", &"<redacted>")
            .field("db_name", &self.db_name)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .field("ensure_schema", &self.ensure_schema)
            .finish()
    }
}

fn default_db_name() -> String {
    "currency-rates".to_string()
}

fn default_sync_interval() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Which backing store to open
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Local cache synchronized with a remote primary
    Replica(ReplicaConfig),

    /// Plain local database, file path or ":memory:"
    Local { path: String },
}

/// Kind of store behind a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Replica,
    Local,
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Local storage error: {0}")]
    LocalStorageError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Error whilst querying '{table}' ({context}): {reason}")]
    QueryError {
        table: String,
        context: String,
        reason: String,
    },

    #[error("Error whilst executing {operation} on '{table}' for code {code}: {reason} (transaction rolled back, no records applied)")]
    WriteError {
        table: String,
        operation: &'static str,
        code: String,
        reason: String,
    },

    #[error("Transaction on '{table}' failed during {stage}: {reason} (no records applied)")]
    TransactionError {
        table: String,
        stage: &'static str,
        reason: String,
    },

    #[error("Invalid rate for {code}: {rate} is not positive")]
    InvalidRate { code: String, rate: String },

    #[error("Invalid value read from '{table}': {reason}")]
    DecodeError { table: String, reason: String },

    #[error("Replica sync error: {0}")]
    SyncError(String),

    #[error("Error whilst {step}: {reason}")]
    CloseError { step: &'static str, reason: String },

    #[error("Database is closed")]
    Closed,
}

impl DatabaseError {
    /// Returns true if nothing was written by the failed operation
    pub fn is_rolled_back(&self) -> bool {
        matches!(
            self,
            DatabaseError::WriteError { .. }
                | DatabaseError::TransactionError { .. }
                | DatabaseError::InvalidRate { .. }
        )
    }
}

/// Open libSQL database handle together with its single shared connection
pub struct StoreConnection {
    pub database: Database,
    pub connection: Connection,
    /// Temporary directory holding the replica file, removed on close
    pub local_directory: Option<TempDir>,
    pub mode: StoreMode,
}

/// Open the store described by `config`
pub async fn establish_connection(config: &StoreConfig) -> Result<StoreConnection, DatabaseError> {
    match config {
        StoreConfig::Replica(replica) => establish_replica(replica).await,
        StoreConfig::Local { path } => establish_local(path).await,
    }
}

/// Open an embedded replica of the remote primary
///
/// The replica lives in a fresh temporary directory so every run starts from
/// the primary's state. An initial sync is performed before returning.
pub async fn establish_replica(config: &ReplicaConfig) -> Result<StoreConnection, DatabaseError> {
    tracing::info!("Establishing embedded replica of {}...", config.url);

    let local_directory = tempfile::Builder::new()
        .prefix("libsql-")
        .tempdir()
        .map_err(|e| {
            DatabaseError::LocalStorageError(format!("failed to create temporary directory: {}", e))
        })?;
    let replica_path: PathBuf = local_directory.path().join(format!("{}.db", config.db_name));

    let database = Builder::new_remote_replica(
        replica_path,
        config.url.clone(),
        config.auth_token.clone(),
    )
    .sync_interval(Duration::from_secs(config.sync_interval_secs))
    .build()
    .await
    .map_err(|e| DatabaseError::ConnectionFailed(format!("embedded replica: {}", e)))?;

    let replicated = database
        .sync()
        .await
        .map_err(|e| DatabaseError::SyncError(format!("initial sync: {}", e)))?;

    tracing::info!(
        "Embedded replica ready at {} (frame {:?}, {} frames synced)",
        local_directory.path().display(),
        replicated.frame_no(),
        replicated.frames_synced()
    );

    let connection = database
        .connect()
        .map_err(|e| DatabaseError::ConnectionFailed(format!("embedded replica: {}", e)))?;

    if config.ensure_schema {
        ensure_schema(&connection).await?;
    }

    Ok(StoreConnection {
        database,
        connection,
        local_directory: Some(local_directory),
        mode: StoreMode::Replica,
    })
}

/// Open a plain local database (no remote primary)
pub async fn establish_local(path: &str) -> Result<StoreConnection, DatabaseError> {
    tracing::info!("Opening local database at {}", path);

    let database = Builder::new_local(path)
        .build()
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(format!("local database {}: {}", path, e)))?;

    let connection = database
        .connect()
        .map_err(|e| DatabaseError::ConnectionFailed(format!("local database {}: {}", path, e)))?;

    ensure_schema(&connection).await?;

    Ok(StoreConnection {
        database,
        connection,
        local_directory: None,
        mode: StoreMode::Local,
    })
}
