// Schema for the currency rates table.
// Applied with CREATE ... IF NOT EXISTS so it is safe on every start.

use libsql::Connection;

use super::connection::DatabaseError;

/// Table holding one row per currency code
pub const CURRENCY_RATES_TABLE: &str = "currency_rates";

pub const CREATE_CURRENCY_RATES: &str = "CREATE TABLE IF NOT EXISTS currency_rates (
    code TEXT NOT NULL PRIMARY KEY,
    to_euro_rate NUMERIC NOT NULL,
    last_update_date TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

/// Create the currency rates table if it does not exist yet
pub async fn ensure_schema(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(CREATE_CURRENCY_RATES, ())
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{}: {}", CURRENCY_RATES_TABLE, e)))?;

    tracing::debug!("Schema ensured for table '{}'", CURRENCY_RATES_TABLE);

    Ok(())
}
