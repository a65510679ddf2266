//! PostgreSQL adapters for the Orderline order engine.
//!
//! Provides production implementations of the engine's persistence seams:
//!
//! - [`PostgresStockLedger`]: row-locked, all-or-nothing stock reservation.
//! - [`PostgresOrderStore`]: order records with conditional status updates.
//! - [`PostgresStatsAggregator`]: the aggregate ledger with an idempotency
//!   journal keyed on `(order_id, event)`.
//!
//! All adapters share one schema; apply it with [`migrate`] before use.

use std::num::NonZeroU32;
use std::time::Duration;

use nutype::nutype;
use orderline::{Money, Quantity, StoreError};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use thiserror::Error;

mod stats;
mod stock;
mod store;

pub use stats::PostgresStatsAggregator;
pub use stock::PostgresStockLedger;
pub use store::PostgresOrderStore;

/// Errors from establishing or migrating the database.
#[derive(Debug, Error)]
pub enum PostgresError {
    /// The connection pool could not be created.
    #[error("failed to create postgres connection pool")]
    ConnectionFailed(#[source] sqlx::Error),

    /// Schema migrations failed to apply.
    #[error("failed to run postgres migrations")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),
}

/// Maximum number of database connections in the pool.
///
/// Must be at least 1, enforced by the `NonZeroU32` underlying type.
#[nutype(derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRef, Into))]
pub struct MaxConnections(NonZeroU32);

/// Connection pool configuration shared by all adapters.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Maximum number of connections in the pool (default: 10)
    pub max_connections: MaxConnections,
    /// Timeout for acquiring a connection from the pool (default: 30 seconds)
    pub acquire_timeout: Duration,
    /// Idle timeout for connections in the pool (default: 10 minutes)
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        const DEFAULT_MAX_CONNECTIONS: NonZeroU32 = match NonZeroU32::new(10) {
            Some(v) => v,
            None => unreachable!(),
        };

        Self {
            max_connections: MaxConnections::new(DEFAULT_MAX_CONNECTIONS),
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Create a connection pool with the default configuration.
pub async fn connect<S: Into<String>>(connection_string: S) -> Result<Pool<Postgres>, PostgresError> {
    connect_with_config(connection_string, &PostgresConfig::default()).await
}

/// Create a connection pool with a custom configuration.
pub async fn connect_with_config<S: Into<String>>(
    connection_string: S,
    config: &PostgresConfig,
) -> Result<Pool<Postgres>, PostgresError> {
    let connection_string = connection_string.into();
    let max_connections: NonZeroU32 = config.max_connections.into();
    PgPoolOptions::new()
        .max_connections(max_connections.get())
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(&connection_string)
        .await
        .map_err(PostgresError::ConnectionFailed)
}

/// Apply the Orderline schema migrations to the pool's database.
pub async fn migrate(pool: &Pool<Postgres>) -> Result<(), PostgresError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(PostgresError::MigrationFailed)
}

pub(crate) fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            StoreError::ConnectionFailed(error.to_string())
        }
        _ => StoreError::Internal(error.to_string()),
    }
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_error) = error {
        return db_error.code().as_deref() == Some("23505");
    }
    false
}

pub(crate) fn money_from(value: Decimal) -> Result<Money, StoreError> {
    Money::new(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub(crate) fn quantity_from(value: i64) -> Result<Quantity, StoreError> {
    let value = u32::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("stock level {value} out of range")))?;
    Quantity::for_inventory(value).map_err(|e| StoreError::Serialization(e.to_string()))
}
