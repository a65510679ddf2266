//! Stats aggregator over the `order_stats` singleton row.

use async_trait::async_trait;
use orderline::{Money, OrderId, StatsAggregator, StatsError, StatsEvent, StatsLedger};
use sqlx::{query, Pool, Postgres, Row};
use tracing::instrument;

use crate::{connect, connect_with_config, map_sqlx_error, money_from, PostgresConfig, PostgresError};

/// Stats aggregator backed by PostgreSQL.
///
/// Each mutation first journals its `(order_id, event)` pair into
/// `order_stats_events`; a conflicting insert means the pair was already
/// applied and the mutation is skipped. Journal and counter update commit
/// in one transaction.
#[derive(Debug, Clone)]
pub struct PostgresStatsAggregator {
    pool: Pool<Postgres>,
}

impl PostgresStatsAggregator {
    /// Connect with the default pool configuration.
    pub async fn new<S: Into<String>>(connection_string: S) -> Result<Self, PostgresError> {
        Ok(Self::from_pool(connect(connection_string).await?))
    }

    /// Connect with a custom pool configuration.
    pub async fn with_config<S: Into<String>>(
        connection_string: S,
        config: &PostgresConfig,
    ) -> Result<Self, PostgresError> {
        Ok(Self::from_pool(
            connect_with_config(connection_string, config).await?,
        ))
    }

    /// Wrap an existing connection pool.
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn apply(
        &self,
        order_id: &OrderId,
        event: StatsEvent,
        update_sql: &str,
        total: Money,
    ) -> Result<(), StatsError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let journaled = query(
            "INSERT INTO order_stats_events (order_id, event) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(order_id.as_ref())
        .bind(event.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        if journaled.rows_affected() == 0 {
            // Already applied for this order; replay is a no-op.
            return Ok(());
        }

        query(update_sql)
            .bind(total.amount())
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        tx.commit().await.map_err(db)?;
        Ok(())
    }
}

fn db(error: sqlx::Error) -> StatsError {
    StatsError::Store(map_sqlx_error(error))
}

#[async_trait]
impl StatsAggregator for PostgresStatsAggregator {
    #[instrument(name = "postgres.record_created", skip(self), fields(order_id = %order_id))]
    async fn record_created(&self, order_id: &OrderId, total: Money) -> Result<(), StatsError> {
        self.apply(
            order_id,
            StatsEvent::Created,
            "UPDATE order_stats SET total_revenue = total_revenue + $1, \
             total_orders = total_orders + 1 WHERE id = 1",
            total,
        )
        .await
    }

    #[instrument(name = "postgres.record_cancelled", skip(self), fields(order_id = %order_id))]
    async fn record_cancelled(&self, order_id: &OrderId, total: Money) -> Result<(), StatsError> {
        self.apply(
            order_id,
            StatsEvent::Cancelled,
            "UPDATE order_stats SET total_revenue = GREATEST(0, total_revenue - $1), \
             cancelled_orders = cancelled_orders + 1 WHERE id = 1",
            total,
        )
        .await
    }

    async fn snapshot(&self) -> Result<StatsLedger, StatsError> {
        let row = query(
            "SELECT total_revenue, total_orders, cancelled_orders FROM order_stats WHERE id = 1",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        let total_revenue: rust_decimal::Decimal = row.try_get("total_revenue").map_err(db)?;
        let total_orders: i64 = row.try_get("total_orders").map_err(db)?;
        let cancelled_orders: i64 = row.try_get("cancelled_orders").map_err(db)?;

        Ok(StatsLedger {
            total_revenue: money_from(total_revenue)?,
            total_orders: u64::try_from(total_orders).unwrap_or(0),
            cancelled_orders: u64::try_from(cancelled_orders).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;

    async fn test_stats() -> PostgresStatsAggregator {
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set for postgres tests");
        let pool = connect(url).await.expect("should connect to postgres");
        migrate(&pool).await.expect("migrations should apply");
        PostgresStatsAggregator::from_pool(pool)
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL instance via DATABASE_URL"]
    async fn record_created_is_idempotent() {
        let stats = test_stats().await;
        let order_id = OrderId::generate();
        let total = Money::from_cents(9_900).unwrap();

        let before = stats.snapshot().await.unwrap();
        stats.record_created(&order_id, total).await.unwrap();
        stats.record_created(&order_id, total).await.unwrap();

        let after = stats.snapshot().await.unwrap();
        assert_eq!(after.total_orders, before.total_orders + 1);
        assert_eq!(
            after.total_revenue.to_cents(),
            before.total_revenue.to_cents() + 9_900
        );
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL instance via DATABASE_URL"]
    async fn cancellation_reverses_revenue_without_going_negative() {
        let stats = test_stats().await;
        let order_id = OrderId::generate();
        let total = Money::from_cents(1_000).unwrap();

        stats.record_created(&order_id, total).await.unwrap();
        let before = stats.snapshot().await.unwrap();

        stats.record_cancelled(&order_id, total).await.unwrap();
        stats.record_cancelled(&order_id, total).await.unwrap();

        let after = stats.snapshot().await.unwrap();
        assert_eq!(after.cancelled_orders, before.cancelled_orders + 1);
        assert_eq!(
            after.total_revenue.to_cents(),
            before.total_revenue.to_cents() - 1_000
        );
    }
}
