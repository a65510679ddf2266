//! Row-locked stock ledger over the `products` table.

use async_trait::async_trait;
use orderline::{ProductId, Quantity, StockError, StockLedger, StockRequest, StockResult};
use sqlx::{query, Pool, Postgres, Row};
use tracing::{info, instrument, warn};

use crate::{connect, connect_with_config, map_sqlx_error, quantity_from, PostgresConfig, PostgresError};

/// Stock ledger backed by PostgreSQL.
///
/// `reserve` locks every requested product row with `SELECT ... FOR UPDATE`
/// inside one transaction, validates all of them, and only then decrements.
/// Rows are locked in product-id order so concurrent multi-item
/// reservations cannot deadlock.
#[derive(Debug, Clone)]
pub struct PostgresStockLedger {
    pool: Pool<Postgres>,
}

impl PostgresStockLedger {
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

    /// Create or replace a product's catalog entry and stock level.
    pub async fn upsert_product(
        &self,
        product_id: &ProductId,
        name: &str,
        stock: Quantity,
    ) -> StockResult<()> {
        query(
            "INSERT INTO products (id, name, stock) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, stock = EXCLUDED.stock",
        )
        .bind(product_id.as_ref())
        .bind(name)
        .bind(i64::from(stock.value()))
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }
}

fn db(error: sqlx::Error) -> StockError {
    StockError::Store(map_sqlx_error(error))
}

#[async_trait]
impl StockLedger for PostgresStockLedger {
    #[instrument(name = "postgres.reserve", skip(self, requests), fields(request_count = requests.len()))]
    async fn reserve(&self, requests: &[StockRequest]) -> StockResult<()> {
        // Coalesce duplicate lines for one product into a single decrement,
        // then lock rows in product-id order so concurrent multi-item
        // reservations cannot deadlock.
        let mut ordered: Vec<(&StockRequest, i64)> = Vec::new();
        for request in requests {
            match ordered
                .iter_mut()
                .find(|(seen, _)| seen.product_id == request.product_id)
            {
                Some((_, total)) => *total += i64::from(request.qty.value()),
                None => ordered.push((request, i64::from(request.qty.value()))),
            }
        }
        ordered.sort_by(|a, b| a.0.product_id.as_ref().cmp(b.0.product_id.as_ref()));

        let mut tx = self.pool.begin().await.map_err(db)?;

        for (request, total) in &ordered {
            let row = query("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
                .bind(request.product_id.as_ref())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db)?;
            let Some(row) = row else {
                return Err(StockError::ProductNotFound(request.product_id.clone()));
            };
            let stock: i64 = row.try_get("stock").map_err(db)?;
            if stock < *total {
                info!(
                    product_id = %request.product_id,
                    requested = total,
                    available = stock,
                    "[postgres.reserve] stock shortfall, rolling back"
                );
                return Err(StockError::Insufficient {
                    product_id: request.product_id.clone(),
                    requested: request.qty,
                    available: quantity_from(stock)?,
                });
            }
        }

        for (request, total) in &ordered {
            query("UPDATE products SET stock = stock - $2 WHERE id = $1")
                .bind(request.product_id.as_ref())
                .bind(*total)
                .execute(&mut *tx)
                .await
                .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        Ok(())
    }

    #[instrument(name = "postgres.release", skip(self, requests), fields(request_count = requests.len()))]
    async fn release(&self, requests: &[StockRequest]) -> StockResult<()> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        for request in requests {
            let result = query("UPDATE products SET stock = stock + $2 WHERE id = $1")
                .bind(request.product_id.as_ref())
                .bind(i64::from(request.qty.value()))
                .execute(&mut *tx)
                .await
                .map_err(db)?;
            if result.rows_affected() == 0 {
                // Product was delisted after the order reserved it; the
                // release has nowhere to go.
                warn!(
                    product_id = %request.product_id,
                    qty = %request.qty,
                    "[postgres.release] product no longer in catalog, skipping restock"
                );
            }
        }

        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn available(&self, product_id: &ProductId) -> StockResult<Option<Quantity>> {
        let row = query("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_ref())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        match row {
            Some(row) => {
                let stock: i64 = row.try_get("stock").map_err(db)?;
                Ok(Some(quantity_from(stock)?))
            }
            None => Ok(None),
        }
    }
}
