//! Order store over the `orders` table.

use async_trait::async_trait;
use orderline::{
    CustomerEmail, Order, OrderAmounts, OrderId, OrderItem, OrderListing, OrderStatus, OrderStore,
    Page, PageOf, ShippingAddress, SortBy, SortOrder, StoreError, StoreResult, TrackingNumber,
    UserId,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{query, Pool, Postgres, Row};
use tracing::{instrument, warn};

use crate::{
    connect, connect_with_config, is_unique_violation, map_sqlx_error, money_from, PostgresConfig,
    PostgresError,
};

const ORDER_COLUMNS: &str = "id, user_id, email, items, shipping_address, payment_method, \
     items_price, tax_price, shipping_price, total_price, status, tracking_number, \
     created_at, shipped_at, delivered_at";

/// Order store backed by PostgreSQL.
///
/// Transitions persist through a conditional `UPDATE ... WHERE status = $n`;
/// zero affected rows means a concurrent writer changed the status first.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Pool<Postgres>,
}

impl PostgresOrderStore {
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
}

fn parse_error(detail: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(detail.to_string())
}

fn order_from_row(row: &PgRow) -> StoreResult<Order> {
    let id: String = row.try_get("id").map_err(map_sqlx_error)?;
    let user_id: String = row.try_get("user_id").map_err(map_sqlx_error)?;
    let email: String = row.try_get("email").map_err(map_sqlx_error)?;
    let Json(items): Json<Vec<OrderItem>> = row.try_get("items").map_err(map_sqlx_error)?;
    let Json(shipping_address): Json<ShippingAddress> =
        row.try_get("shipping_address").map_err(map_sqlx_error)?;
    let payment_method: String = row.try_get("payment_method").map_err(map_sqlx_error)?;
    let items_price: Decimal = row.try_get("items_price").map_err(map_sqlx_error)?;
    let tax_price: Decimal = row.try_get("tax_price").map_err(map_sqlx_error)?;
    let shipping_price: Decimal = row.try_get("shipping_price").map_err(map_sqlx_error)?;
    let total_price: Decimal = row.try_get("total_price").map_err(map_sqlx_error)?;
    let status: String = row.try_get("status").map_err(map_sqlx_error)?;
    let tracking_number: Option<String> =
        row.try_get("tracking_number").map_err(map_sqlx_error)?;

    Ok(Order {
        id: OrderId::try_new(id).map_err(parse_error)?,
        user_id: UserId::try_new(user_id).map_err(parse_error)?,
        email: CustomerEmail::try_new(email).map_err(parse_error)?,
        items,
        shipping_address,
        payment_method,
        amounts: OrderAmounts::new(
            money_from(items_price)?,
            money_from(tax_price)?,
            money_from(shipping_price)?,
            money_from(total_price)?,
        )
        .map_err(parse_error)?,
        status: status.parse::<OrderStatus>().map_err(parse_error)?,
        tracking_number: tracking_number
            .map(TrackingNumber::try_new)
            .transpose()
            .map_err(parse_error)?,
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
        shipped_at: row.try_get("shipped_at").map_err(map_sqlx_error)?,
        delivered_at: row.try_get("delivered_at").map_err(map_sqlx_error)?,
    })
}

const fn sort_column(sort_by: SortBy) -> &'static str {
    match sort_by {
        SortBy::CreatedAt => "created_at",
        SortBy::TotalPrice => "total_price",
    }
}

const fn sort_direction(sort_order: SortOrder) -> &'static str {
    match sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    }
}

fn page_limit(page: &Page) -> i64 {
    i64::from(page.limit)
}

fn page_offset(page: &Page) -> i64 {
    i64::try_from(page.offset()).unwrap_or(i64::MAX)
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[instrument(name = "postgres.insert_order", skip(self, order), fields(order_id = %order.id))]
    async fn insert(&self, order: Order) -> StoreResult<()> {
        let result = query(
            "INSERT INTO orders (id, user_id, email, items, shipping_address, payment_method, \
             items_price, tax_price, shipping_price, total_price, status, tracking_number, \
             created_at, shipped_at, delivered_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(order.id.as_ref())
        .bind(order.user_id.as_ref())
        .bind(order.email.as_ref())
        .bind(Json(&order.items))
        .bind(Json(&order.shipping_address))
        .bind(&order.payment_method)
        .bind(order.amounts.items_price.amount())
        .bind(order.amounts.tax_price.amount())
        .bind(order.amounts.shipping_price.amount())
        .bind(order.amounts.total_price.amount())
        .bind(order.status.as_str())
        .bind(order.tracking_number.as_ref().map(ToString::to_string))
        .bind(order.created_at)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) if is_unique_violation(&error) => {
                Err(StoreError::DuplicateOrder(order.id.clone()))
            }
            Err(error) => Err(map_sqlx_error(error)),
        }
    }

    async fn get(&self, id: &OrderId) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = query(&sql)
            .bind(id.as_ref())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(order_from_row).transpose()
    }

    #[instrument(name = "postgres.update_order", skip(self, order), fields(order_id = %order.id, expected = %expected))]
    async fn update(&self, order: &Order, expected: OrderStatus) -> StoreResult<()> {
        let result = query(
            "UPDATE orders SET status = $2, tracking_number = $3, shipped_at = $4, delivered_at = $5
             WHERE id = $1 AND status = $6",
        )
        .bind(order.id.as_ref())
        .bind(order.status.as_str())
        .bind(order.tracking_number.as_ref().map(ToString::to_string))
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Nothing matched: either a concurrent writer moved the status, or
        // the order does not exist at all.
        let row = query("SELECT status FROM orders WHERE id = $1")
            .bind(order.id.as_ref())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        match row {
            Some(row) => {
                let status: String = row.try_get("status").map_err(map_sqlx_error)?;
                let current = status.parse::<OrderStatus>().map_err(parse_error)?;
                warn!(
                    order_id = %order.id,
                    expected = %expected,
                    current = %current,
                    "[postgres.update_order] optimistic concurrency check failed"
                );
                Err(StoreError::Conflict {
                    order_id: order.id.clone(),
                    expected,
                    current,
                })
            }
            None => Err(StoreError::Internal(format!(
                "Order '{}' not found during update",
                order.id
            ))),
        }
    }

    async fn list_for_user(&self, user_id: &UserId, page: &Page) -> StoreResult<PageOf<Order>> {
        let count_row = query(
            "SELECT COUNT(*) AS count FROM orders WHERE user_id = $1 AND status <> 'cancelled'",
        )
        .bind(user_id.as_ref())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        let total: i64 = count_row.try_get("count").map_err(map_sqlx_error)?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND status <> 'cancelled' \
             ORDER BY {} {} LIMIT $2 OFFSET $3",
            sort_column(page.sort_by),
            sort_direction(page.sort_order),
        );
        let rows = query(&sql)
            .bind(user_id.as_ref())
            .bind(page_limit(page))
            .bind(page_offset(page))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let orders = rows
            .iter()
            .map(order_from_row)
            .collect::<StoreResult<Vec<Order>>>()?;
        Ok(PageOf::assemble(
            orders,
            u64::try_from(total).unwrap_or(0),
            page,
        ))
    }

    async fn list_all(
        &self,
        status: Option<OrderStatus>,
        page: &Page,
    ) -> StoreResult<OrderListing> {
        let cancelled_row =
            query("SELECT COUNT(*) AS count FROM orders WHERE status = 'cancelled'")
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        let cancelled: i64 = cancelled_row.try_get("count").map_err(map_sqlx_error)?;

        let order_by = format!(
            "ORDER BY {} {} LIMIT $1 OFFSET $2",
            sort_column(page.sort_by),
            sort_direction(page.sort_order),
        );

        let (total, rows) = if let Some(wanted) = status {
            let count_row = query("SELECT COUNT(*) AS count FROM orders WHERE status = $1")
                .bind(wanted.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            let total: i64 = count_row.try_get("count").map_err(map_sqlx_error)?;

            let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE status = $3 {order_by}");
            let rows = query(&sql)
                .bind(page_limit(page))
                .bind(page_offset(page))
                .bind(wanted.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            (total, rows)
        } else {
            let count_row = query("SELECT COUNT(*) AS count FROM orders")
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            let total: i64 = count_row.try_get("count").map_err(map_sqlx_error)?;

            let sql = format!("SELECT {ORDER_COLUMNS} FROM orders {order_by}");
            let rows = query(&sql)
                .bind(page_limit(page))
                .bind(page_offset(page))
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            (total, rows)
        };

        let orders = rows
            .iter()
            .map(order_from_row)
            .collect::<StoreResult<Vec<Order>>>()?;
        Ok(OrderListing {
            orders: PageOf::assemble(orders, u64::try_from(total).unwrap_or(0), page),
            cancelled_count: u64::try_from(cancelled).unwrap_or(0),
        })
    }
}
