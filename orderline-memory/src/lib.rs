//! In-memory adapters for the Orderline order engine.
//!
//! These implementations back the coordinator with plain `RwLock`-guarded
//! maps. They honor the same contracts the PostgreSQL adapters do (atomic
//! reservation, conditional status updates, idempotent stats) and are the
//! reference implementations the integration tests run against.
//!
//! Not suitable for production: nothing survives a restart.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::instrument;

use orderline::{
    NotificationKind, Notifier, NotifyError, Order, OrderId, OrderListing, OrderStatus, OrderStore,
    Page, PageOf, ProductId, Quantity, SortBy, SortOrder, StatsAggregator, StatsError, StatsEvent,
    StatsLedger, StockError, StockLedger, StockRequest, StockResult, StoreError, StoreResult,
    UserId,
};

/// In-memory stock ledger over a guarded map of available quantities.
///
/// `reserve` validates every request and then applies every decrement under
/// a single write guard, so concurrent callers never observe a partially
/// applied reservation.
#[derive(Debug, Default)]
pub struct InMemoryStockLedger {
    levels: RwLock<HashMap<ProductId, u32>>,
}

impl InMemoryStockLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the available quantity for a product, creating it if unknown.
    pub fn set_stock(&self, product_id: ProductId, qty: Quantity) {
        self.levels
            .write()
            .expect("RwLock poisoned")
            .insert(product_id, qty.value());
    }

    /// Seed a ledger from `(product, quantity)` pairs.
    pub fn with_stock(entries: impl IntoIterator<Item = (ProductId, Quantity)>) -> Self {
        let ledger = Self::new();
        for (product_id, qty) in entries {
            ledger.set_stock(product_id, qty);
        }
        ledger
    }
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    #[instrument(skip(self, requests), fields(request_count = requests.len()))]
    async fn reserve(&self, requests: &[StockRequest]) -> StockResult<()> {
        let mut levels = self.levels.write().expect("RwLock poisoned");

        // Validate everything before touching anything. An order may name
        // the same product on more than one line, so shortfalls are checked
        // against the running total per product, not per line.
        let mut needed: HashMap<ProductId, u32> = HashMap::new();
        for request in requests {
            let available = levels
                .get(&request.product_id)
                .copied()
                .ok_or_else(|| StockError::ProductNotFound(request.product_id.clone()))?;
            let total = needed.entry(request.product_id.clone()).or_insert(0);
            *total = total.saturating_add(request.qty.value());
            if available < *total {
                return Err(StockError::Insufficient {
                    product_id: request.product_id.clone(),
                    requested: request.qty,
                    available: quantity_of(available)?,
                });
            }
        }

        for (product_id, total) in needed {
            if let Some(level) = levels.get_mut(&product_id) {
                *level -= total;
            }
        }
        Ok(())
    }

    #[instrument(skip(self, requests), fields(request_count = requests.len()))]
    async fn release(&self, requests: &[StockRequest]) -> StockResult<()> {
        let mut levels = self.levels.write().expect("RwLock poisoned");
        for request in requests {
            let level = levels.entry(request.product_id.clone()).or_insert(0);
            *level = level.saturating_add(request.qty.value());
        }
        Ok(())
    }

    async fn available(&self, product_id: &ProductId) -> StockResult<Option<Quantity>> {
        let levels = self.levels.read().expect("RwLock poisoned");
        match levels.get(product_id) {
            Some(level) => Ok(Some(quantity_of(*level)?)),
            None => Ok(None),
        }
    }
}

fn quantity_of(value: u32) -> StockResult<Quantity> {
    Quantity::for_inventory(value)
        .map_err(|e| StockError::Store(StoreError::Internal(e.to_string())))
}

/// In-memory order store with conditional status updates.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of orders stored, for tests.
    pub fn len(&self) -> usize {
        self.orders.read().expect("RwLock poisoned").len()
    }

    /// Whether the store holds no orders.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sort_orders(orders: &mut [Order], page: &Page) {
    orders.sort_by(|a, b| {
        let ordering = match page.sort_by {
            SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            SortBy::TotalPrice => a.amounts.total_price.cmp(&b.amounts.total_price),
        };
        match page.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn paginate(mut orders: Vec<Order>, page: &Page) -> PageOf<Order> {
    let total = orders.len() as u64;
    sort_orders(&mut orders, page);
    let items: Vec<Order> = orders
        .into_iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(page.limit as usize)
        .collect();
    PageOf::assemble(items, total, page)
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    async fn insert(&self, order: Order) -> StoreResult<()> {
        let mut orders = self.orders.write().expect("RwLock poisoned");
        if orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateOrder(order.id));
        }
        orders.insert(order.id.clone(), order);
        Ok(())
    }

    async fn get(&self, id: &OrderId) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().expect("RwLock poisoned").get(id).cloned())
    }

    #[instrument(skip(self, order), fields(order_id = %order.id, expected = %expected))]
    async fn update(&self, order: &Order, expected: OrderStatus) -> StoreResult<()> {
        let mut orders = self.orders.write().expect("RwLock poisoned");
        let stored = orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::Internal(format!("Order '{}' vanished", order.id)))?;
        if stored.status != expected {
            return Err(StoreError::Conflict {
                order_id: order.id.clone(),
                expected,
                current: stored.status,
            });
        }
        *stored = order.clone();
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId, page: &Page) -> StoreResult<PageOf<Order>> {
        let orders = self.orders.read().expect("RwLock poisoned");
        let matching: Vec<Order> = orders
            .values()
            .filter(|order| &order.user_id == user_id && order.status != OrderStatus::Cancelled)
            .cloned()
            .collect();
        Ok(paginate(matching, page))
    }

    async fn list_all(
        &self,
        status: Option<OrderStatus>,
        page: &Page,
    ) -> StoreResult<OrderListing> {
        let orders = self.orders.read().expect("RwLock poisoned");
        let cancelled_count = orders
            .values()
            .filter(|order| order.status == OrderStatus::Cancelled)
            .count() as u64;
        let matching: Vec<Order> = orders
            .values()
            .filter(|order| status.is_none_or(|wanted| order.status == wanted))
            .cloned()
            .collect();
        Ok(OrderListing {
            orders: paginate(matching, page),
            cancelled_count,
        })
    }
}

/// In-memory stats aggregator with per-`(order, event)` idempotency.
///
/// Replaying a record call for an order/event pair already applied is a
/// no-op, which keeps coordinator retries from double-counting.
#[derive(Debug, Default)]
pub struct InMemoryStatsAggregator {
    state: RwLock<StatsState>,
}

#[derive(Debug, Default)]
struct StatsState {
    ledger: StatsLedger,
    applied: HashSet<(OrderId, StatsEvent)>,
}

impl InMemoryStatsAggregator {
    /// Create a zeroed aggregator.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsAggregator for InMemoryStatsAggregator {
    async fn record_created(&self, order_id: &OrderId, total: orderline::Money) -> Result<(), StatsError> {
        let mut state = self.state.write().expect("RwLock poisoned");
        if !state
            .applied
            .insert((order_id.clone(), StatsEvent::Created))
        {
            return Ok(());
        }
        let result = state.ledger.apply_created(total);
        if result.is_err() {
            // Keep the key free so a corrected amount can be retried.
            state.applied.remove(&(order_id.clone(), StatsEvent::Created));
        }
        result
    }

    async fn record_cancelled(
        &self,
        order_id: &OrderId,
        total: orderline::Money,
    ) -> Result<(), StatsError> {
        let mut state = self.state.write().expect("RwLock poisoned");
        if !state
            .applied
            .insert((order_id.clone(), StatsEvent::Cancelled))
        {
            return Ok(());
        }
        state.ledger.apply_cancelled(total);
        Ok(())
    }

    async fn snapshot(&self) -> Result<StatsLedger, StatsError> {
        Ok(self.state.read().expect("RwLock poisoned").ledger)
    }
}

/// Notifier that records every dispatch, optionally failing each one.
///
/// Used by tests to assert both that notifications were attempted and that
/// their failures stay isolated from lifecycle operations.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<(NotificationKind, OrderId)>>,
    fail: bool,
}

impl RecordingNotifier {
    /// A notifier that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that records and then fails every dispatch.
    pub fn failing() -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            fail: true,
        }
    }

    /// Every `(kind, order id)` pair dispatched so far.
    pub fn sent(&self) -> Vec<(NotificationKind, OrderId)> {
        self.sent.read().expect("RwLock poisoned").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, kind: NotificationKind, order: &Order) -> Result<(), NotifyError> {
        self.sent
            .write()
            .expect("RwLock poisoned")
            .push((kind, order.id.clone()));
        if self.fail {
            return Err(NotifyError("recording notifier set to fail".to_string()));
        }
        Ok(())
    }
}
