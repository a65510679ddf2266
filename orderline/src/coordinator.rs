//! The order lifecycle coordinator.
//!
//! The coordinator is the façade the rest of the storefront calls. It is
//! the sole writer of order status and the sole caller of stock mutations:
//! it authorizes the actor, validates preconditions, commits the order
//! mutation through the store's conditional update, and only then fires
//! the best-effort side effects (stats, notifications). A stats or
//! notifier outage can therefore never block or fail commerce.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::errors::{OrderError, OrderResult, StoreError, ValidationError};
use crate::notify::{NotificationKind, Notifier};
use crate::order::{LifecycleAction, Order, OrderDraft, OrderStatus};
use crate::stats::{StatsAggregator, StatsLedger};
use crate::stock::{StockLedger, StockRequest};
use crate::store::{OrderListing, OrderStore, Page, PageOf};
use crate::types::{Actor, OrderId, ProductId, TrackingNumber};

/// Orchestrates validated, authorized order transitions and their side
/// effects over pluggable persistence seams.
#[derive(Clone)]
pub struct LifecycleCoordinator {
    stock: Arc<dyn StockLedger>,
    orders: Arc<dyn OrderStore>,
    stats: Arc<dyn StatsAggregator>,
    notifier: Arc<dyn Notifier>,
}

impl LifecycleCoordinator {
    /// Create a coordinator over the given adapters.
    pub fn new(
        stock: Arc<dyn StockLedger>,
        orders: Arc<dyn OrderStore>,
        stats: Arc<dyn StatsAggregator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            stock,
            orders,
            stats,
            notifier,
        }
    }

    /// Create an order for `actor` from `draft`.
    ///
    /// Stock for every item is reserved as a single atomic unit before the
    /// order record exists; if persisting the record then fails, the
    /// reservation is compensated with a release before the error returns.
    /// A failed request leaves stock and stats untouched.
    #[instrument(skip(self, draft), fields(user = %actor.id))]
    pub async fn create_order(&self, actor: &Actor, draft: OrderDraft) -> OrderResult<Order> {
        if draft.items.is_empty() {
            return Err(ValidationError::NoItems.into());
        }

        // Dry-run existence/stock check; the reserve below is authoritative.
        // Lines naming the same product count against it cumulatively.
        let mut needed: HashMap<ProductId, u64> = HashMap::new();
        for item in &draft.items {
            let total = needed.entry(item.product_id.clone()).or_insert(0);
            *total += u64::from(item.qty.value());
            match self.stock.available(&item.product_id).await? {
                None => return Err(OrderError::ProductNotFound(item.product_id.clone())),
                Some(available) if u64::from(available.value()) < *total => {
                    return Err(OrderError::InsufficientStock {
                        product_id: item.product_id.clone(),
                        requested: item.qty,
                        available,
                    });
                }
                Some(_) => {}
            }
        }

        let requests = StockRequest::for_items(&draft.items);
        self.stock.reserve(&requests).await?;

        let order = match Order::new(actor.id.clone(), draft, Utc::now()) {
            Ok(order) => order,
            Err(err) => {
                self.compensate_reservation(&requests).await;
                return Err(err.into());
            }
        };

        if let Err(err) = self.orders.insert(order.clone()).await {
            self.compensate_reservation(&requests).await;
            return Err(err.into());
        }

        if let Err(err) = self
            .stats
            .record_created(&order.id, order.amounts.total_price)
            .await
        {
            warn!(order_id = %order.id, error = %err, "stats update failed after order creation");
        }

        self.dispatch(NotificationKind::Created, &order);
        info!(order_id = %order.id, total = %order.amounts.total_price, "order created");
        Ok(order)
    }

    /// Mark an order shipped. Admin only; requires `processing`.
    ///
    /// Generates a tracking number when none is supplied.
    #[instrument(skip(self), fields(user = %actor.id))]
    pub async fn mark_shipped(
        &self,
        order_id: &OrderId,
        actor: &Actor,
        tracking: Option<TrackingNumber>,
    ) -> OrderResult<Order> {
        self.require_admin(actor, "ship orders")?;

        let mut order = self.load(order_id).await?;
        let expected = order.status;
        order.ship(tracking.unwrap_or_else(TrackingNumber::generate), Utc::now())?;
        self.commit(&order, expected, LifecycleAction::Ship).await?;

        self.dispatch(NotificationKind::Shipped, &order);
        info!(order_id = %order.id, "order shipped");
        Ok(order)
    }

    /// Mark an order delivered. Admin only; requires `shipped`.
    #[instrument(skip(self), fields(user = %actor.id))]
    pub async fn mark_delivered(&self, order_id: &OrderId, actor: &Actor) -> OrderResult<Order> {
        self.require_admin(actor, "mark orders delivered")?;

        let mut order = self.load(order_id).await?;
        let expected = order.status;
        order.deliver(Utc::now())?;
        self.commit(&order, expected, LifecycleAction::Deliver).await?;

        self.dispatch(NotificationKind::Delivered, &order);
        info!(order_id = %order.id, "order delivered");
        Ok(order)
    }

    /// Cancel an order. Owner or admin; requires `processing` or `shipped`.
    ///
    /// The conditional store update is the exactly-once gate: of several
    /// concurrent cancel attempts only the winner releases stock and
    /// records the cancellation in stats.
    #[instrument(skip(self), fields(user = %actor.id))]
    pub async fn cancel_order(&self, order_id: &OrderId, actor: &Actor) -> OrderResult<Order> {
        let mut order = self.load(order_id).await?;
        if !actor.is_admin() && !actor.owns(&order.user_id) {
            return Err(OrderError::Unauthorized(
                "Only the order's owner or an admin may cancel it".to_string(),
            ));
        }

        let expected = order.status;
        order.cancel()?;
        self.commit(&order, expected, LifecycleAction::Cancel).await?;

        // From here the cancellation is committed; the exact quantities
        // reserved at creation are restored once.
        let requests = StockRequest::for_items(&order.items);
        if let Err(err) = self.stock.release(&requests).await {
            error!(
                order_id = %order.id,
                error = %err,
                "stock release after committed cancellation failed; needs reconciliation"
            );
        }

        if let Err(err) = self
            .stats
            .record_cancelled(&order.id, order.amounts.total_price)
            .await
        {
            warn!(order_id = %order.id, error = %err, "stats update failed after cancellation");
        }

        self.dispatch(NotificationKind::Cancelled, &order);
        info!(order_id = %order.id, "order cancelled");
        Ok(order)
    }

    /// Fetch a single order. Owner or admin.
    pub async fn get_order(&self, order_id: &OrderId, actor: &Actor) -> OrderResult<Order> {
        let order = self.load(order_id).await?;
        if !actor.is_admin() && !actor.owns(&order.user_id) {
            return Err(OrderError::Unauthorized(
                "Not authorized to view this order".to_string(),
            ));
        }
        Ok(order)
    }

    /// List the actor's own orders, excluding cancelled ones.
    pub async fn list_my_orders(&self, actor: &Actor, page: &Page) -> OrderResult<PageOf<Order>> {
        Ok(self.orders.list_for_user(&actor.id, page).await?)
    }

    /// List all orders with an optional status filter. Admin only.
    pub async fn list_orders(
        &self,
        actor: &Actor,
        status: Option<OrderStatus>,
        page: &Page,
    ) -> OrderResult<OrderListing> {
        self.require_admin(actor, "list all orders")?;
        Ok(self.orders.list_all(status, page).await?)
    }

    /// Read the stats ledger. Admin only.
    pub async fn stats(&self, actor: &Actor) -> OrderResult<StatsLedger> {
        self.require_admin(actor, "read order stats")?;
        self.stats
            .snapshot()
            .await
            .map_err(|err| OrderError::Store(StoreError::Internal(err.to_string())))
    }

    fn require_admin(&self, actor: &Actor, action: &str) -> OrderResult<()> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(OrderError::Unauthorized(format!("Only admins may {action}")))
        }
    }

    async fn load(&self, order_id: &OrderId) -> OrderResult<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.clone()))
    }

    /// Persist a transition; a lost optimistic-concurrency race surfaces as
    /// a transition rejection carrying the fresh status.
    async fn commit(
        &self,
        order: &Order,
        expected: OrderStatus,
        attempted: LifecycleAction,
    ) -> OrderResult<()> {
        match self.orders.update(order, expected).await {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict { current, .. }) => {
                Err(OrderError::InvalidTransition { current, attempted })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Undo a reservation whose order never materialized.
    async fn compensate_reservation(&self, requests: &[StockRequest]) {
        if let Err(err) = self.stock.release(requests).await {
            error!(
                error = %err,
                "compensating stock release failed; needs reconciliation"
            );
        }
    }

    /// Fire-and-forget notification dispatch. Failures are logged only.
    fn dispatch(&self, kind: NotificationKind, order: &Order) {
        let notifier = Arc::clone(&self.notifier);
        let order = order.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.notify(kind, &order).await {
                error!(order_id = %order.id, kind = %kind, error = %err, "notification failed");
            }
        });
    }
}
