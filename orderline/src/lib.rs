//! Orderline: the order lifecycle and inventory-consistency engine.
//!
//! Orderline sits behind a storefront API and owns everything between
//! "customer clicked buy" and "order reached its terminal state":
//!
//! - **Atomic stock reservation**: multi-item orders reserve stock
//!   all-or-nothing, so concurrent checkouts can never oversell.
//! - **A closed state machine**: `processing -> shipped -> delivered`,
//!   with cancellation allowed from `processing` or `shipped` only.
//!   Terminal orders are immutable.
//! - **Conservation on cancellation**: cancelling restores exactly the
//!   reserved quantities, exactly once, gated on an optimistic
//!   compare-and-set in the order store.
//! - **Best-effort side effects**: stats aggregation and customer
//!   notifications run after the transition commits and can never fail it.
//!
//! # Architecture
//!
//! The core crate defines validated domain types and four trait seams:
//! [`StockLedger`], [`OrderStore`], [`StatsAggregator`] and [`Notifier`].
//! The [`LifecycleCoordinator`] composes one implementation of each and is
//! the only type callers interact with. Adapter crates provide the
//! implementations:
//!
//! - `orderline-memory`: in-process adapters for tests and development.
//! - `orderline-postgres`: PostgreSQL adapters for production.
//! - `orderline-http`: the axum HTTP surface over the coordinator.
//!
//! # Example
//!
//! ```ignore
//! use orderline::{Actor, LifecycleCoordinator, OrderDraft, Role, UserId};
//!
//! let coordinator = LifecycleCoordinator::new(stock, orders, stats, notifier);
//! let actor = Actor::new(UserId::try_new("user-42")?, Role::Customer);
//! let order = coordinator.create_order(&actor, draft).await?;
//! ```

pub mod coordinator;
pub mod errors;
pub mod notify;
pub mod order;
pub mod stats;
pub mod stock;
pub mod store;
pub mod types;

pub use coordinator::LifecycleCoordinator;
pub use errors::{
    NotifyError, OrderError, OrderResult, StatsError, StockError, StockResult, StoreError,
    StoreResult, ValidationError,
};
pub use notify::{NoopNotifier, NotificationKind, Notifier};
pub use order::{
    LifecycleAction, Order, OrderAmounts, OrderDraft, OrderItem, OrderStatus, ShippingAddress,
};
pub use stats::{StatsAggregator, StatsEvent, StatsLedger};
pub use stock::{StockLedger, StockRequest};
pub use store::{OrderListing, OrderStore, Page, PageOf, SortBy, SortOrder};
pub use types::{
    Actor, CustomerEmail, Money, OrderId, ProductId, Quantity, Role, TrackingNumber, UserId,
};
