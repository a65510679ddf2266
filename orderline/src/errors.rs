//! Error types for the order engine.
//!
//! Each subsystem has its own error enum so callers can tell apart
//! validation problems, missing resources, authorization failures, stock
//! shortfalls, and state-machine rejections. Persistence failures live in
//! [`StoreError`] and convert into [`OrderError`] at the coordinator
//! boundary. Stats failures ([`StatsError`]) never surface to callers; the
//! coordinator logs them and moves on.

use thiserror::Error;

use crate::order::{LifecycleAction, OrderStatus};
use crate::types::{OrderId, ProductId, Quantity};

/// Errors produced when parsing raw input into domain values.
///
/// These occur at system boundaries; once values are parsed into domain
/// types they are valid for the rest of the program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A money amount was negative, too precise, or too large.
    #[error("Invalid money amount: {0}")]
    InvalidMoney(String),

    /// A quantity was zero (for an order line) or out of range.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// An unknown role string was supplied.
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// An order was submitted without any items.
    #[error("Order must contain at least one item")]
    NoItems,

    /// The submitted amounts do not add up.
    #[error("Inconsistent amounts: {0}")]
    InconsistentAmounts(String),
}

/// Errors from the persistence layer backing the order store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A conditional update lost an optimistic-concurrency race: the stored
    /// status no longer matches what the caller observed.
    #[error("Concurrent update on order '{order_id}': expected status {expected}, but current is {current}")]
    Conflict {
        /// The order whose update was rejected.
        order_id: OrderId,
        /// The status the caller expected to still hold.
        expected: OrderStatus,
        /// The status actually stored.
        current: OrderStatus,
    },

    /// An order with the same id already exists.
    #[error("Order '{0}' already exists")]
    DuplicateOrder(OrderId),

    /// The connection to the backing store failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A stored record could not be converted to or from its wire form.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors from the stock ledger.
#[derive(Debug, Clone, Error)]
pub enum StockError {
    /// The product is not present in the catalog.
    #[error("Product {0} is no longer available")]
    ProductNotFound(ProductId),

    /// Available stock cannot cover the requested quantity.
    ///
    /// Reported for the first offending product; no stock was mutated.
    #[error("Not enough stock for {product_id}. Only {available} available.")]
    Insufficient {
        /// The product that fell short.
        product_id: ProductId,
        /// The quantity the order asked for.
        requested: Quantity,
        /// The quantity actually available.
        available: Quantity,
    },

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Non-fatal errors from the stats aggregator.
///
/// Never returned to callers of lifecycle operations; logged at the
/// coordinator boundary so a stats outage cannot block commerce.
#[derive(Debug, Clone, Error)]
pub enum StatsError {
    /// The counters could not be read or updated.
    #[error("Stats update failed: {0}")]
    UpdateFailed(String),

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error from the outbound notifier.
///
/// Notifications are fire-and-forget; this error is only ever logged.
#[derive(Debug, Clone, Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Errors returned by lifecycle operations on the coordinator.
#[derive(Debug, Clone, Error)]
pub enum OrderError {
    /// The request was missing or malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A requested product does not exist in the catalog.
    #[error("Product {0} is no longer available")]
    ProductNotFound(ProductId),

    /// The requested order does not exist.
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    /// Stock could not cover the request; nothing was reserved.
    #[error("Not enough stock for {product_id}. Only {available} available.")]
    InsufficientStock {
        /// The product that fell short.
        product_id: ProductId,
        /// The quantity the order asked for.
        requested: Quantity,
        /// The quantity actually available.
        available: Quantity,
    },

    /// The actor lacks the capability or ownership the operation requires.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// The order's current status does not permit the attempted action.
    #[error("{}", transition_denied(.current, .attempted))]
    InvalidTransition {
        /// The status the order holds.
        current: OrderStatus,
        /// The action that was attempted.
        attempted: LifecycleAction,
    },

    /// The persistence layer failed.
    #[error("Store error: {0}")]
    Store(StoreError),
}

/// Render the rejection message for an illegal transition.
///
/// Cancellation gets dedicated wording so callers can tell "already
/// cancelled" apart from "cannot cancel delivered".
fn transition_denied(current: &OrderStatus, attempted: &LifecycleAction) -> String {
    match (attempted, current) {
        (LifecycleAction::Cancel, OrderStatus::Cancelled) => {
            "Order is already cancelled".to_string()
        }
        (LifecycleAction::Cancel, OrderStatus::Delivered) => {
            "Cannot cancel a delivered order".to_string()
        }
        // Cancelling a shipped order is legal, so this pairing only arises
        // when a concurrent update moved the status mid-request. The caller
        // can simply retry.
        (LifecycleAction::Cancel, OrderStatus::Shipped) => {
            "Order was updated concurrently; retry the cancellation".to_string()
        }
        _ => format!("Cannot {attempted} an order that is {current}"),
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<StockError> for OrderError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::ProductNotFound(product_id) => Self::ProductNotFound(product_id),
            StockError::Insufficient {
                product_id,
                requested,
                available,
            } => Self::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StockError::Store(store) => Self::Store(store),
        }
    }
}

/// Type alias for lifecycle operation results.
pub type OrderResult<T> = Result<T, OrderError>;

/// Type alias for persistence-layer results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for stock-ledger results.
pub type StockResult<T> = Result<T, StockError>;
