//! The stock ledger seam.
//!
//! The ledger owns per-product available-quantity counters. It has no
//! notion of orders; reservation/restoration idempotency is enforced by the
//! coordinator through the order state machine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StockResult;
use crate::order::OrderItem;
use crate::types::{ProductId, Quantity};

/// A requested stock movement for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    /// Product to move stock for.
    pub product_id: ProductId,
    /// Quantity to reserve or release.
    pub qty: Quantity,
}

impl StockRequest {
    /// Create a new stock request.
    pub const fn new(product_id: ProductId, qty: Quantity) -> Self {
        Self { product_id, qty }
    }

    /// The stock movements an order's items imply.
    pub fn for_items(items: &[OrderItem]) -> Vec<Self> {
        items
            .iter()
            .map(|item| Self::new(item.product_id.clone(), item.qty))
            .collect()
    }
}

impl From<&OrderItem> for StockRequest {
    fn from(item: &OrderItem) -> Self {
        Self::new(item.product_id.clone(), item.qty)
    }
}

/// Atomic reserve/release operations over product stock.
///
/// Implementations must make [`reserve`](StockLedger::reserve) all-or-nothing
/// across the whole request list: concurrent callers may interleave between
/// calls, but never observe a partially applied reservation.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Check and decrement stock for every request as a single unit.
    ///
    /// If any product is missing or short, nothing is decremented and the
    /// first offending product is reported.
    async fn reserve(&self, requests: &[StockRequest]) -> StockResult<()>;

    /// Increment stock for every request.
    ///
    /// Used only by cancellation, at most once per order; releases may
    /// exceed a product's original stock ceiling (restocking has no upper
    /// bound).
    async fn release(&self, requests: &[StockRequest]) -> StockResult<()>;

    /// Dry-run query of a product's available quantity.
    ///
    /// Returns `None` for products the catalog does not know.
    async fn available(&self, product_id: &ProductId) -> StockResult<Option<Quantity>>;
}
