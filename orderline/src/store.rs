//! The order store seam.
//!
//! The store persists order records and serializes per-order transitions:
//! [`OrderStore::update`] is a conditional compare-and-set on the stored
//! status, so of several concurrent transition attempts on one order only
//! one can win. Losers get [`StoreError::Conflict`] and the coordinator
//! turns that into a transition rejection.
//!
//! [`StoreError::Conflict`]: crate::errors::StoreError::Conflict

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StoreResult;
use crate::order::{Order, OrderStatus};
use crate::types::{OrderId, UserId};

/// Sort key for order listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Sort by creation time.
    CreatedAt,
    /// Sort by order total.
    TotalPrice,
}

/// Sort direction for order listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// A page request: 1-based page number, capped page size, sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number.
    pub page: u32,
    /// Page size, clamped to `1..=MAX_LIMIT`.
    pub limit: u32,
    /// Sort key.
    pub sort_by: SortBy,
    /// Sort direction.
    pub sort_order: SortOrder,
}

impl Page {
    /// Largest page size a caller may request.
    pub const MAX_LIMIT: u32 = 100;

    /// Create a page request, clamping out-of-range values.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
            sort_by: SortBy::CreatedAt,
            sort_order: SortOrder::Desc,
        }
    }

    /// Replace the sort key and direction.
    #[must_use]
    pub const fn sorted(mut self, sort_by: SortBy, sort_order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self
    }

    /// Zero-based offset of this page's first row.
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOf<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total matching items across all pages.
    pub total: u64,
    /// The page number served.
    pub page: u32,
    /// Total number of pages.
    pub pages: u32,
}

impl<T> PageOf<T> {
    /// Assemble a page from pre-sliced items and the overall total.
    ///
    /// `Page::new` clamps the limit, but `Page`'s fields are public; a
    /// hand-built zero limit is treated as 1 here rather than dividing by
    /// zero.
    pub fn assemble(items: Vec<T>, total: u64, page: &Page) -> Self {
        let pages = total.div_ceil(u64::from(page.limit.max(1)));
        Self {
            items,
            total,
            page: page.page,
            pages: u32::try_from(pages).unwrap_or(u32::MAX),
        }
    }
}

/// The admin-facing listing: a page of orders plus the cancelled count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderListing {
    /// The requested page of orders.
    pub orders: PageOf<Order>,
    /// How many orders are cancelled, across the whole store.
    pub cancelled_count: u64,
}

/// Persistence for order records and their transitions.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a newly created order.
    async fn insert(&self, order: Order) -> StoreResult<()>;

    /// Fetch an order by id.
    async fn get(&self, id: &OrderId) -> StoreResult<Option<Order>>;

    /// Persist a transition, conditional on the stored status still being
    /// `expected`. A mismatch means a concurrent writer won the race.
    async fn update(&self, order: &Order, expected: OrderStatus) -> StoreResult<()>;

    /// List a user's orders, excluding cancelled ones.
    async fn list_for_user(&self, user_id: &UserId, page: &Page) -> StoreResult<PageOf<Order>>;

    /// List all orders with an optional status filter, plus the cancelled
    /// count. Admin view.
    async fn list_all(
        &self,
        status: Option<OrderStatus>,
        page: &Page,
    ) -> StoreResult<OrderListing>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_out_of_range_values() {
        let page = Page::new(0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 1);

        let page = Page::new(3, 500);
        assert_eq!(page.page, 3);
        assert_eq!(page.limit, Page::MAX_LIMIT);
    }

    #[test]
    fn page_offset() {
        assert_eq!(Page::new(1, 20).offset(), 0);
        assert_eq!(Page::new(3, 20).offset(), 40);
    }

    #[test]
    fn page_assembly_computes_page_count() {
        let page = Page::new(2, 10);
        let result = PageOf::assemble(vec![1, 2, 3], 23, &page);
        assert_eq!(result.total, 23);
        assert_eq!(result.page, 2);
        assert_eq!(result.pages, 3);
    }

    #[test]
    fn assembly_tolerates_a_hand_built_zero_limit() {
        let page = Page {
            page: 1,
            limit: 0,
            sort_by: SortBy::CreatedAt,
            sort_order: SortOrder::Desc,
        };
        let result = PageOf::<u32>::assemble(Vec::new(), 5, &page);
        assert_eq!(result.pages, 5);
    }

    #[test]
    fn empty_result_has_zero_pages() {
        let result = PageOf::<u32>::assemble(Vec::new(), 0, &Page::default());
        assert_eq!(result.pages, 0);
        assert!(result.items.is_empty());
    }
}
