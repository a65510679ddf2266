//! The stats aggregation seam.
//!
//! A single running ledger of aggregate revenue and order counts, updated
//! as a side effect of order creation and cancellation. The ledger is
//! eventually consistent relative to order records: an update may fail
//! without rolling back the triggering lifecycle operation, so
//! implementations must apply each `(order, event)` pair at most once to
//! keep coordinator retries safe.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::errors::StatsError;
use crate::types::{Money, OrderId};

/// The kind of lifecycle event being recorded.
///
/// Together with the order id this forms the idempotency key for a stats
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsEvent {
    /// An order was created.
    Created,
    /// An order was cancelled.
    Cancelled,
}

impl Display for StatsEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// The running aggregate counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsLedger {
    /// Total revenue across non-reversed orders. Never negative.
    pub total_revenue: Money,
    /// Number of orders ever created.
    pub total_orders: u64,
    /// Number of orders cancelled.
    pub cancelled_orders: u64,
}

impl StatsLedger {
    /// Apply a creation event to the counters.
    pub fn apply_created(&mut self, total: Money) -> Result<(), StatsError> {
        self.total_revenue = self
            .total_revenue
            .checked_add(total)
            .map_err(|e| StatsError::UpdateFailed(e.to_string()))?;
        self.total_orders += 1;
        Ok(())
    }

    /// Apply a cancellation event to the counters.
    ///
    /// Revenue floors at zero regardless of cancellation order or amount.
    pub fn apply_cancelled(&mut self, total: Money) {
        self.total_revenue = self.total_revenue.saturating_sub(total);
        self.cancelled_orders += 1;
    }
}

/// Best-effort aggregate counters for revenue and order counts.
///
/// Both record operations must be idempotent per `(order_id, event)`;
/// failures are logged by the coordinator and never fail the triggering
/// lifecycle operation.
#[async_trait]
pub trait StatsAggregator: Send + Sync {
    /// Record an order creation: `total_revenue += total; total_orders += 1`.
    async fn record_created(&self, order_id: &OrderId, total: Money) -> Result<(), StatsError>;

    /// Record a cancellation: `total_revenue = max(0, total_revenue - total);
    /// cancelled_orders += 1`.
    async fn record_cancelled(&self, order_id: &OrderId, total: Money) -> Result<(), StatsError>;

    /// Read the current counters.
    async fn snapshot(&self) -> Result<StatsLedger, StatsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(cents: u64) -> Money {
        Money::from_cents(cents).unwrap()
    }

    #[test]
    fn created_accumulates_revenue_and_count() {
        let mut ledger = StatsLedger::default();
        ledger.apply_created(money(12_000)).unwrap();
        ledger.apply_created(money(3_050)).unwrap();

        assert_eq!(ledger.total_revenue.to_cents(), 15_050);
        assert_eq!(ledger.total_orders, 2);
        assert_eq!(ledger.cancelled_orders, 0);
    }

    #[test]
    fn cancelled_reverses_revenue_and_counts() {
        let mut ledger = StatsLedger::default();
        ledger.apply_created(money(12_000)).unwrap();
        ledger.apply_cancelled(money(12_000));

        assert_eq!(ledger.total_revenue, Money::zero());
        assert_eq!(ledger.total_orders, 1);
        assert_eq!(ledger.cancelled_orders, 1);
    }

    #[test]
    fn revenue_never_goes_negative() {
        let mut ledger = StatsLedger::default();
        ledger.apply_created(money(500)).unwrap();
        ledger.apply_cancelled(money(10_000));

        assert_eq!(ledger.total_revenue, Money::zero());
        assert_eq!(ledger.cancelled_orders, 1);
    }

    #[test]
    fn ledger_serializes_for_the_admin_endpoint() {
        let mut ledger = StatsLedger::default();
        ledger.apply_created(money(12_000)).unwrap();

        let json = serde_json::to_value(ledger).unwrap();
        assert_eq!(json["total_orders"], 1);
        assert_eq!(json["cancelled_orders"], 0);
    }
}
