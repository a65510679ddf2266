//! The order record and its state machine.
//!
//! Orders move through a closed set of statuses:
//!
//! ```text
//!  (new) --create--> processing
//!  processing --ship--> shipped
//!  shipped --deliver--> delivered   (terminal)
//!  processing --cancel--> cancelled (terminal)
//!  shipped    --cancel--> cancelled (terminal)
//! ```
//!
//! Any other transition is rejected with
//! [`OrderError::InvalidTransition`](crate::errors::OrderError::InvalidTransition).
//! The transition methods mutate the record in place; persistence and
//! concurrency control are the store's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::errors::{OrderError, ValidationError};
use crate::types::{CustomerEmail, Money, OrderId, ProductId, Quantity, TrackingNumber, UserId};

/// Status of an order in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order has been created and stock reserved; awaiting fulfilment.
    Processing,
    /// Order has left the warehouse with a tracking number.
    Shipped,
    /// Order reached the customer. Terminal.
    Delivered,
    /// Order was cancelled and its stock restored. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Stable lowercase name, used for storage and query filters.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is permitted from this status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("Unknown order status '{other}'")),
        }
    }
}

/// A lifecycle action attempted against an order.
///
/// Carried inside transition-rejection errors so messages can name what was
/// attempted against which status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    /// Mark the order shipped.
    Ship,
    /// Mark the order delivered.
    Deliver,
    /// Cancel the order.
    Cancel,
}

impl Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ship => f.write_str("ship"),
            Self::Deliver => f.write_str("deliver"),
            Self::Cancel => f.write_str("cancel"),
        }
    }
}

/// A single line item on an order. Immutable once the order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product being ordered.
    pub product_id: ProductId,
    /// Product name at time of order, for display.
    pub name: String,
    /// Unit price at time of order.
    pub unit_price: Money,
    /// Quantity ordered (at least 1).
    pub qty: Quantity,
}

impl OrderItem {
    /// Create a new order item.
    pub const fn new(product_id: ProductId, name: String, unit_price: Money, qty: Quantity) -> Self {
        Self {
            product_id,
            name,
            unit_price,
            qty,
        }
    }

    /// Total price for this line.
    pub fn total_price(&self) -> Result<Money, ValidationError> {
        self.unit_price.multiply_by_quantity(self.qty)
    }
}

/// The priced breakdown of an order.
///
/// Construction verifies that the parts sum to the total, so a committed
/// order can never disagree with the revenue recorded for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAmounts {
    /// Sum of line totals.
    pub items_price: Money,
    /// Tax charged.
    pub tax_price: Money,
    /// Shipping charged.
    pub shipping_price: Money,
    /// Grand total.
    pub total_price: Money,
}

impl OrderAmounts {
    /// Create amounts, verifying `items + tax + shipping == total`.
    pub fn new(
        items_price: Money,
        tax_price: Money,
        shipping_price: Money,
        total_price: Money,
    ) -> Result<Self, ValidationError> {
        let computed = items_price
            .checked_add(tax_price)?
            .checked_add(shipping_price)?;
        if computed != total_price {
            return Err(ValidationError::InconsistentAmounts(format!(
                "items {items_price} + tax {tax_price} + shipping {shipping_price} = {computed}, but total is {total_price}"
            )));
        }
        Ok(Self {
            items_price,
            tax_price,
            shipping_price,
            total_price,
        })
    }
}

/// Shipping destination, recorded verbatim from the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
    /// Country.
    pub country: String,
}

/// Everything a caller supplies to create an order.
///
/// The owner comes from the authenticated actor, not the draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Notification recipient.
    pub email: CustomerEmail,
    /// Line items (must be non-empty).
    pub items: Vec<OrderItem>,
    /// Destination.
    pub shipping_address: ShippingAddress,
    /// Payment method label; confirmation mechanics are external.
    pub payment_method: String,
    /// Priced breakdown.
    pub amounts: OrderAmounts,
}

/// An order record.
///
/// Created once by the coordinator, mutated only through the transition
/// methods below, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,
    /// Owning user.
    pub user_id: UserId,
    /// Notification recipient.
    pub email: CustomerEmail,
    /// Line items, in submission order.
    pub items: Vec<OrderItem>,
    /// Destination.
    pub shipping_address: ShippingAddress,
    /// Payment method label.
    pub payment_method: String,
    /// Priced breakdown.
    pub amounts: OrderAmounts,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Tracking number, set when shipped.
    pub tracking_number: Option<TrackingNumber>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Shipment time, set when shipped.
    pub shipped_at: Option<DateTime<Utc>>,
    /// Delivery time, set when delivered.
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a new order in `processing` for `user_id`.
    ///
    /// Fails if the draft has no items. Stock must already be reserved by
    /// the caller; this constructor only builds the record.
    pub fn new(user_id: UserId, draft: OrderDraft, at: DateTime<Utc>) -> Result<Self, ValidationError> {
        if draft.items.is_empty() {
            return Err(ValidationError::NoItems);
        }

        Ok(Self {
            id: OrderId::generate(),
            user_id,
            email: draft.email,
            items: draft.items,
            shipping_address: draft.shipping_address,
            payment_method: draft.payment_method,
            amounts: draft.amounts,
            status: OrderStatus::Processing,
            tracking_number: None,
            created_at: at,
            shipped_at: None,
            delivered_at: None,
        })
    }

    /// Mark the order shipped, assigning a tracking number.
    ///
    /// Valid only from `processing`.
    pub fn ship(&mut self, tracking: TrackingNumber, at: DateTime<Utc>) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Processing => {
                self.status = OrderStatus::Shipped;
                self.tracking_number = Some(tracking);
                self.shipped_at = Some(at);
                Ok(())
            }
            current => Err(OrderError::InvalidTransition {
                current,
                attempted: LifecycleAction::Ship,
            }),
        }
    }

    /// Mark the order delivered.
    ///
    /// Valid only from `shipped`.
    pub fn deliver(&mut self, at: DateTime<Utc>) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Shipped => {
                self.status = OrderStatus::Delivered;
                self.delivered_at = Some(at);
                Ok(())
            }
            current => Err(OrderError::InvalidTransition {
                current,
                attempted: LifecycleAction::Deliver,
            }),
        }
    }

    /// Cancel the order.
    ///
    /// Valid from `processing` or `shipped`. Stock restoration and the
    /// stats reversal are the coordinator's responsibility, gated on the
    /// store committing this transition exactly once.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Processing | OrderStatus::Shipped => {
                self.status = OrderStatus::Cancelled;
                Ok(())
            }
            current => Err(OrderError::InvalidTransition {
                current,
                attempted: LifecycleAction::Cancel,
            }),
        }
    }
}
