//! Request and response bodies for the order API.
//!
//! Wire names are camelCase. Requests carry raw strings and decimals and
//! are parsed into domain types at the boundary; parse failures become 400s
//! with the underlying validation message.

use chrono::{DateTime, Utc};
use orderline::{
    CustomerEmail, Money, Order, OrderAmounts, OrderDraft, OrderItem, OrderListing, OrderStatus,
    Page, PageOf, ProductId, Quantity, ShippingAddress, SortBy, SortOrder, StatsLedger,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

fn bad(err: impl std::fmt::Display) -> ApiError {
    ApiError::bad_request(err.to_string())
}

/// Body of `POST /orders`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Notification recipient.
    pub email: String,
    /// Line items.
    pub order_items: Vec<OrderItemRequest>,
    /// Destination.
    pub shipping_address: ShippingAddressDto,
    /// Payment method label.
    pub payment_method: String,
    /// Sum of line totals.
    pub items_price: Decimal,
    /// Tax charged.
    pub tax_price: Decimal,
    /// Shipping charged.
    pub shipping_price: Decimal,
    /// Grand total.
    pub total_price: Decimal,
}

/// One line item in a create request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    /// Product being ordered.
    pub product_id: String,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Quantity ordered.
    pub qty: u32,
}

/// Shipping address on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressDto {
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
    /// Country.
    pub country: String,
}

impl From<ShippingAddressDto> for ShippingAddress {
    fn from(dto: ShippingAddressDto) -> Self {
        Self {
            address: dto.address,
            city: dto.city,
            postal_code: dto.postal_code,
            country: dto.country,
        }
    }
}

impl From<ShippingAddress> for ShippingAddressDto {
    fn from(address: ShippingAddress) -> Self {
        Self {
            address: address.address,
            city: address.city,
            postal_code: address.postal_code,
            country: address.country,
        }
    }
}

impl TryFrom<CreateOrderRequest> for OrderDraft {
    type Error = ApiError;

    fn try_from(req: CreateOrderRequest) -> Result<Self, Self::Error> {
        let email = CustomerEmail::try_new(req.email).map_err(bad)?;
        let items = req
            .order_items
            .into_iter()
            .map(|item| {
                Ok(OrderItem::new(
                    ProductId::try_new(item.product_id).map_err(bad)?,
                    item.name,
                    Money::new(item.price).map_err(bad)?,
                    Quantity::new(item.qty).map_err(bad)?,
                ))
            })
            .collect::<Result<Vec<OrderItem>, ApiError>>()?;
        let amounts = OrderAmounts::new(
            Money::new(req.items_price).map_err(bad)?,
            Money::new(req.tax_price).map_err(bad)?,
            Money::new(req.shipping_price).map_err(bad)?,
            Money::new(req.total_price).map_err(bad)?,
        )
        .map_err(bad)?;

        Ok(Self {
            email,
            items,
            shipping_address: req.shipping_address.into(),
            payment_method: req.payment_method,
            amounts,
        })
    }
}

/// Body of `PUT /orders/{id}/ship`. The whole body is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipRequest {
    /// Carrier tracking number; generated when absent.
    pub tracking_number: Option<String>,
}

/// An order on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    /// Order id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Notification recipient.
    pub email: String,
    /// Line items.
    pub order_items: Vec<OrderItemResponse>,
    /// Destination.
    pub shipping_address: ShippingAddressDto,
    /// Payment method label.
    pub payment_method: String,
    /// Sum of line totals.
    pub items_price: Decimal,
    /// Tax charged.
    pub tax_price: Decimal,
    /// Shipping charged.
    pub shipping_price: Decimal,
    /// Grand total.
    pub total_price: Decimal,
    /// Lifecycle status.
    pub status: String,
    /// Tracking number, present once shipped.
    pub tracking_number: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Shipment time.
    pub shipped_at: Option<DateTime<Utc>>,
    /// Delivery time.
    pub delivered_at: Option<DateTime<Utc>>,
}

/// One line item on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    /// Product id.
    pub product_id: String,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Quantity ordered.
    pub qty: u32,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            email: order.email.to_string(),
            order_items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    name: item.name,
                    price: item.unit_price.amount(),
                    qty: item.qty.value(),
                })
                .collect(),
            shipping_address: order.shipping_address.into(),
            payment_method: order.payment_method,
            items_price: order.amounts.items_price.amount(),
            tax_price: order.amounts.tax_price.amount(),
            shipping_price: order.amounts.shipping_price.amount(),
            total_price: order.amounts.total_price.amount(),
            status: order.status.to_string(),
            tracking_number: order.tracking_number.map(|t| t.to_string()),
            created_at: order.created_at,
            shipped_at: order.shipped_at,
            delivered_at: order.delivered_at,
        }
    }
}

/// Pagination and filter query parameters for listings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Page size (default 20, max 100).
    pub limit: Option<u32>,
    /// `createdAt` (default) or `totalPrice`.
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default).
    pub sort_order: Option<String>,
    /// Status filter for the admin listing.
    pub status: Option<String>,
}

impl ListParams {
    /// Turn the raw parameters into a clamped page request.
    pub fn to_page(&self) -> Page {
        let sort_by = match self.sort_by.as_deref() {
            Some("totalPrice" | "total_price") => SortBy::TotalPrice,
            _ => SortBy::CreatedAt,
        };
        let sort_order = match self.sort_order.as_deref() {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        };
        Page::new(self.page.unwrap_or(1), self.limit.unwrap_or(20)).sorted(sort_by, sort_order)
    }

    /// Parse the optional status filter.
    pub fn status_filter(&self) -> Result<Option<OrderStatus>, ApiError> {
        self.status
            .as_deref()
            .map(|s| s.parse::<OrderStatus>().map_err(ApiError::bad_request))
            .transpose()
    }
}

/// A page of orders on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersPageResponse {
    /// Orders on this page.
    pub orders: Vec<OrderResponse>,
    /// Total matching orders.
    pub total: u64,
    /// Page number served.
    pub page: u32,
    /// Total pages.
    pub pages: u32,
}

impl From<PageOf<Order>> for OrdersPageResponse {
    fn from(page: PageOf<Order>) -> Self {
        Self {
            orders: page.items.into_iter().map(OrderResponse::from).collect(),
            total: page.total,
            page: page.page,
            pages: page.pages,
        }
    }
}

/// The admin listing: a page of orders plus the cancelled count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrdersResponse {
    /// The requested page.
    #[serde(flatten)]
    pub page: OrdersPageResponse,
    /// Cancelled orders across the whole store.
    pub cancelled_count: u64,
}

impl From<OrderListing> for AdminOrdersResponse {
    fn from(listing: OrderListing) -> Self {
        Self {
            page: listing.orders.into(),
            cancelled_count: listing.cancelled_count,
        }
    }
}

/// The stats ledger on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Aggregate revenue.
    pub total_revenue: Decimal,
    /// Orders ever created.
    pub total_orders: u64,
    /// Orders cancelled.
    pub cancelled_orders: u64,
}

impl From<StatsLedger> for StatsResponse {
    fn from(ledger: StatsLedger) -> Self {
        Self {
            total_revenue: ledger.total_revenue.amount(),
            total_orders: ledger.total_orders,
            cancelled_orders: ledger.cancelled_orders,
        }
    }
}
