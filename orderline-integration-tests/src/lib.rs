//! Shared fixtures for the cross-crate integration tests.
//!
//! Everything here wires a real [`LifecycleCoordinator`] over the in-memory
//! adapters, exactly the way the server binary does in development mode.

use std::sync::Arc;

use orderline::{
    Actor, CustomerEmail, LifecycleCoordinator, Money, Notifier, OrderAmounts, OrderDraft,
    OrderItem, ProductId, Quantity, Role, ShippingAddress, StatsAggregator, StockLedger, UserId,
};
use orderline_memory::{
    InMemoryOrderStore, InMemoryStatsAggregator, InMemoryStockLedger, RecordingNotifier,
};

/// A coordinator plus handles to its adapters, for assertions.
pub struct Engine {
    /// The coordinator under test.
    pub coordinator: LifecycleCoordinator,
    /// Handle to the stock ledger for seeding and availability checks.
    pub stock: Arc<InMemoryStockLedger>,
    /// Handle to the stats aggregator for snapshot assertions.
    pub stats: Arc<InMemoryStatsAggregator>,
    /// Handle to the notifier to observe dispatches.
    pub notifier: Arc<RecordingNotifier>,
}

/// Build an engine with the given initial stock levels.
pub fn engine_with_stock(entries: impl IntoIterator<Item = (ProductId, u32)>) -> Engine {
    let stock = Arc::new(InMemoryStockLedger::with_stock(
        entries
            .into_iter()
            .map(|(id, qty)| (id, Quantity::for_inventory(qty).expect("valid stock level"))),
    ));
    let stats = Arc::new(InMemoryStatsAggregator::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let stock_ledger: Arc<dyn StockLedger> = stock.clone();
    let stats_aggregator: Arc<dyn StatsAggregator> = stats.clone();
    let notifier_dyn: Arc<dyn Notifier> = notifier.clone();
    let coordinator = LifecycleCoordinator::new(
        stock_ledger,
        Arc::new(InMemoryOrderStore::new()),
        stats_aggregator,
        notifier_dyn,
    );
    Engine {
        coordinator,
        stock,
        stats,
        notifier,
    }
}

/// A customer actor with the given id.
pub fn customer(id: &str) -> Actor {
    Actor::new(UserId::try_new(id).expect("valid user id"), Role::Customer)
}

/// The admin actor used across scenarios.
pub fn admin() -> Actor {
    Actor::new(UserId::try_new("admin-1").expect("valid user id"), Role::Admin)
}

/// A product id with the given suffix.
pub fn product(tag: &str) -> ProductId {
    ProductId::try_new(format!("PRD-{tag}")).expect("valid product id")
}

/// A single-line draft: `qty` units of `product_id` at `unit_cents` each.
pub fn draft(product_id: &ProductId, qty: u32, unit_cents: u64) -> OrderDraft {
    let unit = Money::from_cents(unit_cents).expect("valid unit price");
    let quantity = Quantity::new(qty).expect("valid order quantity");
    let items_price = unit
        .multiply_by_quantity(quantity)
        .expect("line total in range");
    OrderDraft {
        email: CustomerEmail::try_new("buyer@example.com").expect("valid email"),
        items: vec![OrderItem::new(
            product_id.clone(),
            "Widget".to_string(),
            unit,
            quantity,
        )],
        shipping_address: ShippingAddress {
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
        },
        payment_method: "card".to_string(),
        amounts: OrderAmounts::new(items_price, Money::zero(), Money::zero(), items_price)
            .expect("consistent amounts"),
    }
}
