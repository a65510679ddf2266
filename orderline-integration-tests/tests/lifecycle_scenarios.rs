//! End-to-end lifecycle scenarios over the in-memory adapters.

use std::sync::Arc;
use std::time::Duration;

use orderline::{
    LifecycleCoordinator, Money, NotificationKind, OrderError, OrderStatus, Quantity,
    StatsAggregator, StockLedger,
};
use orderline_integration_tests::{admin, customer, draft, engine_with_stock, product};
use orderline_memory::{InMemoryOrderStore, InMemoryStatsAggregator, InMemoryStockLedger, RecordingNotifier};

async fn settle() {
    // Let fire-and-forget notification tasks run.
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn last_unit_goes_to_exactly_one_buyer() {
    let pid = product("LASTONE1");
    let engine = engine_with_stock([(pid.clone(), 1)]);

    let winner = engine
        .coordinator
        .create_order(&customer("cust-1"), draft(&pid, 1, 4_999))
        .await
        .unwrap();
    assert_eq!(winner.status, OrderStatus::Processing);

    let err = engine
        .coordinator
        .create_order(&customer("cust-2"), draft(&pid, 1, 4_999))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Not enough stock for {pid}. Only 0 available.")
    );

    assert_eq!(
        engine.stock.available(&pid).await.unwrap(),
        Some(Quantity::zero())
    );
    let stats = engine.stats.snapshot().await.unwrap();
    assert_eq!(stats.total_orders, 1);
    assert_eq!(stats.total_revenue.to_cents(), 4_999);
}

#[tokio::test]
async fn cancellation_restores_stock_and_reverses_revenue() {
    let pid = product("RESTORE1");
    let engine = engine_with_stock([(pid.clone(), 5)]);
    let buyer = customer("cust-1");

    let order = engine
        .coordinator
        .create_order(&buyer, draft(&pid, 3, 1_000))
        .await
        .unwrap();
    assert_eq!(
        engine.stock.available(&pid).await.unwrap(),
        Some(Quantity::new(2).unwrap())
    );

    let shipped = engine
        .coordinator
        .mark_shipped(&order.id, &admin(), None)
        .await
        .unwrap();
    assert!(shipped.tracking_number.is_some());

    let cancelled = engine
        .coordinator
        .cancel_order(&order.id, &buyer)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    assert_eq!(
        engine.stock.available(&pid).await.unwrap(),
        Some(Quantity::new(5).unwrap())
    );
    let stats = engine.stats.snapshot().await.unwrap();
    assert_eq!(stats.total_revenue, Money::zero());
    assert_eq!(stats.total_orders, 1);
    assert_eq!(stats.cancelled_orders, 1);

    settle().await;
    let kinds: Vec<NotificationKind> = engine
        .notifier
        .sent()
        .into_iter()
        .map(|(kind, _)| kind)
        .collect();
    assert!(kinds.contains(&NotificationKind::Created));
    assert!(kinds.contains(&NotificationKind::Shipped));
    assert!(kinds.contains(&NotificationKind::Cancelled));
}

#[tokio::test]
async fn shipping_twice_is_rejected() {
    let pid = product("DOUBLE1");
    let engine = engine_with_stock([(pid.clone(), 2)]);

    let order = engine
        .coordinator
        .create_order(&customer("cust-1"), draft(&pid, 1, 2_500))
        .await
        .unwrap();

    engine
        .coordinator
        .mark_shipped(&order.id, &admin(), None)
        .await
        .unwrap();

    let err = engine
        .coordinator
        .mark_shipped(&order.id, &admin(), None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Cannot ship an order that is shipped");
}

#[tokio::test]
async fn terminal_orders_are_immutable() {
    let pid = product("FINAL1");
    let engine = engine_with_stock([(pid.clone(), 2)]);
    let buyer = customer("cust-1");

    let order = engine
        .coordinator
        .create_order(&buyer, draft(&pid, 1, 2_500))
        .await
        .unwrap();
    engine
        .coordinator
        .mark_shipped(&order.id, &admin(), None)
        .await
        .unwrap();
    engine
        .coordinator
        .mark_delivered(&order.id, &admin())
        .await
        .unwrap();

    let err = engine
        .coordinator
        .cancel_order(&order.id, &buyer)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Cannot cancel a delivered order");
    assert!(matches!(
        engine.coordinator.mark_shipped(&order.id, &admin(), None).await,
        Err(OrderError::InvalidTransition { .. })
    ));
    assert!(matches!(
        engine.coordinator.mark_delivered(&order.id, &admin()).await,
        Err(OrderError::InvalidTransition { .. })
    ));

    // No stock came back from the rejected cancellations.
    assert_eq!(
        engine.stock.available(&pid).await.unwrap(),
        Some(Quantity::new(1).unwrap())
    );
}

#[tokio::test]
async fn repeated_cancellation_releases_stock_once() {
    let pid = product("ONCE1");
    let engine = engine_with_stock([(pid.clone(), 4)]);
    let buyer = customer("cust-1");

    let order = engine
        .coordinator
        .create_order(&buyer, draft(&pid, 4, 1_000))
        .await
        .unwrap();
    engine.coordinator.cancel_order(&order.id, &buyer).await.unwrap();

    let err = engine
        .coordinator
        .cancel_order(&order.id, &buyer)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Order is already cancelled");

    // Released exactly once: back to 4, not 8.
    assert_eq!(
        engine.stock.available(&pid).await.unwrap(),
        Some(Quantity::new(4).unwrap())
    );
    assert_eq!(engine.stats.snapshot().await.unwrap().cancelled_orders, 1);
}

#[tokio::test]
async fn failing_notifier_never_fails_lifecycle_operations() {
    let pid = product("ISOLATE1");
    let stock = Arc::new(InMemoryStockLedger::with_stock([(
        pid.clone(),
        Quantity::new(3).unwrap(),
    )]));
    let notifier = Arc::new(RecordingNotifier::failing());
    let coordinator = LifecycleCoordinator::new(
        stock.clone(),
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(InMemoryStatsAggregator::new()),
        notifier.clone(),
    );
    let buyer = customer("cust-1");

    let order = coordinator
        .create_order(&buyer, draft(&pid, 1, 1_000))
        .await
        .unwrap();
    coordinator
        .mark_shipped(&order.id, &admin(), None)
        .await
        .unwrap();
    coordinator.cancel_order(&order.id, &buyer).await.unwrap();

    settle().await;
    // Every dispatch was attempted even though each one failed.
    assert_eq!(notifier.sent().len(), 3);
}
