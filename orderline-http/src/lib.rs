//! HTTP surface for the Orderline order engine.
//!
//! A thin axum layer over [`LifecycleCoordinator`]: handlers parse wire
//! DTOs into domain types, pass the authenticated actor through, and map
//! engine errors onto HTTP statuses. All authorization decisions live in
//! the engine, not here.
//!
//! | Route | Method | Who |
//! |---|---|---|
//! | `/orders` | POST | any authenticated user |
//! | `/orders` | GET | admin |
//! | `/orders/my-orders` | GET | any authenticated user |
//! | `/orders/admin/stats` | GET | admin |
//! | `/orders/{id}` | GET | owner or admin |
//! | `/orders/{id}/ship` | PUT | admin |
//! | `/orders/{id}/deliver` | PUT | admin |
//! | `/orders/{id}/cancel` | PUT | owner or admin |

use axum::routing::{get, post, put};
use axum::Router;
use orderline::LifecycleCoordinator;

pub mod dto;
pub mod error;
mod routes;

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The engine façade.
    pub coordinator: LifecycleCoordinator,
}

/// Build the API router over a coordinator.
pub fn app(coordinator: LifecycleCoordinator) -> Router {
    let state = AppState { coordinator };
    Router::new()
        .route("/orders", post(routes::create_order).get(routes::list_orders))
        .route("/orders/my-orders", get(routes::list_my_orders))
        .route("/orders/admin/stats", get(routes::get_stats))
        .route("/orders/{id}", get(routes::get_order))
        .route("/orders/{id}/ship", put(routes::mark_shipped))
        .route("/orders/{id}/deliver", put(routes::mark_delivered))
        .route("/orders/{id}/cancel", put(routes::cancel_order))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use orderline::{NoopNotifier, ProductId, Quantity};
    use orderline_memory::{InMemoryOrderStore, InMemoryStatsAggregator, InMemoryStockLedger};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn product() -> ProductId {
        ProductId::try_new("PRD-WIDGET1").unwrap()
    }

    fn test_app() -> Router {
        let stock = Arc::new(InMemoryStockLedger::with_stock([(
            product(),
            Quantity::new(10).unwrap(),
        )]));
        let coordinator = LifecycleCoordinator::new(
            stock,
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryStatsAggregator::new()),
            Arc::new(NoopNotifier),
        );
        app(coordinator)
    }

    fn order_body(product_id: &str, qty: u32, unit: &str, total: &str) -> Value {
        json!({
            "email": "buyer@example.com",
            "orderItems": [
                {"productId": product_id, "name": "Widget", "price": unit, "qty": qty}
            ],
            "shippingAddress": {
                "address": "1 Main St",
                "city": "Springfield",
                "postalCode": "12345",
                "country": "US"
            },
            "paymentMethod": "card",
            "itemsPrice": total,
            "taxPrice": "0",
            "shippingPrice": "0",
            "totalPrice": total
        })
    }

    fn request(method: &str, uri: &str, user: Option<(&str, &str)>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some((id, role)) = user {
            builder = builder.header("x-user-id", id).header("x-user-role", role);
        }
        let body = match body {
            Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
            None => Body::empty(),
        };
        builder.body(body).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_order(app: &Router, user: &str, qty: u32) -> (StatusCode, Value) {
        let total = format!("{}.00", 10 * qty);
        send(
            app,
            request(
                "POST",
                "/orders",
                Some((user, "customer")),
                Some(order_body("PRD-WIDGET1", qty, "10.00", &total)),
            ),
        )
        .await
    }

    #[tokio::test]
    async fn create_order_returns_201() {
        let app = test_app();
        let (status, body) = create_order(&app, "cust-1", 2).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "processing");
        assert_eq!(body["totalPrice"], "20.00");
        assert!(body["id"].as_str().unwrap().starts_with("ORD-"));
        assert_eq!(body["userId"], "cust-1");
    }

    #[tokio::test]
    async fn create_without_identity_is_401() {
        let app = test_app();
        let (status, _) = send(
            &app,
            request(
                "POST",
                "/orders",
                None,
                Some(order_body("PRD-WIDGET1", 1, "10.00", "10.00")),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn oversized_order_is_rejected_with_availability() {
        let app = test_app();
        let (status, body) = create_order(&app, "cust-1", 50).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Not enough stock for PRD-WIDGET1. Only 10 available."
        );
    }

    #[tokio::test]
    async fn unknown_product_is_rejected() {
        let app = test_app();
        let (status, body) = send(
            &app,
            request(
                "POST",
                "/orders",
                Some(("cust-1", "customer")),
                Some(order_body("PRD-GHOST", 1, "10.00", "10.00")),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Product PRD-GHOST is no longer available");
    }

    #[tokio::test]
    async fn only_admins_ship_and_deliver() {
        let app = test_app();
        let (_, created) = create_order(&app, "cust-1", 1).await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = send(
            &app,
            request(
                "PUT",
                &format!("/orders/{id}/ship"),
                Some(("cust-1", "customer")),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, shipped) = send(
            &app,
            request(
                "PUT",
                &format!("/orders/{id}/ship"),
                Some(("admin-1", "admin")),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shipped["status"], "shipped");
        assert!(shipped["trackingNumber"]
            .as_str()
            .unwrap()
            .starts_with("TRK-"));

        let (status, delivered) = send(
            &app,
            request(
                "PUT",
                &format!("/orders/{id}/deliver"),
                Some(("admin-1", "admin")),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(delivered["status"], "delivered");
    }

    #[tokio::test]
    async fn cancellation_messages_distinguish_repeat_and_delivered() {
        let app = test_app();
        let (_, created) = create_order(&app, "cust-1", 1).await;
        let id = created["id"].as_str().unwrap().to_string();

        let cancel = |app: &Router, id: String| {
            let req = request(
                "PUT",
                &format!("/orders/{id}/cancel"),
                Some(("cust-1", "customer")),
                None,
            );
            let app = app.clone();
            async move { send(&app, req).await }
        };

        let (status, cancelled) = cancel(&app, id.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "cancelled");

        let (status, body) = cancel(&app, id).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Order is already cancelled");

        // Deliver a second order, then try to cancel it.
        let (_, second) = create_order(&app, "cust-1", 1).await;
        let id = second["id"].as_str().unwrap();
        for step in ["ship", "deliver"] {
            let (status, _) = send(
                &app,
                request(
                    "PUT",
                    &format!("/orders/{id}/{step}"),
                    Some(("admin-1", "admin")),
                    None,
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = cancel(&app, id.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Cannot cancel a delivered order");
    }

    #[tokio::test]
    async fn orders_are_visible_to_owner_and_admin_only() {
        let app = test_app();
        let (_, created) = create_order(&app, "cust-1", 1).await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = send(
            &app,
            request("GET", &format!("/orders/{id}"), Some(("cust-2", "customer")), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            request("GET", &format!("/orders/{id}"), Some(("cust-1", "customer")), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            request("GET", "/orders/ORD-MISSING1", Some(("admin-1", "admin")), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listings_and_stats_enforce_roles() {
        let app = test_app();
        create_order(&app, "cust-1", 1).await;
        create_order(&app, "cust-1", 2).await;

        let (status, mine) = send(
            &app,
            request("GET", "/orders/my-orders", Some(("cust-1", "customer")), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine["total"], 2);

        let (status, _) = send(
            &app,
            request("GET", "/orders", Some(("cust-1", "customer")), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, all) = send(
            &app,
            request(
                "GET",
                "/orders?status=processing&sortBy=totalPrice&sortOrder=asc",
                Some(("admin-1", "admin")),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all["total"], 2);
        assert_eq!(all["cancelledCount"], 0);
        assert_eq!(all["orders"][0]["totalPrice"], "10.00");

        let (status, _) = send(
            &app,
            request("GET", "/orders/admin/stats", Some(("cust-1", "customer")), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, stats) = send(
            &app,
            request("GET", "/orders/admin/stats", Some(("admin-1", "admin")), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["totalOrders"], 2);
        assert_eq!(stats["totalRevenue"], "30.00");
    }
}

