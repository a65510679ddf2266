//! Route handlers for the order API.
//!
//! Caller identity arrives in `x-user-id` / `x-user-role` headers, supplied
//! by the authenticating proxy in front of this service. A request without
//! an identity gets a 401 before any engine call.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use orderline::{Actor, OrderDraft, OrderId, Role, TrackingNumber, UserId};

use crate::dto::{
    AdminOrdersResponse, CreateOrderRequest, ListParams, OrderResponse, OrdersPageResponse,
    ShipRequest, StatsResponse,
};
use crate::error::ApiError;
use crate::AppState;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let id = header_str(headers, "x-user-id")
        .and_then(|raw| UserId::try_new(raw).ok())
        .ok_or_else(ApiError::unauthenticated)?;
    let role = match header_str(headers, "x-user-role") {
        None => Role::Customer,
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|_| ApiError::unauthenticated())?,
    };
    Ok(Actor::new(id, role))
}

fn order_id(raw: &str) -> Result<OrderId, ApiError> {
    OrderId::try_new(raw).map_err(|_| ApiError::not_found(format!("Order {raw} not found")))
}

pub(crate) async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let actor = actor_from_headers(&headers)?;
    let draft = OrderDraft::try_from(body)?;
    let order = state.coordinator.create_order(&actor, draft).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

pub(crate) async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let order = state.coordinator.get_order(&order_id(&id)?, &actor).await?;
    Ok(Json(order.into()))
}

pub(crate) async fn list_my_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<OrdersPageResponse>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let page = state
        .coordinator
        .list_my_orders(&actor, &params.to_page())
        .await?;
    Ok(Json(page.into()))
}

pub(crate) async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<AdminOrdersResponse>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let listing = state
        .coordinator
        .list_orders(&actor, params.status_filter()?, &params.to_page())
        .await?;
    Ok(Json(listing.into()))
}

pub(crate) async fn mark_shipped(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<ShipRequest>>,
) -> Result<Json<OrderResponse>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let tracking = body
        .and_then(|Json(req)| req.tracking_number)
        .map(TrackingNumber::try_new)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let order = state
        .coordinator
        .mark_shipped(&order_id(&id)?, &actor, tracking)
        .await?;
    Ok(Json(order.into()))
}

pub(crate) async fn mark_delivered(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let order = state
        .coordinator
        .mark_delivered(&order_id(&id)?, &actor)
        .await?;
    Ok(Json(order.into()))
}

pub(crate) async fn cancel_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let order = state
        .coordinator
        .cancel_order(&order_id(&id)?, &actor)
        .await?;
    Ok(Json(order.into()))
}

pub(crate) async fn get_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let ledger = state.coordinator.stats(&actor).await?;
    Ok(Json(ledger.into()))
}
