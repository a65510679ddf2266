//! HTTP error envelope and the mapping from engine errors to statuses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orderline::OrderError;
use serde_json::json;
use tracing::error;

/// An API error: a status code plus a `{"message": ...}` body.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// A 400 with the given message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// The 401 returned when no caller identity accompanies a request.
    pub fn unauthenticated() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Missing or invalid caller identity".to_string(),
        }
    }

    /// A 404 with the given message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        let status = match &err {
            OrderError::Validation(_)
            | OrderError::InsufficientStock { .. }
            | OrderError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            OrderError::Unauthorized(_) => StatusCode::FORBIDDEN,
            OrderError::Store(store_err) => {
                error!(error = %store_err, "request failed in the persistence layer");
                return Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Internal server error".to_string(),
                };
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderline::{LifecycleAction, OrderId, OrderStatus, StoreError};

    #[test]
    fn engine_errors_map_to_expected_statuses() {
        let cases: Vec<(OrderError, StatusCode)> = vec![
            (
                OrderError::OrderNotFound(OrderId::generate()),
                StatusCode::NOT_FOUND,
            ),
            (
                OrderError::Unauthorized("nope".to_string()),
                StatusCode::FORBIDDEN,
            ),
            (
                OrderError::InvalidTransition {
                    current: OrderStatus::Delivered,
                    attempted: LifecycleAction::Cancel,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                OrderError::Store(StoreError::ConnectionFailed("down".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, expected);
        }
    }

    #[test]
    fn store_errors_do_not_leak_details() {
        let api: ApiError =
            OrderError::Store(StoreError::ConnectionFailed("secret dsn".to_string())).into();
        assert_eq!(api.message, "Internal server error");
    }
}
