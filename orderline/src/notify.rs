//! The outbound notification seam.
//!
//! Rendering and delivery (HTML email, etc.) belong to an external
//! collaborator. The engine only dispatches fire-and-forget events after a
//! lifecycle transition commits; a failed or slow notifier must never block
//! or fail the transition itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::errors::NotifyError;
use crate::order::Order;

/// The lifecycle event a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Order created.
    Created,
    /// Order shipped.
    Shipped,
    /// Order delivered.
    Delivered,
    /// Order cancelled.
    Cancelled,
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Shipped => f.write_str("shipped"),
            Self::Delivered => f.write_str("delivered"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Outbound notifications to the order's customer.
///
/// The recipient is the order's email; implementations decide transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one notification. Errors are logged by the dispatcher, never
    /// propagated to lifecycle callers.
    async fn notify(&self, kind: NotificationKind, order: &Order) -> Result<(), NotifyError>;
}

/// A notifier that drops everything, for callers that opt out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _kind: NotificationKind, _order: &Order) -> Result<(), NotifyError> {
        Ok(())
    }
}
