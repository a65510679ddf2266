//! The Orderline API server.
//!
//! Picks its persistence backend from the environment: with `DATABASE_URL`
//! set it runs on PostgreSQL (applying migrations at startup), otherwise it
//! falls back to the in-memory adapters for local development.

use std::sync::Arc;

use orderline::{LifecycleCoordinator, NoopNotifier};
use orderline_http::app;
use orderline_memory::{InMemoryOrderStore, InMemoryStatsAggregator, InMemoryStockLedger};
use orderline_postgres::{PostgresOrderStore, PostgresStatsAggregator, PostgresStockLedger};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let coordinator = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            info!("starting with the postgres backend");
            let pool = orderline_postgres::connect(url).await?;
            orderline_postgres::migrate(&pool).await?;
            LifecycleCoordinator::new(
                Arc::new(PostgresStockLedger::from_pool(pool.clone())),
                Arc::new(PostgresOrderStore::from_pool(pool.clone())),
                Arc::new(PostgresStatsAggregator::from_pool(pool)),
                Arc::new(NoopNotifier),
            )
        }
        Err(_) => {
            info!("DATABASE_URL not set, starting with the in-memory backend");
            LifecycleCoordinator::new(
                Arc::new(InMemoryStockLedger::new()),
                Arc::new(InMemoryOrderStore::new()),
                Arc::new(InMemoryStatsAggregator::new()),
                Arc::new(NoopNotifier),
            )
        }
    };

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "orderline server listening");
    axum::serve(listener, app(coordinator)).await?;
    Ok(())
}
