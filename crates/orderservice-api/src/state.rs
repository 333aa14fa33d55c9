//! Shared application state.

use std::sync::Arc;

use orderservice_core::model::Order;
use orderservice_core::repository::Repository;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository for the `Order` aggregate.
    pub orders: Arc<dyn Repository<Order>>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(orders: Arc<dyn Repository<Order>>) -> Self {
        Self { orders }
    }
}
