//! Shared test repositories and fixtures for the order service.

mod fixtures;
mod repository;

pub use fixtures::{order_with_lines, rick_sanchez_order};
pub use repository::{FailingOrderRepository, InMemoryOrderRepository};
