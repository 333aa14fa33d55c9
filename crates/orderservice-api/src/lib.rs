//! Order Service API — HTTP surface over the order repository.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
