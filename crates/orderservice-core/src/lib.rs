//! Order Service Core — aggregate model and persistence abstractions.
//!
//! This crate defines the `Order` aggregate, the repository and connection
//! provider traits, the concurrency-control configuration, and the
//! reconciliation planner shared by every repository implementation. It
//! contains no infrastructure code.

pub mod concurrency;
pub mod context;
pub mod error;
pub mod factory;
pub mod model;
pub mod reconcile;
pub mod repository;
