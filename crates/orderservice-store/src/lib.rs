//! Order Service Store — PostgreSQL persistence for the `Order` aggregate.
//!
//! Provides the connection provider, the repository with its three
//! concurrency-control strategies, the caller-owned unit of work, the schema
//! version manager, and environment configuration.

use std::sync::Arc;

use orderservice_core::concurrency::RepositoryOptions;
use orderservice_core::factory::RepositoryFactory;
use orderservice_core::model::Order;

pub mod config;
pub mod context;
mod error;
pub mod pg_order_repository;
pub mod schema;
mod statements;
pub mod unit_of_work;

pub use config::{ConfigError, StoreConfig};
pub use context::PgDataContext;
pub use pg_order_repository::PgOrderRepository;
pub use unit_of_work::PgUnitOfWork;

/// Builds a factory with the `Order` repository registered over `context`.
#[must_use]
pub fn order_factory(
    context: PgDataContext,
    options: RepositoryOptions,
) -> RepositoryFactory<PgDataContext> {
    RepositoryFactory::new(context).register::<Order, _>(move |ctx: &PgDataContext| {
        Arc::new(PgOrderRepository::new(ctx.clone(), options))
    })
}
