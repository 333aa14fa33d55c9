//! Order service API server entry point.

use axum::Router;
use orderservice_core::model::Order;
use orderservice_store::{PgDataContext, StoreConfig, order_factory, schema};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use orderservice_api::config::ServerConfig;
use orderservice_api::error::AppError;
use orderservice_api::routes;
use orderservice_api::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting order service API server");

    // Read configuration from environment.
    let store_config = StoreConfig::from_env()?;
    let server_config = ServerConfig::from_env()?;

    let context = PgDataContext::connect(&store_config).await?;
    if server_config.migrate_on_start {
        schema::upgrade(context.pool()).await?;
    } else {
        let status = schema::status(context.pool()).await?;
        if !status.is_current() {
            tracing::warn!(
                applied = ?status.applied.last(),
                latest = ?status.latest,
                "order schema is behind; set ORDERS_MIGRATE_ON_START=true or upgrade it"
            );
        }
    }

    tracing::info!(
        strategy = %store_config.repository.concurrency,
        "order repository configured"
    );
    let orders = order_factory(context, store_config.repository).create::<Order>()?;
    let app_state = AppState::new(orders);

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/orders", routes::orders::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!("Listening on {}", server_config.addr);
    let listener = tokio::net::TcpListener::bind(server_config.addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
