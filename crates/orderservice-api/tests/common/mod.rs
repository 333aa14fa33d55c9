//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use orderservice_core::concurrency::{ConcurrencyControl, RepositoryOptions};
use orderservice_store::{PgDataContext, PgOrderRepository};
use sqlx::PgPool;
use tower::ServiceExt;

use orderservice_api::routes;
use orderservice_api::state::AppState;

/// Build the full app router over a real `PgOrderRepository` with the
/// default options. Uses the same route structure as `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, ConcurrencyControl::Optimistic)
}

/// Build the full app router with the given concurrency strategy.
pub fn build_test_app_with(pool: PgPool, concurrency: ConcurrencyControl) -> Router {
    let repository = PgOrderRepository::new(
        PgDataContext::new(pool),
        RepositoryOptions::with_concurrency(concurrency),
    );
    let app_state = AppState::new(Arc::new(repository));

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/orders", routes::orders::router())
        .with_state(app_state)
}

/// Send a request with an optional JSON body and return the status and the
/// decoded body (`Null` when empty).
pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send_json(app, "GET", uri, None).await
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, "POST", uri, Some(body)).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, "PUT", uri, Some(body)).await
}
