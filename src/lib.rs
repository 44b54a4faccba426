//! Stockflow API Library
//!
//! Inventory and order management backend. The fulfillment core (stock
//! ledger, order assembly, lifecycle, sequence generation) lives in
//! `services`; `handlers` exposes it as an authenticated JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use http::HeaderValue;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
    pub auth: Arc<auth::AuthService>,
}

/// Assembles the full application router with its middleware stack.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);
    let timeout = TimeoutLayer::new(Duration::from_secs(state.config.request_timeout_secs));

    let api = Router::new()
        .nest("/auth", handlers::auth::routes())
        .nest("/products", handlers::products::routes())
        .nest("/suppliers", handlers::suppliers::routes())
        .nest("/orders", handlers::orders::routes())
        .nest("/users", handlers::users::routes())
        .nest("/reports", handlers::reports::routes());

    Router::new()
        .nest("/health", handlers::health::routes())
        .nest("/api/v1", api)
        .merge(openapi::swagger_ui())
        .layer(axum::middleware::from_fn(tracing::propagate_request_id))
        .layer(
            TraceLayer::new_for_http().make_span_with(tracing::RequestSpanMaker::default()),
        )
        .layer(timeout)
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    match config.cors_allowed_origins.as_ref() {
        Some(raw) => {
            let origins: Vec<HeaderValue> = raw
                .split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        // Only reachable in development; config validation requires explicit
        // origins everywhere else.
        None => CorsLayer::permissive(),
    }
}
