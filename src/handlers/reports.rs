use super::common::{map_service_error, success_response};
use crate::{auth::AuthUser, errors::ApiError, handlers::AppState};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SalesWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/sales", get(sales))
        .route("/low-stock", get(low_stock))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .reports
        .dashboard_summary()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(summary))
}

async fn sales(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(window): Query<SalesWindow>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .reports
        .sales_summary(window.from, window.to)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(summary))
}

async fn low_stock(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .reports
        .low_stock_report()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(products))
}
