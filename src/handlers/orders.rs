use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginationParams,
};
use crate::{
    auth::{AuthUser, UserRole},
    errors::ApiError,
    handlers::AppState,
    services::order_status::OrderStatus,
    services::orders::{CreateOrderRequest, UpdateOrderRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransitionStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderListFilters {
    pub status: Option<String>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route(
            "/:id",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/:id/status", post(transition_status))
}

/// Create an order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = crate::services::orders::OrderResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .create_order(payload, Some(user.user_id))
        .await
        .map_err(map_service_error)?;

    info!(order_number = %order.order_number, "Order created via API");

    Ok(created_response(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(order_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// List orders newest-first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Order list"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(pagination): Query<PaginationParams>,
    Query(filters): Query<OrderListFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let status = filters
        .status
        .as_deref()
        .map(OrderStatus::parse)
        .transpose()
        .map_err(map_service_error)?;

    let orders = state
        .services
        .orders
        .list_orders(pagination.page, pagination.per_page, status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

/// Full edit of a pending order
async fn update_order(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .update_order(order_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Move an order through its lifecycle
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/status",
    request_body = TransitionStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn transition_status(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<TransitionStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .order_status
        .transition(order_id, &payload.status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

async fn delete_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(&[UserRole::Admin, UserRole::Manager])
        .map_err(map_service_error)?;

    state
        .services
        .orders
        .delete_order(order_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
