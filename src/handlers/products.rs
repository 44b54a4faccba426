use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    auth::{AuthUser, UserRole},
    errors::ApiError,
    handlers::AppState,
    services::inventory::StockOperation,
    services::products::{
        CreateProductRequest, ProductListParams, ProductResponse, UpdateProductRequest,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

const WRITE_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Manager];

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    pub quantity: i32,
    pub operation: StockOperation,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/:id/stock", post(adjust_stock))
        .route("/:id/low-stock", get(low_stock))
}

/// Create a product
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate SKU", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(WRITE_ROLES).map_err(map_service_error)?;

    let product = state
        .services
        .products
        .create_product(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ProductResponse::from(product)))
}

/// List products with filters
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(PaginationParams, ProductListParams),
    responses(
        (status = 200, description = "Product list"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(pagination): Query<PaginationParams>,
    Query(filters): Query<ProductListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (products, total) = state
        .services
        .products
        .list_products(pagination.page, pagination.per_page, filters)
        .await
        .map_err(map_service_error)?;

    let data: Vec<ProductResponse> = products.into_iter().map(ProductResponse::from).collect();

    Ok(success_response(PaginatedResponse::new(
        data,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_product(product_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Product {} not found", product_id)))?;

    Ok(success_response(ProductResponse::from(product)))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(WRITE_ROLES).map_err(map_service_error)?;
    validate_input(&payload)?;

    let product = state
        .services
        .products
        .update_product(product_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductResponse::from(product)))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(WRITE_ROLES).map_err(map_service_error)?;

    state
        .services
        .products
        .delete_product(product_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Manual stock adjustment through the inventory ledger
#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/stock",
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = ProductResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(WRITE_ROLES).map_err(map_service_error)?;

    let product = state
        .services
        .inventory
        .adjust_stock(product_id, payload.quantity, payload.operation)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductResponse::from(product)))
}

async fn low_stock(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let low_stock = state
        .services
        .inventory
        .is_low_stock(product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "product_id": product_id,
        "low_stock": low_stock,
    })))
}
