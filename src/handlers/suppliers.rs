use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    auth::{AuthUser, UserRole},
    errors::ApiError,
    handlers::AppState,
    services::suppliers::{
        BalanceOperation, CreateSupplierRequest, SupplierResponse, UpdateSupplierRequest,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

const WRITE_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Manager];

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustBalanceRequest {
    pub amount: Decimal,
    pub operation: BalanceOperation,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_supplier).get(list_suppliers))
        .route(
            "/:id",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
        .route("/:id/balance", post(adjust_balance))
}

async fn create_supplier(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateSupplierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(WRITE_ROLES).map_err(map_service_error)?;
    validate_input(&payload)?;

    let supplier = state
        .services
        .suppliers
        .create_supplier(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(SupplierResponse::from(supplier)))
}

async fn get_supplier(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(supplier_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = state
        .services
        .suppliers
        .get_supplier(supplier_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Supplier {} not found", supplier_id)))?;

    Ok(success_response(SupplierResponse::from(supplier)))
}

async fn list_suppliers(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (suppliers, total) = state
        .services
        .suppliers
        .list_suppliers(pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    let data: Vec<SupplierResponse> = suppliers.into_iter().map(SupplierResponse::from).collect();

    Ok(success_response(PaginatedResponse::new(
        data,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

async fn update_supplier(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(supplier_id): Path<Uuid>,
    Json(payload): Json<UpdateSupplierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(WRITE_ROLES).map_err(map_service_error)?;
    validate_input(&payload)?;

    let supplier = state
        .services
        .suppliers
        .update_supplier(supplier_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(SupplierResponse::from(supplier)))
}

async fn delete_supplier(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(supplier_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(WRITE_ROLES).map_err(map_service_error)?;

    state
        .services
        .suppliers
        .delete_supplier(supplier_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Adjust the supplier's running balance; decreases floor at zero.
async fn adjust_balance(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(supplier_id): Path<Uuid>,
    Json(payload): Json<AdjustBalanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(WRITE_ROLES).map_err(map_service_error)?;

    let supplier = state
        .services
        .suppliers
        .adjust_balance(supplier_id, payload.amount, payload.operation)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(SupplierResponse::from(supplier)))
}
