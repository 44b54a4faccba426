use super::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    auth::{AuthUser, UserRole},
    errors::ApiError,
    handlers::AppState,
    services::users::RegisterUserRequest,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_user).get(list_users))
        .route("/:id", get(get_user))
        .route("/:id/deactivate", post(deactivate_user))
}

/// Admin user creation; unlike self-service signup this may assign any role.
async fn create_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(&[UserRole::Admin]).map_err(map_service_error)?;
    validate_input(&payload)?;

    let created = state
        .services
        .users
        .register(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(created))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(&[UserRole::Admin]).map_err(map_service_error)?;

    let found = state
        .services
        .users
        .get_user(user_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", user_id)))?;

    Ok(success_response(found))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(&[UserRole::Admin]).map_err(map_service_error)?;

    let (users, total) = state
        .services
        .users
        .list_users(pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        users,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_any(&[UserRole::Admin]).map_err(map_service_error)?;

    let updated = state
        .services
        .users
        .deactivate_user(user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(updated))
}
