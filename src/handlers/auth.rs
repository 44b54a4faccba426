use super::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    handlers::AppState,
    services::users::{LoginRequest, RegisterUserRequest},
};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

/// Self-service registration payload. Role is always `staff`; privileged
/// accounts are created by an admin through the users API.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(me))
}

/// Exchange credentials for a bearer token.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let user = state
        .services
        .users
        .authenticate(&payload.email, &payload.password)
        .await
        .map_err(map_service_error)?;

    let token = state.auth.issue_token(&user).map_err(map_service_error)?;

    info!(user_id = %user.id, "User logged in");

    Ok(success_response(serde_json::json!({
        "token": token,
        "user": user,
    })))
}

/// Self-service signup; always creates a staff account.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let user = state
        .services
        .users
        .register(RegisterUserRequest {
            email: payload.email,
            password: payload.password,
            name: payload.name,
            role: None,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(user))
}

/// The profile behind the presented token.
async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .services
        .users
        .get_user(user.user_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound("User no longer exists".to_string()))?;

    Ok(success_response(profile))
}
