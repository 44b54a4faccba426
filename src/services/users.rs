use crate::{
    auth::UserRole,
    db::DbPool,
    entities::user::{self, Entity as UserEntity, Model as UserModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set, SqlErr,
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// One of admin, manager, staff; defaults to staff
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Registers a user with an argon2-hashed password. Emails are stored
    /// lowercased and are unique (`Conflict` on duplicates).
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterUserRequest) -> Result<UserModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let role = match &request.role {
            Some(role) => UserRole::from_str(role).map_err(|_| {
                ServiceError::ValidationError(format!("unknown role '{}'", role))
            })?,
            None => UserRole::Staff,
        };

        let password_hash = hash_password(&request.password)?;
        let email = request.email.trim().to_lowercase();

        let db = &*self.db_pool;
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            name: Set(request.name),
            role: Set(role.to_string()),
            is_active: Set(true),
            ..Default::default()
        };

        let created = model.insert(db).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                ServiceError::Conflict(format!("email '{}' already registered", email))
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        info!(user_id = %created.id, "User registered");

        if let Err(e) = self.event_sender.send(Event::UserRegistered(created.id)).await {
            warn!("Failed to send user registered event: {}", e);
        }

        Ok(created)
    }

    /// Checks credentials. Missing user, wrong password and deactivated
    /// account all collapse into the same `Unauthorized` so the response
    /// does not reveal which one it was.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserModel, ServiceError> {
        let db = &*self.db_pool;

        let user = UserEntity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let user = match user {
            Some(user) if user.is_active => user,
            _ => {
                return Err(ServiceError::Unauthorized(
                    "invalid credentials".to_string(),
                ))
            }
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(ServiceError::Unauthorized(
                "invalid credentials".to_string(),
            ));
        }

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<UserModel>, ServiceError> {
        let db = &*self.db_pool;
        UserEntity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<UserModel>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = UserEntity::find()
            .order_by_asc(user::Column::Email)
            .paginate(db, per_page.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let users = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((users, total))
    }

    /// Deactivates a user account; their tokens stop working at expiry.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn deactivate_user(&self, user_id: Uuid) -> Result<UserModel, ServiceError> {
        let db = &*self.db_pool;

        let existing = UserEntity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let mut active: user::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Some(chrono::Utc::now()));

        let updated = active.update(db).await.map_err(ServiceError::DatabaseError)?;
        info!(user_id = %user_id, "User deactivated");
        Ok(updated)
    }
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("failed to hash password: {}", e)))
}

fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ServiceError::InternalError(format!("corrupt password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn corrupt_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("pw", "not-a-phc-string"),
            Err(ServiceError::InternalError(_))
        ));
    }

    #[test]
    fn register_request_validation() {
        let request = RegisterUserRequest {
            email: "ops@example.com".into(),
            password: "short".into(),
            name: "Ops".into(),
            role: None,
        };
        assert!(request.validate().is_err());
    }
}
