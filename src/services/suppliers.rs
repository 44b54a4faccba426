use crate::{
    db::DbPool,
    entities::supplier::{self, Entity as SupplierEntity, Model as SupplierModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Direction of a credit balance adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BalanceOperation {
    Increase,
    Decrease,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSupplierRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub credit_limit: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSupplierRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Supplier read model including derived credit headroom.
#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierResponse {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub supplier: SupplierModel,
    pub available_credit: Decimal,
}

impl From<SupplierModel> for SupplierResponse {
    fn from(supplier: SupplierModel) -> Self {
        let available_credit = supplier.available_credit();
        Self {
            supplier,
            available_credit,
        }
    }
}

#[derive(Clone)]
pub struct SupplierService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl SupplierService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a supplier. The code is globally unique; duplicates are
    /// rejected with `Conflict`.
    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create_supplier(
        &self,
        request: CreateSupplierRequest,
    ) -> Result<SupplierModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        let credit_limit = request.credit_limit.unwrap_or(Decimal::ZERO);
        if credit_limit < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "credit_limit must not be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let code = request.code.trim().to_uppercase();

        let model = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            code: Set(code.clone()),
            contact_name: Set(request.contact_name),
            email: Set(request.email),
            phone: Set(request.phone),
            address: Set(request.address),
            credit_limit: Set(credit_limit),
            current_balance: Set(Decimal::ZERO),
            ..Default::default()
        };

        let created = model
            .insert(db)
            .await
            .map_err(|e| map_unique_violation(e, &format!("supplier code '{}'", code)))?;

        info!(supplier_id = %created.id, code = %created.code, "Supplier created");

        if let Err(e) = self
            .event_sender
            .send(Event::SupplierCreated(created.id))
            .await
        {
            warn!("Failed to send supplier created event: {}", e);
        }

        Ok(created)
    }

    #[instrument(skip(self), fields(supplier_id = %supplier_id))]
    pub async fn get_supplier(
        &self,
        supplier_id: Uuid,
    ) -> Result<Option<SupplierModel>, ServiceError> {
        let db = &*self.db_pool;
        SupplierEntity::find_by_id(supplier_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn list_suppliers(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<SupplierModel>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = SupplierEntity::find()
            .order_by_asc(supplier::Column::Name)
            .paginate(db, per_page.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let suppliers = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((suppliers, total))
    }

    #[instrument(skip(self, request), fields(supplier_id = %supplier_id))]
    pub async fn update_supplier(
        &self,
        supplier_id: Uuid,
        request: UpdateSupplierRequest,
    ) -> Result<SupplierModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let existing = SupplierEntity::find_by_id(supplier_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", supplier_id)))?;

        let mut active: supplier::ActiveModel = existing.into();

        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(contact_name) = request.contact_name {
            active.contact_name = Set(Some(contact_name));
        }
        if let Some(email) = request.email {
            active.email = Set(Some(email));
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if let Some(credit_limit) = request.credit_limit {
            if credit_limit < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "credit_limit must not be negative".to_string(),
                ));
            }
            active.credit_limit = Set(credit_limit);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Some(chrono::Utc::now()));

        let updated = active.update(db).await.map_err(ServiceError::DatabaseError)?;

        info!(supplier_id = %updated.id, "Supplier updated");
        Ok(updated)
    }

    /// Deletes a supplier. Products referencing it keep their weak
    /// `supplier_id`; resolution simply finds nothing afterwards.
    #[instrument(skip(self), fields(supplier_id = %supplier_id))]
    pub async fn delete_supplier(&self, supplier_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let result = SupplierEntity::delete_by_id(supplier_id)
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Supplier {} not found",
                supplier_id
            )));
        }

        info!(supplier_id = %supplier_id, "Supplier deleted");
        Ok(())
    }

    /// Adjusts the running balance. Increases are unconditional; decreases
    /// are guarded so the balance never goes below zero: the full decrement
    /// applies only while `current_balance >= amount`, anything else floors
    /// at zero.
    #[instrument(skip(self), fields(supplier_id = %supplier_id, amount = %amount, op = ?op))]
    pub async fn adjust_balance(
        &self,
        supplier_id: Uuid,
        amount: Decimal,
        op: BalanceOperation,
    ) -> Result<SupplierModel, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "amount must be positive".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let rows_affected = match op {
            BalanceOperation::Increase => {
                SupplierEntity::update_many()
                    .col_expr(
                        supplier::Column::CurrentBalance,
                        Expr::col(supplier::Column::CurrentBalance).add(amount),
                    )
                    .col_expr(supplier::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
                    .filter(supplier::Column::Id.eq(supplier_id))
                    .exec(db)
                    .await
                    .map_err(ServiceError::DatabaseError)?
                    .rows_affected
            }
            BalanceOperation::Decrease => {
                let guarded = SupplierEntity::update_many()
                    .col_expr(
                        supplier::Column::CurrentBalance,
                        Expr::col(supplier::Column::CurrentBalance).sub(amount),
                    )
                    .col_expr(supplier::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
                    .filter(supplier::Column::Id.eq(supplier_id))
                    .filter(supplier::Column::CurrentBalance.gte(amount))
                    .exec(db)
                    .await
                    .map_err(ServiceError::DatabaseError)?;

                if guarded.rows_affected > 0 {
                    guarded.rows_affected
                } else {
                    // Balance smaller than the decrease: floor at zero.
                    SupplierEntity::update_many()
                        .col_expr(
                            supplier::Column::CurrentBalance,
                            Expr::value(Decimal::ZERO),
                        )
                        .col_expr(supplier::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
                        .filter(supplier::Column::Id.eq(supplier_id))
                        .exec(db)
                        .await
                        .map_err(ServiceError::DatabaseError)?
                        .rows_affected
                }
            }
        };

        if rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Supplier {} not found",
                supplier_id
            )));
        }

        let updated = SupplierEntity::find_by_id(supplier_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", supplier_id)))?;

        info!(
            supplier_id = %supplier_id,
            balance = %updated.current_balance,
            "Supplier balance adjusted"
        );

        Ok(updated)
    }
}

fn map_unique_violation(e: DbErr, what: &str) -> ServiceError {
    if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        ServiceError::Conflict(format!("{} already exists", what))
    } else {
        ServiceError::DatabaseError(e)
    }
}
