use crate::{
    db::DbPool,
    entities::product::{self, Entity as ProductEntity, Model as ProductModel},
    entities::supplier::{self, Entity as SupplierEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Closed product category set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Electronics,
    Clothing,
    Food,
    Office,
    Other,
}

impl ProductCategory {
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        Self::from_str(value).map_err(|_| {
            ServiceError::ValidationError(format!("unknown product category '{}'", value))
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub sku: String,
    pub category: String,
    pub price: Decimal,
    pub cost_price: Decimal,
    #[serde(default)]
    pub quantity_on_hand: i32,
    #[serde(default)]
    pub reorder_point: i32,
    pub supplier_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub sku: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub reorder_point: Option<i32>,
    pub supplier_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

/// List filters for the product catalog.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductListParams {
    pub category: Option<String>,
    pub is_active: Option<bool>,
    /// Only products at or below their reorder point
    pub low_stock: Option<bool>,
    /// Case-normalized match against name or SKU
    pub search: Option<String>,
}

/// Product read model with the derived fields the dashboard shows.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub product: ProductModel,
    pub low_stock: bool,
    pub profit_margin: Option<Decimal>,
    pub total_value: Decimal,
}

impl From<ProductModel> for ProductResponse {
    fn from(product: ProductModel) -> Self {
        let low_stock = product.is_low_stock();
        let profit_margin = product.profit_margin();
        let total_value = product.total_value();
        Self {
            product,
            low_stock,
            profit_margin,
            total_value,
        }
    }
}

#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a product. The SKU is uppercased before the write; duplicates
    /// are rejected with `Conflict` by the unique index.
    #[instrument(skip(self, request), fields(sku = %request.sku))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        let category = ProductCategory::parse(&request.category)?;
        validate_money(request.price, "price")?;
        validate_money(request.cost_price, "cost_price")?;
        validate_count(request.quantity_on_hand, "quantity_on_hand")?;
        validate_count(request.reorder_point, "reorder_point")?;

        let db = &*self.db_pool;

        if let Some(supplier_id) = request.supplier_id {
            SupplierEntity::find_by_id(supplier_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Supplier {} not found", supplier_id))
                })?;
        }

        let sku = request.sku.trim().to_uppercase();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            sku: Set(sku.clone()),
            category: Set(category.to_string()),
            price: Set(request.price),
            cost_price: Set(request.cost_price),
            quantity_on_hand: Set(request.quantity_on_hand),
            reorder_point: Set(request.reorder_point),
            supplier_id: Set(request.supplier_id),
            ..Default::default()
        };

        let created = model
            .insert(db)
            .await
            .map_err(|e| map_unique_violation(e, &format!("SKU '{}'", sku)))?;

        info!(product_id = %created.id, sku = %created.sku, "Product created");

        if let Err(e) = self.event_sender.send(Event::ProductCreated(created.id)).await {
            warn!("Failed to send product created event: {}", e);
        }

        Ok(created)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(
        &self,
        product_id: Uuid,
    ) -> Result<Option<ProductModel>, ServiceError> {
        let db = &*self.db_pool;
        ProductEntity::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Lists products with pagination and the catalog filters.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        per_page: u64,
        params: ProductListParams,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = ProductEntity::find().order_by_asc(product::Column::Name);

        if let Some(category) = &params.category {
            let category = ProductCategory::parse(category)?;
            query = query.filter(product::Column::Category.eq(category.to_string()));
        }
        if let Some(is_active) = params.is_active {
            query = query.filter(product::Column::IsActive.eq(is_active));
        }
        if params.low_stock.unwrap_or(false) {
            query = query.filter(
                sea_orm::sea_query::Expr::col(product::Column::QuantityOnHand)
                    .lte(sea_orm::sea_query::Expr::col(product::Column::ReorderPoint)),
            );
        }
        if let Some(search) = &params.search {
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.contains(search))
                    .add(product::Column::Sku.contains(&search.to_uppercase())),
            );
        }

        let paginator = query.paginate(db, per_page.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let products = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((products, total))
    }

    /// Updates product attributes. Stock levels are not touched here; those
    /// go through the inventory ledger.
    #[instrument(skip(self, request), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<ProductModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let existing = ProductEntity::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let mut sku_label = existing.sku.clone();
        let mut active: product::ActiveModel = existing.into();

        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(sku) = request.sku {
            let sku = sku.trim().to_uppercase();
            sku_label = sku.clone();
            active.sku = Set(sku);
        }
        if let Some(category) = request.category {
            let category = ProductCategory::parse(&category)?;
            active.category = Set(category.to_string());
        }
        if let Some(price) = request.price {
            validate_money(price, "price")?;
            active.price = Set(price);
        }
        if let Some(cost_price) = request.cost_price {
            validate_money(cost_price, "cost_price")?;
            active.cost_price = Set(cost_price);
        }
        if let Some(reorder_point) = request.reorder_point {
            validate_count(reorder_point, "reorder_point")?;
            active.reorder_point = Set(reorder_point);
        }
        if let Some(supplier_id) = request.supplier_id {
            SupplierEntity::find_by_id(supplier_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Supplier {} not found", supplier_id))
                })?;
            active.supplier_id = Set(Some(supplier_id));
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }

        let updated = active
            .update(db)
            .await
            .map_err(|e| map_unique_violation(e, &format!("SKU '{}'", sku_label)))?;

        info!(product_id = %updated.id, "Product updated");
        Ok(updated)
    }

    /// Removes a product. Historical orders are unaffected: they carry their
    /// own snapshot of SKU, name and price.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let result = ProductEntity::delete_by_id(product_id)
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        info!(product_id = %product_id, "Product deleted");

        if let Err(e) = self.event_sender.send(Event::ProductDeleted(product_id)).await {
            warn!("Failed to send product deleted event: {}", e);
        }

        Ok(())
    }
}

fn validate_money(value: Decimal, field: &str) -> Result<(), ServiceError> {
    if value < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be negative",
            field
        )));
    }
    Ok(())
}

fn validate_count(value: i32, field: &str) -> Result<(), ServiceError> {
    if value < 0 {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be negative",
            field
        )));
    }
    Ok(())
}

fn map_unique_violation(e: DbErr, what: &str) -> ServiceError {
    if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        ServiceError::Conflict(format!("{} already exists", what))
    } else {
        ServiceError::DatabaseError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_closed() {
        assert_eq!(
            ProductCategory::parse("electronics").unwrap(),
            ProductCategory::Electronics
        );
        assert!(matches!(
            ProductCategory::parse("gadgets"),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn money_and_count_guards() {
        use rust_decimal_macros::dec;
        assert!(validate_money(dec!(0), "price").is_ok());
        assert!(validate_money(dec!(-1), "price").is_err());
        assert!(validate_count(0, "reorder_point").is_ok());
        assert!(validate_count(-1, "reorder_point").is_err());
    }
}
