use crate::{
    db::DbPool,
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Direction of a manual stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    Add,
    Subtract,
}

/// The authoritative stock ledger.
///
/// Every mutation is a single conditional UPDATE against the product row, so
/// concurrent requests for the same product cannot lose updates: a reserve
/// only succeeds when the decrement predicate (`quantity_on_hand >= n`)
/// holds at execution time.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Reserves `quantity` units of a product, atomically decrementing its
    /// on-hand count. Returns the new balance.
    ///
    /// Fails with `InsufficientStock` when fewer than `quantity` units are on
    /// hand; the stored quantity is left untouched in that case.
    #[instrument(skip(self), fields(product_id = %product_id, quantity = quantity))]
    pub async fn reserve(&self, product_id: Uuid, quantity: i32) -> Result<i32, ServiceError> {
        self.validate_quantity(quantity)?;
        let db = &*self.db_pool;

        let result = ProductEntity::update_many()
            .col_expr(
                product::Column::QuantityOnHand,
                Expr::col(product::Column::QuantityOnHand).sub(quantity),
            )
            .col_expr(
                product::Column::UpdatedAt,
                Expr::value(chrono::Utc::now()),
            )
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::QuantityOnHand.gte(quantity))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            // Either the product is missing or the predicate failed; a
            // follow-up read tells the two apart.
            let product = self.find_product(product_id).await?;
            return Err(ServiceError::InsufficientStock(format!(
                "{}: requested {}, available {}",
                product.sku, quantity, product.quantity_on_hand
            )));
        }

        let product = self.find_product(product_id).await?;
        info!(
            sku = %product.sku,
            remaining = product.quantity_on_hand,
            "Reserved stock"
        );

        self.emit(Event::StockReserved {
            product_id,
            quantity,
            remaining: product.quantity_on_hand,
        })
        .await;

        if product.is_low_stock() {
            self.emit(Event::LowStockDetected {
                product_id,
                remaining: product.quantity_on_hand,
                reorder_point: product.reorder_point,
            })
            .await;
        }

        Ok(product.quantity_on_hand)
    }

    /// Releases `quantity` units back to a product, reversing a prior
    /// reservation. There is no upper bound: restocking past the original
    /// level is legitimate.
    #[instrument(skip(self), fields(product_id = %product_id, quantity = quantity))]
    pub async fn release(&self, product_id: Uuid, quantity: i32) -> Result<i32, ServiceError> {
        self.validate_quantity(quantity)?;
        let db = &*self.db_pool;

        let result = ProductEntity::update_many()
            .col_expr(
                product::Column::QuantityOnHand,
                Expr::col(product::Column::QuantityOnHand).add(quantity),
            )
            .col_expr(
                product::Column::UpdatedAt,
                Expr::value(chrono::Utc::now()),
            )
            .filter(product::Column::Id.eq(product_id))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        let product = self.find_product(product_id).await?;
        info!(
            sku = %product.sku,
            remaining = product.quantity_on_hand,
            "Released stock"
        );

        self.emit(Event::StockReleased {
            product_id,
            quantity,
            remaining: product.quantity_on_hand,
        })
        .await;

        Ok(product.quantity_on_hand)
    }

    /// Manual stock adjustment. `Subtract` uses the same guarded decrement as
    /// a reservation and fails with `InsufficientStock` on underflow.
    #[instrument(skip(self), fields(product_id = %product_id, quantity = quantity, op = ?op))]
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        quantity: i32,
        op: StockOperation,
    ) -> Result<product::Model, ServiceError> {
        let delta = match op {
            StockOperation::Add => {
                self.release(product_id, quantity).await?;
                quantity
            }
            StockOperation::Subtract => {
                self.reserve(product_id, quantity).await?;
                -quantity
            }
        };

        let product = self.find_product(product_id).await?;
        self.emit(Event::StockAdjusted {
            product_id,
            delta,
            remaining: product.quantity_on_hand,
        })
        .await;

        Ok(product)
    }

    /// Whether a product's on-hand quantity is at or below its reorder point.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn is_low_stock(&self, product_id: Uuid) -> Result<bool, ServiceError> {
        let product = self.find_product(product_id).await?;
        Ok(product.is_low_stock())
    }

    /// All active products at or below their reorder point.
    #[instrument(skip(self))]
    pub async fn low_stock_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        let db = &*self.db_pool;

        let products = ProductEntity::find()
            .filter(product::Column::IsActive.eq(true))
            .filter(
                Expr::col(product::Column::QuantityOnHand)
                    .lte(Expr::col(product::Column::ReorderPoint)),
            )
            .order_by_asc(product::Column::QuantityOnHand)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(products)
    }

    async fn find_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        let db = &*self.db_pool;
        ProductEntity::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    fn validate_quantity(&self, quantity: i32) -> Result<(), ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    async fn emit(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!("Failed to send inventory event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_operation_parses_lowercase() {
        assert_eq!(
            serde_json::from_str::<StockOperation>("\"add\"").unwrap(),
            StockOperation::Add
        );
        assert_eq!(
            serde_json::from_str::<StockOperation>("\"subtract\"").unwrap(),
            StockOperation::Subtract
        );
        assert!(serde_json::from_str::<StockOperation>("\"drop\"").is_err());
    }
}
