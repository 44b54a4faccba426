use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Product entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Primary key
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Product name
    #[validate(length(
        min = 1,
        max = 255,
        message = "Product name must be between 1 and 255 characters"
    ))]
    pub name: String,

    /// Product description
    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    /// SKU (Stock Keeping Unit), stored uppercased and globally unique
    #[validate(length(
        min = 1,
        max = 100,
        message = "SKU must be between 1 and 100 characters"
    ))]
    pub sku: String,

    /// Product category (one of the closed category set)
    pub category: String,

    /// Unit sale price
    pub price: Decimal,

    /// Unit cost (used for margin calculations)
    pub cost_price: Decimal,

    /// Authoritative on-hand stock quantity
    pub quantity_on_hand: i32,

    /// Minimum stock threshold before the product counts as low stock
    pub reorder_point: i32,

    /// Owning supplier, weak reference
    pub supplier_id: Option<Uuid>,

    /// Is the product active
    pub is_active: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Low stock means on-hand at or below the configured threshold.
    pub fn is_low_stock(&self) -> bool {
        self.quantity_on_hand <= self.reorder_point
    }

    /// Profit margin as (price - cost) / cost. Undefined for zero cost.
    pub fn profit_margin(&self) -> Option<Decimal> {
        if self.cost_price.is_zero() {
            None
        } else {
            Some((self.price - self.cost_price) / self.cost_price)
        }
    }

    /// Total value of stock on hand at the sale price.
    pub fn total_value(&self) -> Decimal {
        self.price * Decimal::from(self.quantity_on_hand)
    }
}

/// Product entity relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        if insert {
            if let ActiveValue::NotSet = active_model.is_active {
                active_model.is_active = Set(true);
            }

            active_model.created_at = Set(Utc::now());
        }

        active_model.updated_at = Set(Some(Utc::now()));

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(price: Decimal, cost: Decimal, on_hand: i32, reorder_point: i32) -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "Widget".into(),
            description: None,
            sku: "WID-1".into(),
            category: "electronics".into(),
            price,
            cost_price: cost,
            quantity_on_hand: on_hand,
            reorder_point,
            supplier_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn low_stock_at_or_below_threshold() {
        assert!(product(dec!(1), dec!(1), 5, 5).is_low_stock());
        assert!(product(dec!(1), dec!(1), 0, 5).is_low_stock());
        assert!(!product(dec!(1), dec!(1), 6, 5).is_low_stock());
    }

    #[test]
    fn profit_margin_undefined_for_zero_cost() {
        assert_eq!(product(dec!(10), dec!(0), 1, 0).profit_margin(), None);
        assert_eq!(
            product(dec!(15), dec!(10), 1, 0).profit_margin(),
            Some(dec!(0.5))
        );
    }

    #[test]
    fn total_value_is_price_times_on_hand() {
        assert_eq!(product(dec!(2.50), dec!(1), 4, 0).total_value(), dec!(10.00));
    }
}
