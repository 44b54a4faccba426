use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "suppliers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 255,
        message = "Supplier name must be between 1 and 255 characters"
    ))]
    pub name: String,

    /// Globally unique supplier code
    #[validate(length(
        min = 1,
        max = 50,
        message = "Supplier code must be between 1 and 50 characters"
    ))]
    pub code: String,

    pub contact_name: Option<String>,

    #[validate(email(message = "Email must be a valid address"))]
    pub email: Option<String>,

    pub phone: Option<String>,
    pub address: Option<String>,

    /// Maximum credit extended to this supplier
    pub credit_limit: Decimal,

    /// Outstanding balance, floored at zero on decrease
    pub current_balance: Decimal,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Credit still available under the limit, never negative.
    pub fn available_credit(&self) -> Decimal {
        (self.credit_limit - self.current_balance).max(Decimal::ZERO)
    }

    /// Whether adding `amount` to the balance would exceed the limit.
    pub fn credit_exceeded(&self, amount: Decimal) -> bool {
        self.current_balance + amount > self.credit_limit
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.is_active {
                active_model.is_active = Set(true);
            }
            active_model.created_at = Set(now);
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn supplier(limit: Decimal, balance: Decimal) -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "Acme Supplies".into(),
            code: "ACME".into(),
            contact_name: None,
            email: None,
            phone: None,
            address: None,
            credit_limit: limit,
            current_balance: balance,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn available_credit_never_negative() {
        assert_eq!(supplier(dec!(100), dec!(30)).available_credit(), dec!(70));
        assert_eq!(supplier(dec!(100), dec!(150)).available_credit(), dec!(0));
    }

    #[test]
    fn credit_exceeded_checks_prospective_balance() {
        assert!(supplier(dec!(100), dec!(80)).credit_exceeded(dec!(30)));
        assert!(!supplier(dec!(100), dec!(80)).credit_exceeded(dec!(20)));
    }
}
