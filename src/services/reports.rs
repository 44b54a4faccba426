use crate::{
    db::DbPool,
    entities::order::{self, Entity as OrderEntity},
    entities::product::{self, Entity as ProductEntity, Model as ProductModel},
    errors::ServiceError,
    services::order_status::OrderStatus,
};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::instrument;
use utoipa::ToSchema;

/// Headline numbers for the dashboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub total_products: u64,
    pub active_products: u64,
    pub low_stock_products: u64,
    pub out_of_stock_products: u64,
    /// Σ price × on-hand across the catalog
    pub inventory_value: Decimal,
    pub total_orders: u64,
    pub orders_by_status: HashMap<String, u64>,
    /// Revenue over all non-cancelled orders
    pub total_revenue: Decimal,
    pub revenue_this_month: Decimal,
}

/// Sales numbers for an explicit time window.
#[derive(Debug, Serialize, ToSchema)]
pub struct SalesSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total_orders: u64,
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
    pub orders_by_status: HashMap<String, u64>,
}

/// Service for dashboard aggregation.
#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn dashboard_summary(&self) -> Result<DashboardSummary, ServiceError> {
        let db = &*self.db_pool;

        let total_products = ProductEntity::find()
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let active_products = ProductEntity::find()
            .filter(product::Column::IsActive.eq(true))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let low_stock_products = ProductEntity::find()
            .filter(product::Column::IsActive.eq(true))
            .filter(
                Expr::col(product::Column::QuantityOnHand)
                    .lte(Expr::col(product::Column::ReorderPoint)),
            )
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let out_of_stock_products = ProductEntity::find()
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::QuantityOnHand.eq(0))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let products = ProductEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let inventory_value: Decimal = products.iter().map(ProductModel::total_value).sum();

        let total_orders = OrderEntity::find()
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut orders_by_status = HashMap::new();
        for status in OrderStatus::iter() {
            let count = OrderEntity::find()
                .filter(order::Column::Status.eq(status.to_string()))
                .count(db)
                .await
                .map_err(ServiceError::DatabaseError)?;
            orders_by_status.insert(status.to_string(), count);
        }

        let billable = OrderEntity::find()
            .filter(order::Column::Status.ne(OrderStatus::Cancelled.to_string()))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let total_revenue: Decimal = billable.iter().map(|o| o.total_amount).sum();

        let now = Utc::now();
        let month_start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);
        let revenue_this_month: Decimal = billable
            .iter()
            .filter(|o| o.created_at >= month_start)
            .map(|o| o.total_amount)
            .sum();

        Ok(DashboardSummary {
            total_products,
            active_products,
            low_stock_products,
            out_of_stock_products,
            inventory_value,
            total_orders,
            orders_by_status,
            total_revenue,
            revenue_this_month,
        })
    }

    /// Sales aggregation over `[from, to)`. Cancelled orders count toward
    /// the status breakdown but not toward revenue.
    #[instrument(skip(self))]
    pub async fn sales_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SalesSummary, ServiceError> {
        if from >= to {
            return Err(ServiceError::ValidationError(
                "'from' must be before 'to'".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let orders = OrderEntity::find()
            .filter(order::Column::CreatedAt.gte(from))
            .filter(order::Column::CreatedAt.lt(to))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let total_orders = orders.len() as u64;

        let mut orders_by_status: HashMap<String, u64> = HashMap::new();
        for order in &orders {
            *orders_by_status.entry(order.status.clone()).or_insert(0) += 1;
        }

        let cancelled = OrderStatus::Cancelled.to_string();
        let total_revenue: Decimal = orders
            .iter()
            .filter(|o| o.status != cancelled)
            .map(|o| o.total_amount)
            .sum();

        let billable_count = orders.iter().filter(|o| o.status != cancelled).count();
        let average_order_value = if billable_count > 0 {
            total_revenue / Decimal::from(billable_count as u64)
        } else {
            Decimal::ZERO
        };

        Ok(SalesSummary {
            from,
            to,
            total_orders,
            total_revenue,
            average_order_value,
            orders_by_status,
        })
    }

    /// Active products at or below their reorder point, lowest stock first.
    #[instrument(skip(self))]
    pub async fn low_stock_report(&self) -> Result<Vec<ProductModel>, ServiceError> {
        let db = &*self.db_pool;

        ProductEntity::find()
            .filter(product::Column::IsActive.eq(true))
            .filter(
                Expr::col(product::Column::QuantityOnHand)
                    .lte(Expr::col(product::Column::ReorderPoint)),
            )
            .order_by_asc(product::Column::QuantityOnHand)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
