use crate::{
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, Model as OrderModel},
    entities::order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::InventoryService,
    services::order_sequence::OrderSequenceService,
    services::order_status::OrderStatus,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Customer snapshot copied onto the order at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CustomerInfo {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Customer name must be between 1 and 255 characters"
    ))]
    pub name: String,
    #[validate(email(message = "Customer email must be a valid address"))]
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// One requested order line: which product and how many units.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate]
    pub customer: CustomerInfo,
    #[validate]
    pub lines: Vec<OrderLineRequest>,
    pub tax: Option<Decimal>,
    pub shipping: Option<Decimal>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

/// Full edit of a pending order. Absent fields are left unchanged; `lines`
/// replaces the entire line set when present.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    #[validate]
    pub customer: Option<CustomerInfo>,
    #[validate]
    pub lines: Option<Vec<OrderLineRequest>>,
    pub tax: Option<Decimal>,
    pub shipping: Option<Decimal>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<OrderItemModel>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListResponse {
    #[schema(value_type = Vec<Object>)]
    pub orders: Vec<OrderModel>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Assembles and manages orders.
///
/// Creation reserves stock line by line through the ledger and compensates
/// on any failure, so a rejected order never leaves a partial decrement
/// behind.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    inventory: InventoryService,
    sequence: OrderSequenceService,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        inventory: InventoryService,
        sequence: OrderSequenceService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db_pool,
            inventory,
            sequence,
            event_sender,
        }
    }

    /// Creates an order from a draft: validates every line, reserves stock,
    /// prices the lines with the unit price captured at reservation time,
    /// mints an order number and persists order plus lines in one
    /// transaction. Status starts at `pending`.
    #[instrument(skip(self, request), fields(customer_email = %request.customer.email, lines = request.lines.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        created_by: Option<Uuid>,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "order must contain at least one line".to_string(),
            ));
        }
        let tax = non_negative(request.tax, "tax")?;
        let shipping = non_negative(request.shipping, "shipping")?;

        let reserved = self.reserve_lines(&request.lines).await?;

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let mut subtotal = Decimal::ZERO;
        let mut item_models = Vec::with_capacity(reserved.len());
        for (product, quantity) in &reserved {
            let line_total = product.price * Decimal::from(*quantity);
            subtotal += line_total;
            item_models.push(order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                sku: Set(product.sku.clone()),
                name: Set(product.name.clone()),
                quantity: Set(*quantity),
                unit_price: Set(product.price),
                total_price: Set(line_total),
                created_at: Set(now),
            });
        }
        let total = subtotal + tax + shipping;

        let order_number = match self
            .sequence
            .next_order_number(now.date_naive())
            .await
        {
            Ok(number) => number,
            Err(e) => {
                self.rollback_reservations(&reserved).await;
                return Err(e);
            }
        };

        let order_active = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            customer_name: Set(request.customer.name),
            customer_email: Set(request.customer.email),
            customer_phone: Set(request.customer.phone),
            shipping_address: Set(request.customer.address),
            status: Set(OrderStatus::Pending.to_string()),
            payment_status: Set("pending".to_string()),
            payment_method: Set(request.payment_method),
            subtotal: Set(subtotal),
            tax: Set(tax),
            shipping: Set(shipping),
            total_amount: Set(total),
            notes: Set(request.notes),
            created_by: Set(created_by),
            shipped_at: Set(None),
            delivered_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        };

        let persisted = async {
            let txn = self
                .db_pool
                .begin()
                .await
                .map_err(ServiceError::DatabaseError)?;
            let order_model = order_active
                .insert(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;
            let mut items = Vec::with_capacity(item_models.len());
            for item in item_models {
                items.push(item.insert(&txn).await.map_err(ServiceError::DatabaseError)?);
            }
            txn.commit().await.map_err(ServiceError::DatabaseError)?;
            Ok::<(OrderModel, Vec<OrderItemModel>), ServiceError>((order_model, items))
        }
        .await;

        let (order_model, items) = match persisted {
            Ok(result) => result,
            Err(e) => {
                // The reservation already went through; the failed record
                // write must not strand the decrement.
                self.rollback_reservations(&reserved).await;
                return Err(e);
            }
        };

        info!(order_number = %order_number, total = %total, "Order created");

        if let Err(e) = self
            .event_sender
            .send(Event::OrderCreated {
                order_id,
                order_number: order_number.clone(),
            })
            .await
        {
            warn!(order_id = %order_id, "Failed to send order created event: {}", e);
        }

        Ok(to_response(order_model, items))
    }

    /// Retrieves an order with its lines.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;

        let order_model = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = self.find_items(order_id).await?;
        Ok(to_response(order_model, items))
    }

    /// Lists orders newest-first with optional status filtering.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
        status: Option<OrderStatus>,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status.to_string()));
        }

        let paginator = query.paginate(db, per_page.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Edits a pending order. Fails with `OrderNotEditable` for any other
    /// status. When the line set is replaced, the new lines are reserved
    /// before the old reservations are released, so a failed edit never
    /// loses stock.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        request: UpdateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if let Some(lines) = &request.lines {
            if lines.is_empty() {
                return Err(ServiceError::ValidationError(
                    "order must contain at least one line".to_string(),
                ));
            }
        }

        let db = &*self.db_pool;

        let order_model = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let status = OrderStatus::parse(&order_model.status)?;
        if !status.is_editable() {
            return Err(ServiceError::OrderNotEditable(format!(
                "order {} is {}",
                order_model.order_number, order_model.status
            )));
        }

        let old_items = self.find_items(order_id).await?;

        // Reserve replacements up front; only a fully successful edit
        // touches the existing reservations.
        let replacement = match &request.lines {
            Some(lines) => Some(self.reserve_lines(lines).await?),
            None => None,
        };

        let now = Utc::now();
        let mut subtotal = order_model.subtotal;
        let mut new_item_models = Vec::new();
        if let Some(reserved) = &replacement {
            subtotal = Decimal::ZERO;
            for (product, quantity) in reserved {
                let line_total = product.price * Decimal::from(*quantity);
                subtotal += line_total;
                new_item_models.push(order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    product_id: Set(product.id),
                    sku: Set(product.sku.clone()),
                    name: Set(product.name.clone()),
                    quantity: Set(*quantity),
                    unit_price: Set(product.price),
                    total_price: Set(line_total),
                    created_at: Set(now),
                });
            }
        }

        let tax = match request.tax {
            Some(value) => non_negative(Some(value), "tax")?,
            None => order_model.tax,
        };
        let shipping = match request.shipping {
            Some(value) => non_negative(Some(value), "shipping")?,
            None => order_model.shipping,
        };
        let total = subtotal + tax + shipping;

        let version = order_model.version;
        let mut active: order::ActiveModel = order_model.into();
        if let Some(customer) = request.customer {
            active.customer_name = Set(customer.name);
            active.customer_email = Set(customer.email);
            active.customer_phone = Set(customer.phone);
            active.shipping_address = Set(customer.address);
        }
        if let Some(payment_method) = request.payment_method {
            active.payment_method = Set(Some(payment_method));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.subtotal = Set(subtotal);
        active.tax = Set(tax);
        active.shipping = Set(shipping);
        active.total_amount = Set(total);
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);

        let persisted = async {
            let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;
            if replacement.is_some() {
                OrderItemEntity::delete_many()
                    .filter(order_item::Column::OrderId.eq(order_id))
                    .exec(&txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                for item in new_item_models {
                    item.insert(&txn).await.map_err(ServiceError::DatabaseError)?;
                }
            }
            let updated = active
                .update(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;
            txn.commit().await.map_err(ServiceError::DatabaseError)?;
            Ok::<OrderModel, ServiceError>(updated)
        }
        .await;

        let updated = match persisted {
            Ok(updated) => updated,
            Err(e) => {
                if let Some(reserved) = &replacement {
                    self.rollback_reservations(reserved).await;
                }
                return Err(e);
            }
        };

        // The edit is committed; now return the superseded reservations.
        if replacement.is_some() {
            for item in &old_items {
                if let Err(e) = self.inventory.release(item.product_id, item.quantity).await {
                    warn!(
                        order_id = %order_id,
                        product_id = %item.product_id,
                        "Failed to release superseded reservation: {}",
                        e
                    );
                }
            }
        }

        if let Err(e) = self.event_sender.send(Event::OrderUpdated(order_id)).await {
            warn!(order_id = %order_id, "Failed to send order updated event: {}", e);
        }

        let items = self.find_items(order_id).await?;
        Ok(to_response(updated, items))
    }

    /// Deletes an order. Orders that still hold reservations (`pending` or
    /// `confirmed`) have their stock released first, then the record and its
    /// lines are removed.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let order_model = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let status = OrderStatus::parse(&order_model.status).unwrap_or(OrderStatus::Cancelled);

        if status.releases_stock_on_cancel() {
            let items = self.find_items(order_id).await?;
            for item in &items {
                match self.inventory.release(item.product_id, item.quantity).await {
                    Ok(_) | Err(ServiceError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;
        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        OrderEntity::delete_by_id(order_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(order_number = %order_model.order_number, "Order deleted");

        if let Err(e) = self.event_sender.send(Event::OrderDeleted(order_id)).await {
            warn!(order_id = %order_id, "Failed to send order deleted event: {}", e);
        }

        Ok(())
    }

    /// Reserves every requested line in input order. On the first failure,
    /// reservations already made for this attempt are rolled back before the
    /// error propagates.
    async fn reserve_lines(
        &self,
        lines: &[OrderLineRequest],
    ) -> Result<Vec<(product::Model, i32)>, ServiceError> {
        let db = &*self.db_pool;
        let mut reserved: Vec<(product::Model, i32)> = Vec::with_capacity(lines.len());

        for line in lines {
            let product = match ProductEntity::find_by_id(line.product_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)
            {
                Ok(Some(product)) => product,
                Ok(None) => {
                    self.rollback_reservations(&reserved).await;
                    return Err(ServiceError::NotFound(format!(
                        "Product {} not found",
                        line.product_id
                    )));
                }
                Err(e) => {
                    self.rollback_reservations(&reserved).await;
                    return Err(e);
                }
            };

            if !product.is_active {
                self.rollback_reservations(&reserved).await;
                return Err(ServiceError::ValidationError(format!(
                    "product {} is inactive",
                    product.sku
                )));
            }

            if let Err(e) = self.inventory.reserve(product.id, line.quantity).await {
                self.rollback_reservations(&reserved).await;
                return Err(e);
            }

            reserved.push((product, line.quantity));
        }

        Ok(reserved)
    }

    /// Compensating action: return every reservation of a failed attempt.
    /// Failures here are logged rather than propagated; the original error
    /// is the one the caller needs to see.
    async fn rollback_reservations(&self, reserved: &[(product::Model, i32)]) {
        for (product, quantity) in reserved {
            if let Err(e) = self.inventory.release(product.id, *quantity).await {
                warn!(
                    product_id = %product.id,
                    quantity = quantity,
                    "Failed to roll back reservation: {}",
                    e
                );
            }
        }
    }

    async fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderItemModel>, ServiceError> {
        let db = &*self.db_pool;
        OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

fn non_negative(value: Option<Decimal>, field: &str) -> Result<Decimal, ServiceError> {
    let value = value.unwrap_or(Decimal::ZERO);
    if value < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be negative",
            field
        )));
    }
    Ok(value)
}

fn to_response(order: OrderModel, items: Vec<OrderItemModel>) -> OrderResponse {
    OrderResponse {
        id: order.id,
        order_number: order.order_number,
        customer_name: order.customer_name,
        customer_email: order.customer_email,
        customer_phone: order.customer_phone,
        shipping_address: order.shipping_address,
        status: order.status,
        payment_status: order.payment_status,
        payment_method: order.payment_method,
        subtotal: order.subtotal,
        tax: order.tax,
        shipping: order.shipping,
        total_amount: order.total_amount,
        notes: order.notes,
        created_by: order.created_by,
        shipped_at: order.shipped_at,
        delivered_at: order.delivered_at,
        created_at: order.created_at,
        updated_at: order.updated_at,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn non_negative_defaults_to_zero() {
        assert_eq!(non_negative(None, "tax").unwrap(), Decimal::ZERO);
        assert_eq!(non_negative(Some(dec!(2.50)), "tax").unwrap(), dec!(2.50));
        assert!(non_negative(Some(dec!(-0.01)), "tax").is_err());
    }

    #[test]
    fn create_request_rejects_zero_quantity() {
        let request = CreateOrderRequest {
            customer: CustomerInfo {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                phone: None,
                address: None,
            },
            lines: vec![OrderLineRequest {
                product_id: Uuid::new_v4(),
                quantity: 0,
            }],
            tax: None,
            shipping: None,
            payment_method: None,
            notes: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_request_rejects_bad_email() {
        let request = CreateOrderRequest {
            customer: CustomerInfo {
                name: "Ada".into(),
                email: "not-an-email".into(),
                phone: None,
                address: None,
            },
            lines: vec![OrderLineRequest {
                product_id: Uuid::new_v4(),
                quantity: 1,
            }],
            tax: None,
            shipping: None,
            payment_method: None,
            notes: None,
        };
        assert!(request.validate().is_err());
    }
}
