use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel},
    entities::order_item::{self, Entity as OrderItemEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::InventoryService,
};

/// Closed order status set.
///
/// The happy path is linear; `cancelled` is reachable from every
/// non-terminal state. `delivered` and `cancelled` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether this order can still be edited in full (lines, customer,
    /// amounts).
    pub fn is_editable(self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Whether cancelling out of this state returns reserved stock to the
    /// ledger. Once fulfillment starts the units are considered consumed.
    pub fn releases_stock_on_cancel(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Confirmed)
            | (Confirmed, Processing)
            | (Processing, Shipped)
            | (Shipped, Delivered) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Parses a stored or requested status string; anything outside the
    /// declared set fails with `InvalidStatus`.
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        Self::from_str(value)
            .map_err(|_| ServiceError::InvalidStatus(format!("unknown status '{}'", value)))
    }
}

#[derive(Clone)]
pub struct OrderStatusService {
    db_pool: Arc<DbPool>,
    inventory: InventoryService,
    event_sender: EventSender,
}

impl OrderStatusService {
    pub fn new(
        db_pool: Arc<DbPool>,
        inventory: InventoryService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db_pool,
            inventory,
            event_sender,
        }
    }

    /// Moves an order to `new_status`, enforcing the transition table.
    ///
    /// Entering `shipped`/`delivered` stamps the matching timestamp.
    /// Cancelling an order that has not started fulfillment releases every
    /// line's reservation back to the ledger after the status commit; a line
    /// whose product has since been deleted is skipped with a warning
    /// (orders hold weak product references).
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn transition(
        &self,
        order_id: Uuid,
        new_status: &str,
    ) -> Result<OrderModel, ServiceError> {
        let target = OrderStatus::parse(new_status)?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let current = OrderStatus::parse(&order.status).map_err(|_| {
            ServiceError::InternalError(format!(
                "order {} has corrupt status '{}'",
                order_id, order.status
            ))
        })?;

        if !current.can_transition_to(target) {
            return Err(ServiceError::InvalidStatus(format!(
                "cannot transition from '{}' to '{}'",
                current, target
            )));
        }

        let now = Utc::now();
        let version = order.version;
        let mut active: OrderActiveModel = order.into();
        active.status = Set(target.to_string());
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);

        match target {
            OrderStatus::Shipped => active.shipped_at = Set(Some(now)),
            OrderStatus::Delivered => active.delivered_at = Set(Some(now)),
            _ => {}
        }

        let updated = active
            .update(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(
            order_number = %updated.order_number,
            from = %current,
            to = %target,
            "Order status updated"
        );

        if target == OrderStatus::Cancelled && current.releases_stock_on_cancel() {
            self.restore_stock(order_id).await?;
            if let Err(e) = self.event_sender.send(Event::OrderCancelled(order_id)).await {
                warn!(order_id = %order_id, "Failed to send order cancelled event: {}", e);
            }
        }

        if let Err(e) = self
            .event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: current.to_string(),
                new_status: target.to_string(),
            })
            .await
        {
            warn!(order_id = %order_id, "Failed to send status changed event: {}", e);
        }

        Ok(updated)
    }

    /// Releases each line's reservation, mirroring the decrement made at
    /// assembly time.
    async fn restore_stock(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        for item in items {
            match self.inventory.release(item.product_id, item.quantity).await {
                Ok(_) => {}
                Err(ServiceError::NotFound(_)) => {
                    warn!(
                        order_id = %order_id,
                        product_id = %item.product_id,
                        "Product no longer exists; skipping stock restore for line"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Confirmed, true)]
    #[case(OrderStatus::Confirmed, OrderStatus::Processing, true)]
    #[case(OrderStatus::Processing, OrderStatus::Shipped, true)]
    #[case(OrderStatus::Shipped, OrderStatus::Delivered, true)]
    #[case(OrderStatus::Pending, OrderStatus::Processing, false)]
    #[case(OrderStatus::Pending, OrderStatus::Shipped, false)]
    #[case(OrderStatus::Delivered, OrderStatus::Pending, false)]
    #[case(OrderStatus::Shipped, OrderStatus::Confirmed, false)]
    fn transition_table(
        #[case] from: OrderStatus,
        #[case] to: OrderStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn cancel_reachable_from_every_non_terminal_state() {
        for status in OrderStatus::iter() {
            assert_eq!(
                status.can_transition_to(OrderStatus::Cancelled),
                !status.is_terminal(),
                "cancel from {:?}",
                status
            );
        }
    }

    #[test]
    fn terminal_states_allow_nothing() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            for target in OrderStatus::iter() {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn only_pending_is_editable() {
        for status in OrderStatus::iter() {
            assert_eq!(status.is_editable(), status == OrderStatus::Pending);
        }
    }

    #[test]
    fn stock_restored_only_before_fulfillment() {
        assert!(OrderStatus::Pending.releases_stock_on_cancel());
        assert!(OrderStatus::Confirmed.releases_stock_on_cancel());
        assert!(!OrderStatus::Processing.releases_stock_on_cancel());
        assert!(!OrderStatus::Shipped.releases_stock_on_cancel());
    }

    #[test]
    fn parse_rejects_unknown_status() {
        assert!(matches!(
            OrderStatus::parse("bogus"),
            Err(ServiceError::InvalidStatus(_))
        ));
        assert_eq!(OrderStatus::parse("shipped").unwrap(), OrderStatus::Shipped);
    }
}
