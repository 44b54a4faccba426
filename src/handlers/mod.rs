pub mod auth;
pub mod common;
pub mod health;
pub mod orders;
pub mod products;
pub mod reports;
pub mod suppliers;
pub mod users;

use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: crate::services::inventory::InventoryService,
    pub orders: crate::services::orders::OrderService,
    pub order_status: crate::services::order_status::OrderStatusService,
    pub products: crate::services::products::ProductService,
    pub suppliers: crate::services::suppliers::SupplierService,
    pub users: crate::services::users::UserService,
    pub reports: crate::services::reports::ReportService,
}

impl AppServices {
    /// Wires every service against the shared pool and event channel.
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        let inventory = crate::services::inventory::InventoryService::new(
            db_pool.clone(),
            event_sender.clone(),
        );
        let sequence = crate::services::order_sequence::OrderSequenceService::new(db_pool.clone());
        let orders = crate::services::orders::OrderService::new(
            db_pool.clone(),
            inventory.clone(),
            sequence,
            event_sender.clone(),
        );
        let order_status = crate::services::order_status::OrderStatusService::new(
            db_pool.clone(),
            inventory.clone(),
            event_sender.clone(),
        );
        let products = crate::services::products::ProductService::new(
            db_pool.clone(),
            event_sender.clone(),
        );
        let suppliers = crate::services::suppliers::SupplierService::new(
            db_pool.clone(),
            event_sender.clone(),
        );
        let users =
            crate::services::users::UserService::new(db_pool.clone(), event_sender.clone());
        let reports = crate::services::reports::ReportService::new(db_pool);

        Self {
            inventory,
            orders,
            order_status,
            products,
            suppliers,
            users,
            reports,
        }
    }
}
