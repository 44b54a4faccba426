// Fulfillment core
pub mod inventory;
pub mod order_sequence;
pub mod order_status;
pub mod orders;

// Catalog and account management
pub mod products;
pub mod suppliers;
pub mod users;

// Aggregation for the dashboard
pub mod reports;
