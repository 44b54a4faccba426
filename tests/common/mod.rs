//! Shared integration-test harness.
//!
//! Boots the whole service stack against an in-memory SQLite database. The
//! pool is pinned to a single connection so every session sees the same
//! in-memory database.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, Database, Set};
use sea_orm::ActiveModelTrait;
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use stockflow_api::auth::{AuthConfig, AuthService};
use stockflow_api::config::AppConfig;
use stockflow_api::db::DbPool;
use stockflow_api::entities::product;
use stockflow_api::events;
use stockflow_api::handlers::AppServices;
use stockflow_api::migrator::Migrator;
use stockflow_api::AppState;

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub auth: Arc<AuthService>,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut options = ConnectOptions::new("sqlite::memory:".to_string());
        options.max_connections(1).min_connections(1);
        let db = Database::connect(options)
            .await
            .expect("connect to in-memory sqlite");
        Migrator::up(&db, None).await.expect("run migrations");

        let (event_sender, event_rx) = events::channel(64);
        tokio::spawn(events::process_events(event_rx));

        let db = Arc::new(db);
        let services = AppServices::new(db.clone(), event_sender.clone());

        let config = test_config();
        let auth = Arc::new(AuthService::new(AuthConfig::new(
            config.jwt_secret.clone(),
            config.auth_issuer.clone(),
            config.auth_audience.clone(),
            Duration::from_secs(config.jwt_expiration),
        )));

        let state = Arc::new(AppState {
            db: db.clone(),
            config,
            event_sender,
            services: services.clone(),
            auth: auth.clone(),
        });

        Self {
            db,
            services,
            auth,
            state,
        }
    }

    /// Inserts a product directly, bypassing the catalog service.
    pub async fn seed_product(
        &self,
        sku: &str,
        price: Decimal,
        quantity_on_hand: i32,
        reorder_point: i32,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("Product {}", sku)),
            description: Set(None),
            sku: Set(sku.to_string()),
            category: Set("electronics".to_string()),
            price: Set(price),
            cost_price: Set(Decimal::ZERO),
            quantity_on_hand: Set(quantity_on_hand),
            reorder_point: Set(reorder_point),
            supplier_id: Set(None),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("seed product")
    }

    pub async fn on_hand(&self, product_id: Uuid) -> i32 {
        use sea_orm::EntityTrait;
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await
            .expect("query product")
            .expect("product exists")
            .quantity_on_hand
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt_secret: "integration-test-secret-key-that-is-long-enough".into(),
        jwt_expiration: 3600,
        auth_issuer: "stockflow-api".into(),
        auth_audience: "stockflow-clients".into(),
        host: "127.0.0.1".into(),
        port: 0,
        environment: "development".into(),
        log_level: "warn".into(),
        log_json: false,
        auto_migrate: false,
        cors_allowed_origins: None,
        request_timeout_secs: 30,
    }
}
