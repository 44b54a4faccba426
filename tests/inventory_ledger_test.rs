//! Ledger semantics: atomic reserve/release, manual adjustments, low-stock
//! detection, and the no-lost-update guarantee under concurrent reserves.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use stockflow_api::errors::ServiceError;
use stockflow_api::services::inventory::StockOperation;
use uuid::Uuid;

#[tokio::test]
async fn reserve_decrements_and_returns_balance() {
    let app = TestApp::new().await;
    let product = app.seed_product("RES-1", dec!(10.00), 10, 2).await;

    let remaining = app
        .services
        .inventory
        .reserve(product.id, 3)
        .await
        .expect("reserve");

    assert_eq!(remaining, 7);
    assert_eq!(app.on_hand(product.id).await, 7);
}

#[tokio::test]
async fn oversized_reserve_fails_and_leaves_stock_unchanged() {
    let app = TestApp::new().await;
    let product = app.seed_product("RES-2", dec!(10.00), 4, 0).await;

    let err = app
        .services
        .inventory
        .reserve(product.id, 5)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(app.on_hand(product.id).await, 4);
}

#[tokio::test]
async fn reserve_unknown_product_is_not_found() {
    let app = TestApp::new().await;

    let err = app
        .services
        .inventory
        .reserve(Uuid::new_v4(), 1)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn reserve_rejects_non_positive_quantity() {
    let app = TestApp::new().await;
    let product = app.seed_product("RES-3", dec!(1.00), 5, 0).await;

    assert_matches!(
        app.services.inventory.reserve(product.id, 0).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        app.services.inventory.reserve(product.id, -2).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_eq!(app.on_hand(product.id).await, 5);
}

#[tokio::test]
async fn release_restores_and_may_exceed_original_level() {
    let app = TestApp::new().await;
    let product = app.seed_product("REL-1", dec!(10.00), 2, 0).await;

    app.services
        .inventory
        .release(product.id, 8)
        .await
        .expect("release");

    // Restocking past the starting level is legitimate.
    assert_eq!(app.on_hand(product.id).await, 10);
}

#[tokio::test]
async fn reserve_then_release_round_trips() {
    let app = TestApp::new().await;
    let product = app.seed_product("REL-2", dec!(10.00), 6, 0).await;

    app.services.inventory.reserve(product.id, 4).await.unwrap();
    app.services.inventory.release(product.id, 4).await.unwrap();

    assert_eq!(app.on_hand(product.id).await, 6);
}

#[tokio::test]
async fn adjust_stock_add_and_subtract() {
    let app = TestApp::new().await;
    let product = app.seed_product("ADJ-1", dec!(5.00), 10, 0).await;

    let after_add = app
        .services
        .inventory
        .adjust_stock(product.id, 5, StockOperation::Add)
        .await
        .expect("add");
    assert_eq!(after_add.quantity_on_hand, 15);

    let after_sub = app
        .services
        .inventory
        .adjust_stock(product.id, 12, StockOperation::Subtract)
        .await
        .expect("subtract");
    assert_eq!(after_sub.quantity_on_hand, 3);

    // Subtracting more than on hand is refused outright.
    let err = app
        .services
        .inventory
        .adjust_stock(product.id, 4, StockOperation::Subtract)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(app.on_hand(product.id).await, 3);
}

#[tokio::test]
async fn low_stock_is_at_or_below_reorder_point() {
    let app = TestApp::new().await;
    let product = app.seed_product("LOW-1", dec!(5.00), 6, 5).await;

    assert!(!app
        .services
        .inventory
        .is_low_stock(product.id)
        .await
        .unwrap());

    app.services.inventory.reserve(product.id, 1).await.unwrap();
    assert!(app
        .services
        .inventory
        .is_low_stock(product.id)
        .await
        .unwrap());

    let low = app.services.inventory.low_stock_products().await.unwrap();
    assert!(low.iter().any(|p| p.id == product.id));
}

#[tokio::test]
async fn concurrent_reserves_for_last_unit_produce_one_winner() {
    let app = TestApp::new().await;
    let product = app.seed_product("RACE-1", dec!(10.00), 1, 0).await;

    let inventory_a = app.services.inventory.clone();
    let inventory_b = app.services.inventory.clone();
    let id = product.id;

    let (a, b) = tokio::join!(
        tokio::spawn(async move { inventory_a.reserve(id, 1).await }),
        tokio::spawn(async move { inventory_b.reserve(id, 1).await }),
    );
    let results = [a.expect("task a"), b.expect("task b")];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::InsufficientStock(_))))
        .count();

    assert_eq!(successes, 1, "exactly one reservation must win");
    assert_eq!(insufficient, 1, "the loser must see InsufficientStock");
    assert_eq!(app.on_hand(product.id).await, 0);
}
