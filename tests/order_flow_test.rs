//! Order assembly, numbering, lifecycle and deletion, end to end against
//! the real ledger.

mod common;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use common::TestApp;
use rust_decimal_macros::dec;
use stockflow_api::errors::ServiceError;
use stockflow_api::services::orders::{CreateOrderRequest, CustomerInfo, OrderLineRequest, UpdateOrderRequest};
use uuid::Uuid;

fn customer() -> CustomerInfo {
    CustomerInfo {
        name: "Ada Lovelace".into(),
        email: "ada@example.com".into(),
        phone: Some("+44 20 7946 0958".into()),
        address: Some("12 St James's Square, London".into()),
    }
}

fn order_request(lines: Vec<OrderLineRequest>) -> CreateOrderRequest {
    CreateOrderRequest {
        customer: customer(),
        lines,
        tax: None,
        shipping: None,
        payment_method: Some("card".into()),
        notes: None,
    }
}

#[tokio::test]
async fn order_totals_follow_the_captured_prices() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("TOT-1", dec!(10.00), 10, 0).await;
    let p2 = app.seed_product("TOT-2", dec!(5.00), 10, 0).await;

    let mut request = order_request(vec![
        OrderLineRequest {
            product_id: p1.id,
            quantity: 2,
        },
        OrderLineRequest {
            product_id: p2.id,
            quantity: 1,
        },
    ]);
    request.tax = Some(dec!(2.00));
    request.shipping = Some(dec!(3.00));

    let order = app
        .services
        .orders
        .create_order(request, None)
        .await
        .expect("create order");

    assert_eq!(order.subtotal, dec!(25.00));
    assert_eq!(order.total_amount, dec!(30.00));
    assert_eq!(order.status, "pending");
    assert_eq!(order.items.len(), 2);

    let line1 = order.items.iter().find(|i| i.product_id == p1.id).unwrap();
    assert_eq!(line1.unit_price, dec!(10.00));
    assert_eq!(line1.total_price, dec!(20.00));

    // Stock was reserved for both lines.
    assert_eq!(app.on_hand(p1.id).await, 8);
    assert_eq!(app.on_hand(p2.id).await, 9);
}

#[tokio::test]
async fn failed_later_line_rolls_back_earlier_reservations() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("RB-1", dec!(10.00), 10, 0).await;
    let p2 = app.seed_product("RB-2", dec!(5.00), 1, 0).await;

    let err = app
        .services
        .orders
        .create_order(
            order_request(vec![
                OrderLineRequest {
                    product_id: p1.id,
                    quantity: 2,
                },
                OrderLineRequest {
                    product_id: p2.id,
                    quantity: 5,
                },
            ]),
            None,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(_));
    // Line 1's reservation must be fully rolled back.
    assert_eq!(app.on_hand(p1.id).await, 10);
    assert_eq!(app.on_hand(p2.id).await, 1);
}

#[tokio::test]
async fn unknown_product_fails_the_whole_order() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("NF-1", dec!(10.00), 10, 0).await;

    let err = app
        .services
        .orders
        .create_order(
            order_request(vec![
                OrderLineRequest {
                    product_id: p1.id,
                    quantity: 1,
                },
                OrderLineRequest {
                    product_id: Uuid::new_v4(),
                    quantity: 1,
                },
            ]),
            None,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(_));
    assert_eq!(app.on_hand(p1.id).await, 10);
}

#[tokio::test]
async fn order_numbers_increment_within_a_day_and_reset_across_days() {
    let app = TestApp::new().await;

    let sequence =
        stockflow_api::services::order_sequence::OrderSequenceService::new(app.db.clone());

    let may_first = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    assert_eq!(
        sequence.next_order_number(may_first).await.unwrap(),
        "ORD-20240501-001"
    );
    assert_eq!(
        sequence.next_order_number(may_first).await.unwrap(),
        "ORD-20240501-002"
    );
    assert_eq!(
        sequence.next_order_number(may_first).await.unwrap(),
        "ORD-20240501-003"
    );

    let next_day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
    assert_eq!(
        sequence.next_order_number(next_day).await.unwrap(),
        "ORD-20240502-001"
    );
}

#[tokio::test]
async fn created_orders_carry_the_daily_sequence() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("SEQ-1", dec!(1.00), 100, 0).await;

    let first = app
        .services
        .orders
        .create_order(
            order_request(vec![OrderLineRequest {
                product_id: p1.id,
                quantity: 1,
            }]),
            None,
        )
        .await
        .unwrap();
    let second = app
        .services
        .orders
        .create_order(
            order_request(vec![OrderLineRequest {
                product_id: p1.id,
                quantity: 1,
            }]),
            None,
        )
        .await
        .unwrap();

    let today = chrono::Utc::now().format("%Y%m%d").to_string();
    assert_eq!(first.order_number, format!("ORD-{}-001", today));
    assert_eq!(second.order_number, format!("ORD-{}-002", today));
}

#[tokio::test]
async fn cancelling_a_pending_order_restores_stock_exactly() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("CAN-1", dec!(10.00), 10, 0).await;
    let p2 = app.seed_product("CAN-2", dec!(5.00), 10, 0).await;

    let order = app
        .services
        .orders
        .create_order(
            order_request(vec![
                OrderLineRequest {
                    product_id: p1.id,
                    quantity: 2,
                },
                OrderLineRequest {
                    product_id: p2.id,
                    quantity: 1,
                },
            ]),
            None,
        )
        .await
        .unwrap();

    assert_eq!(app.on_hand(p1.id).await, 8);
    assert_eq!(app.on_hand(p2.id).await, 9);

    let cancelled = app
        .services
        .order_status
        .transition(order.id, "cancelled")
        .await
        .expect("cancel");
    assert_eq!(cancelled.status, "cancelled");

    assert_eq!(app.on_hand(p1.id).await, 10);
    assert_eq!(app.on_hand(p2.id).await, 10);
}

#[tokio::test]
async fn cancel_after_processing_does_not_restore_stock() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("CAN-3", dec!(10.00), 10, 0).await;

    let order = app
        .services
        .orders
        .create_order(
            order_request(vec![OrderLineRequest {
                product_id: p1.id,
                quantity: 4,
            }]),
            None,
        )
        .await
        .unwrap();

    for status in ["confirmed", "processing"] {
        app.services
            .order_status
            .transition(order.id, status)
            .await
            .unwrap();
    }

    app.services
        .order_status
        .transition(order.id, "cancelled")
        .await
        .unwrap();

    // Units are considered consumed once fulfillment started.
    assert_eq!(app.on_hand(p1.id).await, 6);
}

#[tokio::test]
async fn lifecycle_stamps_shipping_and_delivery_timestamps() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("LIFE-1", dec!(10.00), 10, 0).await;

    let order = app
        .services
        .orders
        .create_order(
            order_request(vec![OrderLineRequest {
                product_id: p1.id,
                quantity: 1,
            }]),
            None,
        )
        .await
        .unwrap();

    for status in ["confirmed", "processing"] {
        let updated = app
            .services
            .order_status
            .transition(order.id, status)
            .await
            .unwrap();
        assert!(updated.shipped_at.is_none());
        assert!(updated.delivered_at.is_none());
    }

    let shipped = app
        .services
        .order_status
        .transition(order.id, "shipped")
        .await
        .unwrap();
    assert!(shipped.shipped_at.is_some());
    assert!(shipped.delivered_at.is_none());

    let delivered = app
        .services
        .order_status
        .transition(order.id, "delivered")
        .await
        .unwrap();
    assert!(delivered.delivered_at.is_some());

    // Terminal: nothing moves out of delivered.
    let err = app
        .services
        .order_status
        .transition(order.id, "pending")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));
}

#[tokio::test]
async fn skipping_states_and_bogus_targets_are_invalid() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("INV-1", dec!(10.00), 10, 0).await;

    let order = app
        .services
        .orders
        .create_order(
            order_request(vec![OrderLineRequest {
                product_id: p1.id,
                quantity: 1,
            }]),
            None,
        )
        .await
        .unwrap();

    assert_matches!(
        app.services
            .order_status
            .transition(order.id, "shipped")
            .await,
        Err(ServiceError::InvalidStatus(_))
    );
    assert_matches!(
        app.services
            .order_status
            .transition(order.id, "bogus")
            .await,
        Err(ServiceError::InvalidStatus(_))
    );
    assert_matches!(
        app.services
            .order_status
            .transition(Uuid::new_v4(), "confirmed")
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn shipped_orders_cannot_be_edited() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("EDIT-1", dec!(10.00), 10, 0).await;

    let order = app
        .services
        .orders
        .create_order(
            order_request(vec![OrderLineRequest {
                product_id: p1.id,
                quantity: 1,
            }]),
            None,
        )
        .await
        .unwrap();

    for status in ["confirmed", "processing", "shipped"] {
        app.services
            .order_status
            .transition(order.id, status)
            .await
            .unwrap();
    }

    let err = app
        .services
        .orders
        .update_order(
            order.id,
            UpdateOrderRequest {
                customer: None,
                lines: None,
                tax: Some(dec!(1.00)),
                shipping: None,
                payment_method: None,
                notes: None,
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::OrderNotEditable(_));
}

#[tokio::test]
async fn editing_a_pending_order_replaces_lines_and_reconciles_stock() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("EDIT-2", dec!(10.00), 10, 0).await;
    let p2 = app.seed_product("EDIT-3", dec!(4.00), 10, 0).await;

    let order = app
        .services
        .orders
        .create_order(
            order_request(vec![OrderLineRequest {
                product_id: p1.id,
                quantity: 3,
            }]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(app.on_hand(p1.id).await, 7);

    let updated = app
        .services
        .orders
        .update_order(
            order.id,
            UpdateOrderRequest {
                customer: None,
                lines: Some(vec![OrderLineRequest {
                    product_id: p2.id,
                    quantity: 2,
                }]),
                tax: None,
                shipping: None,
                payment_method: None,
                notes: None,
            },
        )
        .await
        .expect("edit order");

    assert_eq!(updated.subtotal, dec!(8.00));
    assert_eq!(updated.items.len(), 1);

    // Old reservation returned, new one taken.
    assert_eq!(app.on_hand(p1.id).await, 10);
    assert_eq!(app.on_hand(p2.id).await, 8);
}

#[tokio::test]
async fn failed_edit_keeps_the_original_reservations() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("EDIT-4", dec!(10.00), 10, 0).await;
    let p2 = app.seed_product("EDIT-5", dec!(4.00), 1, 0).await;

    let order = app
        .services
        .orders
        .create_order(
            order_request(vec![OrderLineRequest {
                product_id: p1.id,
                quantity: 3,
            }]),
            None,
        )
        .await
        .unwrap();

    let err = app
        .services
        .orders
        .update_order(
            order.id,
            UpdateOrderRequest {
                customer: None,
                lines: Some(vec![OrderLineRequest {
                    product_id: p2.id,
                    quantity: 5,
                }]),
                tax: None,
                shipping: None,
                payment_method: None,
                notes: None,
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(_));
    // Nothing moved: the original reservation stands, the new one never took.
    assert_eq!(app.on_hand(p1.id).await, 7);
    assert_eq!(app.on_hand(p2.id).await, 1);
}

#[tokio::test]
async fn deleting_a_pending_order_releases_its_stock() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("DEL-1", dec!(10.00), 10, 0).await;

    let order = app
        .services
        .orders
        .create_order(
            order_request(vec![OrderLineRequest {
                product_id: p1.id,
                quantity: 4,
            }]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(app.on_hand(p1.id).await, 6);

    app.services
        .orders
        .delete_order(order.id)
        .await
        .expect("delete");

    assert_eq!(app.on_hand(p1.id).await, 10);
    assert_matches!(
        app.services.orders.get_order(order.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn deleting_a_shipped_order_keeps_stock_consumed() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("DEL-2", dec!(10.00), 10, 0).await;

    let order = app
        .services
        .orders
        .create_order(
            order_request(vec![OrderLineRequest {
                product_id: p1.id,
                quantity: 4,
            }]),
            None,
        )
        .await
        .unwrap();

    for status in ["confirmed", "processing", "shipped"] {
        app.services
            .order_status
            .transition(order.id, status)
            .await
            .unwrap();
    }

    app.services.orders.delete_order(order.id).await.unwrap();
    assert_eq!(app.on_hand(p1.id).await, 6);
}
