//! Product and supplier CRUD semantics: uniqueness, normalization, credit
//! balance behavior, and the dashboard aggregation built on top.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use stockflow_api::errors::ServiceError;
use stockflow_api::services::products::{
    CreateProductRequest, ProductListParams, UpdateProductRequest,
};
use stockflow_api::services::suppliers::{BalanceOperation, CreateSupplierRequest};

fn product_request(sku: &str) -> CreateProductRequest {
    CreateProductRequest {
        name: format!("Product {}", sku),
        description: None,
        sku: sku.to_string(),
        category: "office".to_string(),
        price: dec!(12.50),
        cost_price: dec!(10.00),
        quantity_on_hand: 20,
        reorder_point: 5,
        supplier_id: None,
    }
}

fn supplier_request(code: &str) -> CreateSupplierRequest {
    CreateSupplierRequest {
        name: "Acme Supplies".to_string(),
        code: code.to_string(),
        contact_name: Some("Jane Smith".to_string()),
        email: Some("jane.smith@acme.example".to_string()),
        phone: None,
        address: None,
        credit_limit: Some(dec!(1000)),
    }
}

#[tokio::test]
async fn sku_is_uppercased_and_unique() {
    let app = TestApp::new().await;

    let created = app
        .services
        .products
        .create_product(product_request("wid-001"))
        .await
        .expect("create");
    assert_eq!(created.sku, "WID-001");

    let err = app
        .services
        .products
        .create_product(product_request("WID-001"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn unknown_category_is_rejected() {
    let app = TestApp::new().await;

    let mut request = product_request("CAT-1");
    request.category = "gadgets".to_string();

    assert_matches!(
        app.services.products.create_product(request).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn negative_money_is_rejected() {
    let app = TestApp::new().await;

    let mut request = product_request("NEG-1");
    request.price = dec!(-1);

    assert_matches!(
        app.services.products.create_product(request).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn list_products_filters_by_low_stock_and_search() {
    let app = TestApp::new().await;
    app.seed_product("FIL-LOW", dec!(1.00), 2, 5).await;
    app.seed_product("FIL-OK", dec!(1.00), 50, 5).await;

    let (low, _) = app
        .services
        .products
        .list_products(
            1,
            20,
            ProductListParams {
                low_stock: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].sku, "FIL-LOW");

    let (found, total) = app
        .services
        .products
        .list_products(
            1,
            20,
            ProductListParams {
                search: Some("fil-ok".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(found[0].sku, "FIL-OK");
}

#[tokio::test]
async fn update_product_does_not_touch_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product("UPD-1", dec!(10.00), 7, 2).await;

    let updated = app
        .services
        .products
        .update_product(
            product.id,
            UpdateProductRequest {
                name: Some("Renamed".to_string()),
                description: None,
                sku: None,
                category: None,
                price: Some(dec!(11.00)),
                cost_price: None,
                reorder_point: None,
                supplier_id: None,
                is_active: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.price, dec!(11.00));
    assert_eq!(updated.quantity_on_hand, 7);
}

#[tokio::test]
async fn supplier_code_is_unique() {
    let app = TestApp::new().await;

    app.services
        .suppliers
        .create_supplier(supplier_request("ACME"))
        .await
        .expect("create");

    let err = app
        .services
        .suppliers
        .create_supplier(supplier_request("acme"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn balance_decrease_floors_at_zero() {
    let app = TestApp::new().await;
    let supplier = app
        .services
        .suppliers
        .create_supplier(supplier_request("BAL"))
        .await
        .unwrap();

    let after_increase = app
        .services
        .suppliers
        .adjust_balance(supplier.id, dec!(300), BalanceOperation::Increase)
        .await
        .unwrap();
    assert_eq!(after_increase.current_balance, dec!(300));
    assert_eq!(after_increase.available_credit(), dec!(700));

    let after_decrease = app
        .services
        .suppliers
        .adjust_balance(supplier.id, dec!(500), BalanceOperation::Decrease)
        .await
        .unwrap();
    assert_eq!(after_decrease.current_balance, dec!(0));
    assert_eq!(after_decrease.available_credit(), dec!(1000));
}

#[tokio::test]
async fn credit_exceeded_uses_prospective_balance() {
    let app = TestApp::new().await;
    let supplier = app
        .services
        .suppliers
        .create_supplier(supplier_request("CRED"))
        .await
        .unwrap();

    let supplier = app
        .services
        .suppliers
        .adjust_balance(supplier.id, dec!(900), BalanceOperation::Increase)
        .await
        .unwrap();

    assert!(supplier.credit_exceeded(dec!(200)));
    assert!(!supplier.credit_exceeded(dec!(100)));
}

#[tokio::test]
async fn deleting_a_supplier_leaves_products_in_place() {
    let app = TestApp::new().await;
    let supplier = app
        .services
        .suppliers
        .create_supplier(supplier_request("GONE"))
        .await
        .unwrap();

    let mut request = product_request("ORPHAN-1");
    request.supplier_id = Some(supplier.id);
    let product = app
        .services
        .products
        .create_product(request)
        .await
        .unwrap();

    app.services
        .suppliers
        .delete_supplier(supplier.id)
        .await
        .unwrap();

    // Weak reference: the product survives with a dangling supplier id.
    let survivor = app
        .services
        .products
        .get_product(product.id)
        .await
        .unwrap()
        .expect("product still exists");
    assert_eq!(survivor.supplier_id, Some(supplier.id));
}

#[tokio::test]
async fn dashboard_summary_counts_and_revenue() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("DASH-1", dec!(10.00), 10, 2).await;
    app.seed_product("DASH-2", dec!(3.00), 0, 2).await;

    use stockflow_api::services::orders::{CreateOrderRequest, CustomerInfo, OrderLineRequest};
    let order = app
        .services
        .orders
        .create_order(
            CreateOrderRequest {
                customer: CustomerInfo {
                    name: "Dash".into(),
                    email: "dash@example.com".into(),
                    phone: None,
                    address: None,
                },
                lines: vec![OrderLineRequest {
                    product_id: p1.id,
                    quantity: 2,
                }],
                tax: None,
                shipping: None,
                payment_method: None,
                notes: None,
            },
            None,
        )
        .await
        .unwrap();

    let summary = app.services.reports.dashboard_summary().await.unwrap();
    assert_eq!(summary.total_products, 2);
    assert_eq!(summary.out_of_stock_products, 1);
    assert_eq!(summary.low_stock_products, 1);
    assert_eq!(summary.total_orders, 1);
    assert_eq!(summary.total_revenue, dec!(20.00));
    assert_eq!(summary.orders_by_status.get("pending"), Some(&1));

    // Cancelled orders drop out of revenue but stay in the counts.
    app.services
        .order_status
        .transition(order.id, "cancelled")
        .await
        .unwrap();

    let summary = app.services.reports.dashboard_summary().await.unwrap();
    assert_eq!(summary.total_orders, 1);
    assert_eq!(summary.total_revenue, dec!(0));
    assert_eq!(summary.orders_by_status.get("cancelled"), Some(&1));
}

#[tokio::test]
async fn sales_summary_respects_the_window() {
    let app = TestApp::new().await;
    let p1 = app.seed_product("SALES-1", dec!(10.00), 10, 0).await;

    use stockflow_api::services::orders::{CreateOrderRequest, CustomerInfo, OrderLineRequest};
    app.services
        .orders
        .create_order(
            CreateOrderRequest {
                customer: CustomerInfo {
                    name: "Window".into(),
                    email: "window@example.com".into(),
                    phone: None,
                    address: None,
                },
                lines: vec![OrderLineRequest {
                    product_id: p1.id,
                    quantity: 1,
                }],
                tax: None,
                shipping: None,
                payment_method: None,
                notes: None,
            },
            None,
        )
        .await
        .unwrap();

    let now = chrono::Utc::now();
    let summary = app
        .services
        .reports
        .sales_summary(now - chrono::Duration::hours(1), now + chrono::Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(summary.total_orders, 1);
    assert_eq!(summary.total_revenue, dec!(10.00));
    assert_eq!(summary.average_order_value, dec!(10.00));

    let empty = app
        .services
        .reports
        .sales_summary(
            now - chrono::Duration::days(2),
            now - chrono::Duration::days(1),
        )
        .await
        .unwrap();
    assert_eq!(empty.total_orders, 0);
    assert_eq!(empty.total_revenue, dec!(0));

    assert_matches!(
        app.services.reports.sales_summary(now, now).await,
        Err(ServiceError::ValidationError(_))
    );
}
