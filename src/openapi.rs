use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockflow API",
        description = r#"
Inventory and order management API.

All endpoints except `/health` and the auth routes require a bearer token:

```
Authorization: Bearer <your-jwt-token>
```

Order creation reserves stock atomically per line and rolls the whole
attempt back if any line cannot be satisfied.
"#
    ),
    paths(
        crate::handlers::products::create_product,
        crate::handlers::products::list_products,
        crate::handlers::products::adjust_stock,
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::transition_status,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::orders::CreateOrderRequest,
        crate::services::orders::UpdateOrderRequest,
        crate::services::orders::OrderResponse,
        crate::services::orders::CustomerInfo,
        crate::services::orders::OrderLineRequest,
        crate::services::order_status::OrderStatus,
        crate::services::products::CreateProductRequest,
        crate::services::products::UpdateProductRequest,
        crate::services::products::ProductResponse,
        crate::services::products::ProductCategory,
        crate::services::inventory::StockOperation,
        crate::services::suppliers::CreateSupplierRequest,
        crate::services::suppliers::SupplierResponse,
        crate::services::suppliers::BalanceOperation,
        crate::handlers::products::AdjustStockRequest,
        crate::handlers::orders::TransitionStatusRequest,
    )),
    tags(
        (name = "orders", description = "Order assembly and lifecycle"),
        (name = "products", description = "Product catalog and stock ledger"),
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at /docs, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
