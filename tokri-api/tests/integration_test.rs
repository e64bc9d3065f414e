use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

use tokri_api::{app, worker, AppState};
use tokri_catalog::coupon::CouponMint;
use tokri_core::events::EventBus;
use tokri_courier::gateway::MockCourier;
use tokri_courier::tariff::{ShippingRates, TariffResolver};
use tokri_order::manager::OrderManager;
use tokri_order::models::OrderStatus;
use tokri_return::manager::ReturnManager;
use tokri_store::MemoryStore;

struct TestApp {
    state: AppState,
    store: Arc<MemoryStore>,
    courier: Arc<MockCourier>,
}

fn test_app() -> TestApp {
    let store = MemoryStore::new();
    let courier = Arc::new(MockCourier::new());
    let events = EventBus::default();

    let orders = Arc::new(OrderManager::new(
        store.clone(),
        store.stock.clone(),
        store.clone(),
        courier.clone(),
        store.clone(),
        events.clone(),
        "steadfast".to_string(),
    ));
    let returns = Arc::new(ReturnManager::new(
        store.clone(),
        store.clone(),
        store.stock.clone(),
        CouponMint::new(store.clone()),
        courier.clone(),
        store.clone(),
        events.clone(),
        "steadfast".to_string(),
        7,
    ));
    let tariffs = Arc::new(TariffResolver::new(
        store.clone(),
        ShippingRates {
            origin_district: "Rajshahi".to_string(),
            inside_charge: 60,
            outside_charge: 120,
            free_shipping_enabled: true,
            free_shipping_threshold: 5000,
        },
    ));

    let state = AppState {
        orders,
        returns,
        tariffs,
        tariff_repo: store.clone(),
        courier: courier.clone(),
        events,
        reconcile_batch: 200,
    };

    TestApp {
        state,
        store,
        courier,
    }
}

fn order_body(product_id: Uuid) -> String {
    serde_json::json!({
        "customer_id": "cust-1",
        "order_number": null,
        "items": [{
            "product_id": product_id,
            "variant_id": null,
            "qty": 1,
            "unit_price": 500,
            "title": "Jamdani Saree"
        }],
        "shipping": {
            "name": "Shirin Akter",
            "phone": "01710000000",
            "address": "House 12, Shaheb Bazar",
            "city": "Dhaka"
        },
        "payment_method": "cod",
        "shipping_charge": 80,
        "discount": 0,
        "coupon_code": null
    })
    .to_string()
}

async fn json_response(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_create_then_fetch_order() {
    let t = test_app();

    let response = app(t.state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/orders")
                .header("content-type", "application/json")
                .header("x-actor", "cust-1")
                .body(Body::from(order_body(Uuid::new_v4())))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = json_response(response).await;
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    let response = app(t.state.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/v1/orders/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = json_response(response).await;
    assert_eq!(fetched["total"], 580);
}

#[tokio::test]
async fn test_dispatch_requires_admin_role() {
    let t = test_app();
    let order = json_response(
        app(t.state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/orders")
                    .header("content-type", "application/json")
                    .body(Body::from(order_body(Uuid::new_v4())))
                    .unwrap(),
            )
            .await
            .unwrap(),
    )
    .await;
    let id = order["id"].as_str().unwrap();

    let forbidden = app(t.state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/orders/{}/dispatch", id))
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let dispatched = app(t.state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/orders/{}/dispatch", id))
                .header("content-type", "application/json")
                .header("x-role", "admin")
                .header("x-actor", "admin:rafi")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(dispatched.status(), StatusCode::OK);

    // Dispatching again trips the idempotency guard
    let again = app(t.state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/orders/{}/dispatch", id))
                .header("content-type", "application/json")
                .header("x-role", "admin")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_shipping_quote_applies_free_shipping() {
    let t = test_app();

    let response = app(t.state.clone())
        .oneshot(
            Request::builder()
                .uri("/v1/shipping/quote?origin=Rajshahi&destination=Dhaka&cart_total=6000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_response(response).await["charge"], 0);

    let response = app(t.state.clone())
        .oneshot(
            Request::builder()
                .uri("/v1/shipping/quote?origin=Rajshahi&destination=Dhaka&cart_total=1000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(json_response(response).await["charge"], 120);
}

#[tokio::test]
async fn test_worker_reconciles_outstanding_orders() {
    let t = test_app();
    let order = t
        .state
        .orders
        .create(
            serde_json::from_str(&order_body(Uuid::new_v4())).unwrap(),
            "cust-1",
        )
        .await
        .unwrap();
    let order = t
        .state
        .orders
        .dispatch(order.id, Some(80), "admin:rafi")
        .await
        .unwrap();
    let tracking = order.courier.as_ref().unwrap().tracking_id.clone();
    t.courier.set_status(&tracking, "delivered");

    let handle = tokio::spawn(worker::run_reconciliation_worker(
        t.state.orders.clone(),
        1,
        200,
    ));
    // The first tick fires immediately
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    handle.abort();

    let order = t.state.orders.get(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);

    // The sweep's courier probe went through the activity log too
    let actions: Vec<String> = t
        .store
        .activity_entries()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert!(actions.contains(&"order_delivered".to_string()));
}
