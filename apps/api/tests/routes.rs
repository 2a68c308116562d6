//! Integration tests for the HTTP surface.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;

use meridian_api::invalidation::NoopInvalidator;
use meridian_api::{create_app, AppState};
use meridian_core::TaxRate;
use meridian_db::{Database, DbConfig};

async fn setup() -> (axum::Router, AppState, TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let db = Database::new(DbConfig::new(dir.path().join("meridian.db")))
        .await
        .expect("failed to open database");
    let state = AppState::new(db, Arc::new(NoopInvalidator), TaxRate::zero());
    let app = create_app(state.clone());
    (app, state, dir)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _state, _dir) = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_stock_put_and_get() {
    let (app, _state, _dir) = setup().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/stock/1/10",
            serde_json::json!({ "quantity": 5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stock/1/10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["quantity"], 5);
}

#[tokio::test]
async fn test_create_sale_created() {
    let (app, state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/sales",
            serde_json::json!({
                "storeId": 1,
                "customerId": 7,
                "lines": [{ "productId": 10, "quantity": 3, "unitPriceCents": 999 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "active");
    assert_eq!(json["totalCents"], 2997);
    assert_eq!(json["lines"][0]["productId"], 10);
    assert!(json["id"].as_str().is_some());
    assert!(json["date"].as_str().is_some());
}

#[tokio::test]
async fn test_create_sale_insufficient_stock_conflict() {
    let (app, state, _dir) = setup().await;
    state.stock.set_level(1, 10, 2).await.unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/sales",
            serde_json::json!({
                "storeId": 1,
                "customerId": 7,
                "lines": [{ "productId": 10, "quantity": 3, "unitPriceCents": 999 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["error"], "INSUFFICIENT_STOCK");
    assert!(json["message"].as_str().unwrap().contains("available 2"));
}

#[tokio::test]
async fn test_create_sale_validation_error() {
    let (app, _state, _dir) = setup().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/sales",
            serde_json::json!({
                "storeId": 1,
                "customerId": 7,
                "lines": []
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_refund_flow_over_http() {
    let (app, state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/sales",
            serde_json::json!({
                "storeId": 1,
                "customerId": 7,
                "lines": [{ "productId": 10, "quantity": 3, "unitPriceCents": 999 }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let sale = body_json(response).await;
    let sale_id = sale["id"].as_str().unwrap().to_string();

    // full refund: no lines field
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/refunds",
            serde_json::json!({
                "saleId": sale_id,
                "reason": "damaged in transit"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let refund = body_json(response).await;
    assert_eq!(refund["totalCents"], 2997);
    assert_eq!(refund["saleId"], sale_id.as_str());

    // the sale view now carries the refund and the terminal status
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/sales/{sale_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await;
    assert_eq!(detail["status"], "refunded");
    assert_eq!(detail["refunds"].as_array().unwrap().len(), 1);

    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 5);
}

#[tokio::test]
async fn test_refund_unknown_sale_not_found() {
    let (app, _state, _dir) = setup().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/refunds",
            serde_json::json!({
                "saleId": "2d9e1f39-0c0f-4c0e-a6a3-31337cafe000",
                "reason": "never happened"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_get_sale_not_found() {
    let (app, _state, _dir) = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/sales/2d9e1f39-0c0f-4c0e-a6a3-31337cafe000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
