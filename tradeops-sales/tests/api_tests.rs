//! Integration tests for the HTTP API
//!
//! Drives the full router with in-memory databases: the complete
//! upload -> parse -> fix-sku -> transform flow over HTTP, the dashboard
//! reads, and the error statuses each endpoint answers with.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower::util::ServiceExt;
use tradeops_common::config::ServiceConfig;
use tradeops_common::events::EventBus;
use tradeops_sales::services::allocator::RatioAllocator;
use tradeops_sales::{build_router, AppState};

/// Test helper: create the app over an in-memory database
async fn create_test_app_with_config(config: ServiceConfig) -> (axum::Router, sqlx::SqlitePool) {
    // One connection so every query sees the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    tradeops_sales::db::init_tables(&pool)
        .await
        .expect("schema");

    let event_bus = EventBus::new(100);
    let state = AppState::new(pool.clone(), event_bus, config, Arc::new(RatioAllocator));
    (build_router(state), pool)
}

async fn create_test_app() -> (axum::Router, sqlx::SqlitePool) {
    create_test_app_with_config(ServiceConfig::default()).await
}

async fn seed_catalog(pool: &sqlx::SqlitePool) {
    for (sku, cost) in [("SKU-100", "3.00"), ("SKU-200", "1.25")] {
        tradeops_sales::db::catalog::upsert_product(pool, sku, sku, cost.parse().unwrap())
            .await
            .expect("seed product");
    }
}

fn upload_body() -> Value {
    json!({
        "seller": "acme",
        "fifo_ratio_re": 1.0,
        "transactions": [
            "2025-06-02 09:00:00,Order,ORD-1,ITM-1,Widget,SKU-100 x2,2,24.00",
            "2025-06-02 10:00:00,Order,ORD-2,ITM-2,Widget,SKU-1O0,1,10.00",
            "2025-06-03 11:00:00,Refund,ORD-1,ITM-1,Widget,SKU-100 x2,1,-12.00",
            "2025-06-03 08:00:00,Cancellation,ORD-3,ITM-3,Widget,,0,0",
        ],
        "earnings": [
            "2025-06-02,Order,ORD-1,ITM-1,2,24.00,2.00,0.30,0,0,4.00,0,1.00,0",
            "2025-06-02,Order,ORD-2,ITM-2,1,10.00,1.00,0.30,0,0,3.00,0,0,0",
            "2025-06-03,Refund,ORD-1,ITM-1,1,-12.00,0,0,0,0,0,0,0,0",
        ],
    })
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn post(app: &axum::Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _pool) = create_test_app().await;

    let (status, json) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "tradeops-sales");
    assert!(json["uptime_seconds"].is_number());
}

#[tokio::test]
async fn test_upload_success() {
    let (app, _pool) = create_test_app().await;

    let (status, json) = post(&app, "/api/etl/upload", &upload_body()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["batch_id"].is_string());
    assert_eq!(json["trans_count"], 4);
    assert_eq!(json["trans_duplicates"], 0);
    assert_eq!(json["earn_count"], 3);
}

#[tokio::test]
async fn test_upload_blank_seller_rejected() {
    let (app, _pool) = create_test_app().await;

    let mut body = upload_body();
    body["seller"] = json!("   ");
    let (status, json) = post(&app, "/api/etl/upload", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
    assert!(json["error"]["message"].as_str().unwrap().contains("seller"));
}

#[tokio::test]
async fn test_upload_mismatched_ranges_rejected() {
    let (app, _pool) = create_test_app().await;

    let mut body = upload_body();
    body["earnings"] = json!(["2025-06-02,Order,ORD-1,ITM-1,2,24.00,0,0,0,0,0,0,0,0"]);
    let (status, json) = post(&app, "/api/etl/upload", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("date ranges differ"));
}

#[tokio::test]
async fn test_full_pipeline_flow_over_http() {
    let (app, pool) = create_test_app().await;
    seed_catalog(&pool).await;

    // Upload
    let (status, upload) = post(&app, "/api/etl/upload", &upload_body()).await;
    assert_eq!(status, StatusCode::OK);
    let batch_id = upload["batch_id"].as_str().unwrap().to_string();

    // Parse
    let (status, parsed) = post(
        &app,
        &format!("/api/etl/parse/{}", batch_id),
        &Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parsed["total_rows"], 3);
    assert_eq!(parsed["parsed_ok"], 2);
    assert_eq!(parsed["needs_fix"], 1);
    let pending = &parsed["pending_items"][0];
    assert_eq!(pending["bad_sku"], "SKU-1O0");
    assert_eq!(pending["suggestions"][0], "SKU-100");

    // Fix the one pending item
    let fix_body = json!({
        "fixes": [{
            "transaction_id": pending["transaction_id"],
            "custom_label": pending["custom_label"],
            "bad_sku": pending["bad_sku"],
            "bad_qty": pending["bad_qty"],
            "correct_sku": "SKU-200",
            "correct_qty": 1,
        }],
        "confirmed_by": "ops",
    });
    let (status, fixed) = post(&app, &format!("/api/etl/fix-sku/{}", batch_id), &fix_body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fixed["fixed_count"], 1);

    // Transform (no security code configured)
    let (status, transformed) = post(
        &app,
        &format!("/api/etl/transform/{}", batch_id),
        &json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(transformed["cleaned_count"], 4);
    assert_eq!(transformed["action_counts"]["Sales"], 2);
    assert_eq!(transformed["allocation"]["fifo_out_count"], 3);
    assert_eq!(transformed["allocation"]["fifo_return_count"], 1);

    // Status reflects the finished run
    let (status, batch) = get(&app, &format!("/api/etl/status/{}", batch_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch["status"], "done");
    assert_eq!(batch["progress"], 100);
    assert_eq!(batch["seller"], "acme");

    // Dashboard stats see the ledger
    let (status, stats) = get(&app, "/api/dashboard/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["raw_count"], 4);
    assert_eq!(stats["cleaned_count"], 4);
    assert_eq!(stats["min_date"], "2025-06-02");
    assert_eq!(stats["max_date"], "2025-06-03");
    assert_eq!(stats["action_counts"]["Sales"], 2);
    assert_eq!(stats["action_counts"]["Return"], 1);

    // Line chart: daily sold quantities
    let (status, chart) = get(
        &app,
        "/api/dashboard/aggregate?start=2025-06-02&end=2025-06-03&chart=line&mode=quantity&actions=sales",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chart["categories"].as_array().unwrap().len(), 2);
    assert_eq!(chart["series"][0]["name"], "Sales");
    assert_eq!(chart["series"][0]["data"], json!([3.0, 0.0]));

    // Pie chart: the five slices reconstruct gross sales
    let (status, pie) = get(
        &app,
        "/api/dashboard/aggregate?start=2025-06-02&end=2025-06-03&chart=pie",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let slices = pie["pie_data"].as_array().unwrap();
    assert_eq!(slices.len(), 5);
    let names: Vec<&str> = slices.iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        ["Net Sales", "Net Returns", "Shipping", "COGS", "Platform Fee"]
    );
    let total: f64 = slices.iter().map(|s| s["value"].as_f64().unwrap()).sum();
    let gross_sales = 34.0;
    assert!((total - gross_sales).abs() < 1e-9, "slices sum to {}", total);
}

#[tokio::test]
async fn test_transform_requires_security_code_when_configured() {
    let config = ServiceConfig {
        transform_security_code: Some("sesame".to_string()),
        ..ServiceConfig::default()
    };
    let (app, _pool) = create_test_app_with_config(config).await;
    let batch_id = uuid::Uuid::new_v4();

    // Missing code never reaches the pipeline
    let (status, json) = post(
        &app,
        &format!("/api/etl/transform/{}", batch_id),
        &json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "UNAUTHORIZED");

    let (status, _) = post(
        &app,
        &format!("/api/etl/transform/{}", batch_id),
        &json!({ "security_code": "wrong" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The right code passes the gate; the unknown batch then 404s
    let (status, _) = post(
        &app,
        &format!("/api/etl/transform/{}", batch_id),
        &json!({ "security_code": "sesame" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stage_conflict_maps_to_409() {
    let (app, _pool) = create_test_app().await;

    let (status, upload) = post(&app, "/api/etl/upload", &upload_body()).await;
    assert_eq!(status, StatusCode::OK);
    let batch_id = upload["batch_id"].as_str().unwrap();

    // Transform straight from uploaded is out of order
    let (status, json) = post(
        &app,
        &format!("/api/etl/transform/{}", batch_id),
        &json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_fix_sku_requires_confirmed_by() {
    let (app, _pool) = create_test_app().await;
    let batch_id = uuid::Uuid::new_v4();

    let (status, json) = post(
        &app,
        &format!("/api/etl/fix-sku/{}", batch_id),
        &json!({ "fixes": [], "confirmed_by": "  " }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("confirmed_by"));
}

#[tokio::test]
async fn test_status_unknown_batch_is_404() {
    let (app, _pool) = create_test_app().await;

    let (status, json) = get(
        &app,
        "/api/etl/status/00000000-0000-0000-0000-000000000000",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_batch_list_honors_limit() {
    let (app, _pool) = create_test_app().await;

    post(&app, "/api/etl/upload", &upload_body()).await;
    let mut second = upload_body();
    second["seller"] = json!("other-seller");
    post(&app, "/api/etl/upload", &second).await;

    let (status, json) = get(&app, "/api/etl/batches").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (status, json) = get(&app, "/api/etl/batches?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_aggregate_rejects_unknown_tokens() {
    let (app, _pool) = create_test_app().await;

    let (status, json) = get(
        &app,
        "/api/dashboard/aggregate?start=2025-06-02&end=2025-06-03&actions=sales,bogus",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"].as_str().unwrap().contains("bogus"));

    let (status, _) = get(
        &app,
        "/api/dashboard/aggregate?start=2025-06-02&end=2025-06-03&chart=scatter",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_aggregate_rejects_inverted_range() {
    let (app, _pool) = create_test_app().await;

    let (status, _) = get(
        &app,
        "/api/dashboard/aggregate?start=2025-06-03&end=2025-06-02",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sse_endpoint_connection() {
    let (app, _pool) = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/etl/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
}
