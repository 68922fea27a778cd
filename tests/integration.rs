use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use order_router::api::rest::router;
use order_router::distance::DistanceResolver;
use order_router::error::DistanceError;
use order_router::models::order::NewOrder;
use order_router::state::AppState;
use order_router::store::{MemoryOrderStore, OrderStore};
use serde_json::{json, Value};
use tower::ServiceExt;

const EXPECTED_DISTANCE: u64 = 3527;

struct FixedResolver(u64);

#[async_trait]
impl DistanceResolver for FixedResolver {
    async fn resolve(&self, _origin: &str, _destination: &str) -> Result<u64, DistanceError> {
        Ok(self.0)
    }
}

struct FailingResolver;

#[async_trait]
impl DistanceResolver for FailingResolver {
    async fn resolve(&self, _origin: &str, _destination: &str) -> Result<u64, DistanceError> {
        Err(DistanceError::Status("OVER_QUERY_LIMIT".to_string()))
    }
}

fn setup_with(resolver: Arc<dyn DistanceResolver>) -> (axum::Router, Arc<MemoryOrderStore>) {
    let store = Arc::new(MemoryOrderStore::default());
    let state = AppState::new(store.clone(), resolver);
    (router(Arc::new(state)), store)
}

fn setup() -> (axum::Router, Arc<MemoryOrderStore>) {
    setup_with(Arc::new(FixedResolver(EXPECTED_DISTANCE)))
}

async fn seed(store: &MemoryOrderStore, count: usize) {
    for i in 0..count {
        store
            .create_order(NewOrder {
                origin: "12.9734,77.5910".to_string(),
                destination: "12.9527,77.5848".to_string(),
                distance: 1000 + i as i64,
            })
            .await
            .unwrap();
    }
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    raw_request(method, uri, serde_json::to_string(&body).unwrap())
}

fn raw_request(method: &str, uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, store) = setup();
    seed(&store, 2).await;
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 2);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _store) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("orders_created_total"));
}

#[tokio::test]
async fn create_order_persists_unassigned_order() {
    let (app, store) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/order",
            json!({
                "origin": ["12.9734", "77.5910"],
                "destination": ["12.9527", "77.5848"]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["distance"], EXPECTED_DISTANCE);
    assert_eq!(body["status"], "UNASSIGNED");

    let id = body["id"].as_i64().unwrap();
    let stored = store.get_order(id).await.unwrap();
    assert_eq!(stored.origin, "12.9734,77.5910");
    assert_eq!(stored.destination, "12.9527,77.5848");
    assert_eq!(stored.distance, EXPECTED_DISTANCE as i64);
}

#[tokio::test]
async fn create_order_invalid_input_returns_400() {
    let cases = [
        (
            json!({ "origin": ["bad_input"], "destination": ["40.7127", "-74.0134"] }).to_string(),
            "origin and destination must be valid lat, lng pairs",
        ),
        (
            json!({ "origin": ["bad_input"], "destination": ["bad_input"] }).to_string(),
            "origin and destination must be valid lat, lng pairs",
        ),
        (
            json!({ "origin": ["91", "0"], "destination": ["40.7127", "-74.0134"] }).to_string(),
            "origin and destination must be valid lat, lng pairs",
        ),
        (
            json!({ "origin": 1, "destination": "bogus" }).to_string(),
            "",
        ),
        (json!({ "origin": -42, "destination": 100 }).to_string(), ""),
    ];

    for (body, message) in cases {
        let (app, store) = setup();
        let response = app
            .oneshot(raw_request("POST", "/order", body.clone()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        let error = body_json(response).await;
        assert!(error["error"].as_str().unwrap().contains(message), "{body}");
        assert_eq!(store.count_orders().await.unwrap(), 0);
    }
}

#[tokio::test]
async fn resolver_failure_returns_502_and_persists_nothing() {
    let (app, store) = setup_with(Arc::new(FailingResolver));
    let response = app
        .oneshot(json_request(
            "POST",
            "/order",
            json!({
                "origin": ["12.9734", "77.5910"],
                "destination": ["12.9527", "77.5848"]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(store.count_orders().await.unwrap(), 0);
}

#[tokio::test]
async fn take_order_then_conflict() {
    let (app, store) = setup();
    seed(&store, 1).await;

    let res = app
        .clone()
        .oneshot(json_request("PUT", "/order/1", json!({ "status": "taken" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_string(res).await, r#"{"status":"SUCCESS"}"#);

    let res = app
        .clone()
        .oneshot(json_request("PUT", "/order/1", json!({ "status": "TAKEN" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_string(res).await, r#"{"error":"ORDER_ALREADY_BEEN_TAKEN"}"#);

    let res = app.oneshot(get_request("/order/1")).await.unwrap();
    let order = body_json(res).await;
    assert_eq!(order["status"], "TAKEN");
}

#[tokio::test]
async fn release_order_round_trip() {
    let (app, store) = setup();
    seed(&store, 1).await;

    let res = app
        .clone()
        .oneshot(json_request("PUT", "/order/1", json!({ "status": "UNASSIGNED" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_string(res).await, r#"{"error":"ORDER_ALREADY_UNASSIGNED"}"#);

    for status in ["TAKEN", "UNASSIGNED", "TAKEN"] {
        let res = app
            .clone()
            .oneshot(json_request("PUT", "/order/1", json!({ "status": status })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{status}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_put_requests_take_once() {
    let (app, store) = setup();
    seed(&store, 1).await;

    let responses = futures::future::join_all((0..8).map(|_| {
        app.clone()
            .oneshot(json_request("PUT", "/order/1", json!({ "status": "taken" })))
    }))
    .await;

    let statuses: Vec<StatusCode> = responses
        .into_iter()
        .map(|response| response.unwrap().status())
        .collect();
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(),
        7
    );
}

#[tokio::test]
async fn update_order_invalid_input() {
    let (app, store) = setup();
    seed(&store, 1).await;

    for bad in ["BOGUS%20ENTRY", "43.5466"] {
        let res = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/order/{bad}"),
                json!({ "status": "taken" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{bad}");
        assert!(body_string(res).await.contains(r#"{"error":"#));
    }

    for missing in ["99999", "-999", "0"] {
        let res = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/order/{missing}"),
                json!({ "status": "taken" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{missing}");
        let body = body_json(res).await;
        assert_eq!(body["error"], format!("No order present with id {missing}"));
    }

    for bad_body in [r#"{"status": "bogus"}"#, "Not-Valid-JSON}"] {
        let res = app
            .clone()
            .oneshot(raw_request("PUT", "/order/1", bad_body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{bad_body}");
        assert!(body_string(res).await.contains(r#"{"error":"#));
    }

    let order = store.get_order(1).await.unwrap();
    assert_eq!(order.status.as_str(), "UNASSIGNED");
}

#[tokio::test]
async fn list_orders_empty_store() {
    let (app, _store) = setup();
    let res = app
        .oneshot(get_request("/orders?page=1&limit=10"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!([]));
}

#[tokio::test]
async fn list_orders_pages_through_table() {
    let (app, store) = setup();
    seed(&store, 25).await;

    let mut sizes = Vec::new();
    for page in 1..=4 {
        let res = app
            .clone()
            .oneshot(get_request(&format!("/orders?page={page}&limit=10")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        sizes.push(body_json(res).await.as_array().unwrap().len());
    }
    assert_eq!(sizes, vec![10, 10, 5, 0]);

    let res = app.oneshot(get_request("/orders?page=2")).await.unwrap();
    let rows = body_json(res).await;
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["id"], 21);
    assert_eq!(rows[0]["status"], "UNASSIGNED");
}

#[tokio::test]
async fn list_orders_clamps_large_limit() {
    let (app, store) = setup();
    seed(&store, 120).await;

    let res = app.oneshot(get_request("/orders?limit=500")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 100);
}

#[tokio::test]
async fn list_orders_invalid_params_return_400() {
    let (app, _store) = setup();
    let endpoints = [
        "/orders?page=-1&limit=asd",
        "/orders?page=asd&limit=-1",
        "/orders?page=-1",
        "/orders?limit=-1",
        "/orders?page=asd",
        "/orders?limit=asd",
        "/orders?limit=0",
        "/orders?limit=%2010",
        "/orders?page=2%20",
    ];

    for endpoint in endpoints {
        let res = app.clone().oneshot(get_request(endpoint)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{endpoint}");
    }
}

#[tokio::test]
async fn list_orders_far_past_last_page_is_empty() {
    let (app, store) = setup();
    seed(&store, 1).await;

    let res = app
        .oneshot(get_request("/orders?page=5000000000"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!([]));
}

#[tokio::test]
async fn malformed_query_and_path_return_json_errors() {
    let (app, store) = setup();
    seed(&store, 1).await;

    for uri in ["/orders?limit=10&limit=20", "/orders?page=1&page=2", "/order/%FF"] {
        let res = app.clone().oneshot(get_request(uri)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert!(body_json(res).await["error"].is_string(), "{uri}");
    }

    let res = app
        .oneshot(json_request("PUT", "/order/%FF", json!({ "status": "taken" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(res).await["error"].is_string());
    assert_eq!(store.get_order(1).await.unwrap().status.as_str(), "UNASSIGNED");
}

#[tokio::test]
async fn routing_rejects_wrong_methods_and_paths() {
    let (app, _store) = setup();

    let res = app.clone().oneshot(get_request("/order")).await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let res = app
        .clone()
        .oneshot(json_request("POST", "/orders", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let res = app.oneshot(get_request("/bogus")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
