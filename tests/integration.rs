use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ride_coordinator::api::rest::router;
use ride_coordinator::config::Config;
use ride_coordinator::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> Router {
    router(Arc::new(AppState::in_memory(Config::default())))
}

fn json_request(method: &str, uri: &str, user: &str, role: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", user)
        .header("x-user-role", role)
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn post_as(uri: &str, user: &str, role: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", user)
        .header("x-user-role", role)
        .body(Body::empty())
        .unwrap()
}

fn get_as(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-user-id", user)
        .body(Body::empty())
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

fn ride_body(method: &str) -> Value {
    json!({
        "pickup": { "label": "MG Road Metro", "point": { "lat": 12.9716, "lng": 77.5946 } },
        "dropoff": { "label": "Indiranagar", "point": { "lat": 12.9784, "lng": 77.6408 } },
        "payment_method": method
    })
}

async fn online_driver(app: &Router, driver_id: &str) {
    for uri in ["/drivers", "/drivers/go-online"] {
        let res = app.clone().oneshot(post_as(uri, driver_id, "driver")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers/location",
            driver_id,
            "driver",
            json!({ "lat": 12.972, "lng": 77.595 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

async fn create_ride(app: &Router, rider_id: &str, method: &str) -> String {
    let res = app
        .clone()
        .oneshot(json_request("POST", "/rides", rider_id, "rider", ride_body(method)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ride = body_json(res).await;
    ride["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rides"], 0);
    assert_eq!(body["offers"], 0);
    assert_eq!(body["drivers"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    online_driver(&app, "d1").await;

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
    assert!(body.contains("online_drivers 1"));
}

#[tokio::test]
async fn missing_identity_returns_400() {
    let app = setup();
    let request = Request::builder()
        .method("POST")
        .uri("/rides")
        .header("content-type", "application/json")
        .body(Body::from(ride_body("CASH").to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "validation");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn invalid_coordinates_return_400() {
    let app = setup();
    let mut body = ride_body("CASH");
    body["pickup"]["point"]["lat"] = json!(123.0);

    let response = app
        .oneshot(json_request("POST", "/rides", "r1", "rider", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_nonexistent_ride_returns_404() {
    let app = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_as(&format!("/rides/{fake_id}"), "r1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_ride_returns_requested_without_otp() {
    let app = setup();
    let response = app
        .oneshot(json_request("POST", "/rides", "r1", "rider", ride_body("GATEWAY")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "REQUESTED");
    assert_eq!(body["payment_status"], "PENDING");
    assert_eq!(body["payment_method"], "GATEWAY");
    assert_eq!(body["rider_id"], "r1");
    assert!(body["driver_id"].is_null());
    assert!(body["fare"].as_u64().unwrap() >= 100);
    assert!(body.get("otp_code").is_none());
}

#[tokio::test]
async fn search_without_drivers_returns_503() {
    let app = setup();
    let ride_id = create_ride(&app, "r1", "CASH").await;

    let response = app
        .clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/search"), "r1", "rider"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "policy_denied");

    let response = app
        .oneshot(get_as(&format!("/rides/{ride_id}"), "r1"))
        .await
        .unwrap();
    let ride = body_json(response).await;
    assert_eq!(ride["status"], "SEARCHING");
}

#[tokio::test]
async fn riders_cannot_accept_rides() {
    let app = setup();
    online_driver(&app, "d1").await;
    let ride_id = create_ride(&app, "r1", "CASH").await;
    app.clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/search"), "r1", "rider"))
        .await
        .unwrap();

    let response = app
        .oneshot(post_as(&format!("/rides/{ride_id}/accept"), "r1", "rider"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn full_cash_ride_flow() {
    let app = setup();
    online_driver(&app, "d1").await;
    online_driver(&app, "d2").await;
    let ride_id = create_ride(&app, "r1", "CASH").await;

    let res = app
        .clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/search"), "r1", "rider"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let outcome = body_json(res).await;
    assert_eq!(outcome["ride"]["status"], "SEARCHING");
    assert_eq!(outcome["offers"].as_array().unwrap().len(), 2);

    let res = app
        .clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/accept"), "d1", "driver"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let accepted = body_json(res).await;
    assert_eq!(accepted["status"], "ACCEPTED");
    assert_eq!(accepted["driver_id"], "d1");
    assert!(accepted.get("otp_code").is_none());

    let res = app
        .clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/accept"), "d2", "driver"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let conflict = body_json(res).await;
    assert_eq!(conflict["kind"], "conflict");
    assert_eq!(conflict["retryable"], true);

    // Only the rider may read the start code.
    let res = app
        .clone()
        .oneshot(get_as(&format!("/rides/{ride_id}/otp"), "d1"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = app
        .clone()
        .oneshot(get_as(&format!("/rides/{ride_id}/otp"), "r1"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let otp = body_json(res).await["otp"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/enroute"), "d1", "driver"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/rides/{ride_id}/start"),
            "d1",
            "driver",
            json!({ "otp": otp }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "STARTED");

    let res = app
        .clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/complete"), "d1", "driver"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "COMPLETED");

    let res = app
        .clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/mark-paid"), "d1", "driver"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["payment_status"], "PAID");

    let res = app
        .clone()
        .oneshot(get_as("/drivers/d1", "d1"))
        .await
        .unwrap();
    let driver = body_json(res).await;
    assert_eq!(driver["is_online"], true);
    assert_eq!(driver["is_available"], true);

    let res = app
        .oneshot(get_as(&format!("/rides/{ride_id}/offers"), "r1"))
        .await
        .unwrap();
    let offers = body_json(res).await;
    let statuses: Vec<&str> = offers
        .as_array()
        .unwrap()
        .iter()
        .map(|offer| offer["status"].as_str().unwrap())
        .collect();
    assert!(statuses.contains(&"ACCEPTED"));
    assert!(statuses.contains(&"EXPIRED"));
}

#[tokio::test]
async fn gateway_webhook_is_applied_once() {
    let app = setup();
    online_driver(&app, "d1").await;
    let ride_id = create_ride(&app, "r1", "GATEWAY").await;

    app.clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/search"), "r1", "rider"))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/accept"), "d1", "driver"))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/enroute"), "d1", "driver"))
        .await
        .unwrap();
    let res = app
        .clone()
        .oneshot(get_as(&format!("/rides/{ride_id}/otp"), "r1"))
        .await
        .unwrap();
    let otp = body_json(res).await["otp"].as_str().unwrap().to_string();
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/rides/{ride_id}/start"),
            "d1",
            "driver",
            json!({ "otp": otp }),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/complete"), "d1", "driver"))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/mark-paid"), "d1", "driver"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = app
        .clone()
        .oneshot(post_as(&format!("/rides/{ride_id}/pay"), "r1", "rider"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let initiation = body_json(res).await;
    assert_eq!(initiation["ride"]["payment_status"], "PROCESSING");
    let order_id = initiation["order"]["order_id"].as_str().unwrap().to_string();

    let event = json!({
        "type": "payment.captured",
        "order_id": order_id,
        "payment_id": "pay_1"
    });
    let res = app
        .clone()
        .oneshot(json_request("POST", "/webhooks/payments", "gateway", "admin", event.clone()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ack = body_json(res).await;
    assert_eq!(ack["applied"], true);
    assert_eq!(ack["payment_status"], "PAID");

    let res = app
        .clone()
        .oneshot(json_request("POST", "/webhooks/payments", "gateway", "admin", event))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ack = body_json(res).await;
    assert_eq!(ack["applied"], false);

    let res = app
        .oneshot(get_as(&format!("/rides/{ride_id}"), "r1"))
        .await
        .unwrap();
    let ride = body_json(res).await;
    assert_eq!(ride["payment_status"], "PAID");
    assert_eq!(ride["gateway_payment_id"], "pay_1");
}
