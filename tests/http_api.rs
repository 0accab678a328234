mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};
use tower::ServiceExt;

use cab_booking_api::{
    build_router,
    models::{
        auth::{Claims, Role},
        order::{BookingStatus, PaymentMethod},
    },
};
use common::{at, Harness, JWT_SECRET};

fn token(user_id: &ObjectId, role: Role) -> String {
    let claims = Claims {
        sub: user_id.to_hex(),
        role,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", bearer));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_is_public() {
    let h = Harness::new();
    let app = build_router(h.state.clone());
    let (status, body) = send(app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
    assert_eq!(body["currency"], "INR");
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let h = Harness::new();
    let app = build_router(h.state.clone());

    let (status, body) = send(app.clone(), Method::GET, "/api/orders/mine", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(app, Method::GET, "/api/orders/mine", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_assigns_and_driver_confirms_over_http() {
    let h = Harness::new();
    let driver = h.seed_driver().await;
    let passenger = h.seed_passenger().await;
    let cab = h.seed_cab(&driver, 4).await;
    let order = h
        .seed_order(&passenger, PaymentMethod::Online, 500.0, at(10, 8))
        .await;

    let admin_token = token(&ObjectId::new(), Role::Admin);
    let driver_token = token(&driver.id, Role::Driver);
    let app = build_router(h.state.clone());

    let (status, body) = send(
        app.clone(),
        Method::POST,
        &format!("/api/admin/orders/{}/assign", order.id.to_hex()),
        Some(&admin_token),
        Some(json!({ "cabId": cab.id.to_hex() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["bookingStatus"], "Assigning");
    assert_eq!(body["data"]["driverShare"]["Via"], "Us");

    // drivers may not assign
    let (status, _) = send(
        app.clone(),
        Method::POST,
        &format!("/api/admin/orders/{}/assign", order.id.to_hex()),
        Some(&driver_token),
        Some(json!({ "cabId": cab.id.to_hex() })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/api/driver/confirm",
        Some(&driver_token),
        Some(json!({ "orderId": order.id.to_hex() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["bookingStatus"], "Confirmed");

    let (status, body) = send(
        app,
        Method::GET,
        "/api/driver/upcoming",
        Some(&driver_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["accepted"].as_array().unwrap().len(), 1);

    assert_eq!(h.order(&order.id).await.booking_status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn early_completion_maps_to_bad_request() {
    let h = Harness::new();
    let driver = h.seed_driver().await;
    let passenger = h.seed_passenger().await;
    let cab = h.seed_cab(&driver, 4).await;
    let order = h
        .seed_order(&passenger, PaymentMethod::Cash, 500.0, at(10, 8))
        .await;
    let admin = h.admin();
    cab_booking_api::services::booking::assign(&h.state, &admin, order.id, cab.id)
        .await
        .unwrap();
    cab_booking_api::services::booking::confirm(&h.state, &h.as_driver(&driver), order.id)
        .await
        .unwrap();

    let (status, body) = send(
        build_router(h.state.clone()),
        Method::POST,
        &format!("/api/admin/orders/{}/complete", order.id.to_hex()),
        Some(&token(&admin.user_id, Role::Admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Booking not completed");
}

#[tokio::test]
async fn malformed_ids_are_rejected() {
    let h = Harness::new();
    let passenger = h.seed_passenger().await;
    let (status, body) = send(
        build_router(h.state.clone()),
        Method::GET,
        "/api/orders/definitely-not-an-id",
        Some(&token(&passenger.id, Role::Passenger)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
}

#[tokio::test]
async fn drivers_manage_their_fleet_over_http() {
    let h = Harness::new();
    let driver = h.seed_user(Role::Driver, false).await;
    let driver_token = token(&driver.id, Role::Driver);
    let admin_token = token(&ObjectId::new(), Role::Admin);
    let app = build_router(h.state.clone());

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/api/driver/cabs",
        Some(&driver_token),
        Some(json!({
            "modelName": "Dzire",
            "feature": "AC",
            "capacity": 4,
            "cabNumber": "KA01AB1234"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["isReady"], false);
    let cab_id = body["data"]["cabId"].as_str().unwrap().to_string();

    let (status, body) = send(
        app.clone(),
        Method::GET,
        "/api/driver/cabs",
        Some(&driver_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["cabId"], cab_id.as_str());

    let (status, body) = send(
        app.clone(),
        Method::PUT,
        &format!("/api/admin/drivers/{}/verify", driver.id.to_hex()),
        Some(&admin_token),
        Some(json!({ "flag": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["isVerifiedDriver"], true);

    let (status, _) = send(
        app.clone(),
        Method::POST,
        "/api/driver/cabs",
        Some(&driver_token),
        Some(json!({ "modelName": "", "capacity": 0, "cabNumber": "X" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        app,
        Method::DELETE,
        &format!("/api/driver/cabs/{}", cab_id),
        Some(&driver_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!h.user(&driver.id).await.have_cab);
}
