mod common;

use std::sync::atomic::Ordering;

use cab_booking_api::{
    dtos::booking_dtos::{BookCabRequest, VerifyPaymentRequest},
    errors::AppError,
    models::order::{BookingStatus, BookingType, PaymentMethod, PaymentStatus},
    services::{notifier::NotificationTemplate, orders, payments},
    store::Store,
};
use chrono::{DateTime, Utc};
use common::{at, Harness, StubGateway};

fn request(method: PaymentMethod, amount: f64, departure: DateTime<Utc>) -> BookCabRequest {
    BookCabRequest {
        booking_type: BookingType::OneWay,
        departure_date: departure,
        drop_off_date: None,
        pickup_location: "Koregaon Park".to_string(),
        exact_location: Some("Lane 7".to_string()),
        destination: "Lonavala".to_string(),
        number_of_passengers: 2,
        passengers: vec![],
        booking_amount: amount,
        payment_method: method,
    }
}

fn signed(gateway_order_id: &str, payment_id: &str) -> VerifyPaymentRequest {
    VerifyPaymentRequest {
        razorpay_order_id: gateway_order_id.to_string(),
        razorpay_payment_id: payment_id.to_string(),
        razorpay_signature: StubGateway::sign(gateway_order_id, payment_id),
    }
}

#[tokio::test]
async fn hybrid_booking_charges_the_deposit_now() {
    let h = Harness::new();
    let passenger = h.seed_passenger().await;

    let booked = payments::book_cab(
        &h.state,
        &h.as_passenger(&passenger),
        request(PaymentMethod::Hybrid, 1000.0, at(10, 8)),
    )
    .await
    .unwrap();

    assert_eq!(booked.amount_to_pay, 100.0);
    // gateway amounts are in paise
    assert!(booked.razorpay_order_id.ends_with("_10000"));
    assert_eq!(booked.order.booking_status, BookingStatus::Pending);
    assert_eq!(booked.order.payment_status, PaymentStatus::UnPaid);
    assert_eq!(
        booked.order.order_expire,
        Some(at(1, 0) + chrono::Duration::minutes(5))
    );
    assert_eq!(h.gateway.orders_created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cash_booking_skips_the_gateway() {
    let h = Harness::new();
    let passenger = h.seed_passenger().await;

    let booked = payments::book_cab(
        &h.state,
        &h.as_passenger(&passenger),
        request(PaymentMethod::Cash, 800.0, at(10, 8)),
    )
    .await
    .unwrap();

    assert_eq!(booked.amount_to_pay, 0.0);
    assert!(booked.razorpay_order_id.starts_with("Cash_"));
    assert_eq!(booked.razorpay_order_id.len(), "Cash_".len() + 9);
    assert_eq!(booked.order.order_expire, None);
    assert_eq!(h.gateway.orders_created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn booking_input_is_checked_before_anything_is_written() {
    let h = Harness::new();
    let passenger = h.seed_passenger().await;
    let ctx = h.as_passenger(&passenger);

    let past = request(PaymentMethod::Online, 500.0, at(1, 0));
    assert!(matches!(
        payments::book_cab(&h.state, &ctx, past).await,
        Err(AppError::ValidationError(_))
    ));

    let mut round_trip = request(PaymentMethod::Online, 500.0, at(10, 8));
    round_trip.booking_type = BookingType::RoundTrip;
    assert!(matches!(
        payments::book_cab(&h.state, &ctx, round_trip.clone()).await,
        Err(AppError::ValidationError(_))
    ));
    round_trip.drop_off_date = Some(at(9, 8));
    assert!(matches!(
        payments::book_cab(&h.state, &ctx, round_trip).await,
        Err(AppError::ValidationError(_))
    ));

    let mut blank = request(PaymentMethod::Online, 500.0, at(10, 8));
    blank.destination = String::new();
    assert!(matches!(
        payments::book_cab(&h.state, &ctx, blank).await,
        Err(AppError::ValidationError(_))
    ));

    let free = request(PaymentMethod::Online, 0.0, at(10, 8));
    assert!(matches!(
        payments::book_cab(&h.state, &ctx, free).await,
        Err(AppError::ValidationError(_))
    ));

    assert!(matches!(
        payments::book_cab(
            &h.state,
            &h.admin(),
            request(PaymentMethod::Cash, 100.0, at(10, 8))
        )
        .await,
        Err(AppError::Unauthorized(_))
    ));

    assert_eq!(h.gateway.orders_created.load(Ordering::SeqCst), 0);
    assert!(orders::my_bookings(&h.state, &ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn gateway_failure_creates_no_order() {
    let h = Harness::new();
    h.gateway.fail.store(true, Ordering::SeqCst);
    let passenger = h.seed_passenger().await;
    let ctx = h.as_passenger(&passenger);

    let err = payments::book_cab(&h.state, &ctx, request(PaymentMethod::Online, 500.0, at(10, 8)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExternalApi(_)));
    assert!(orders::my_bookings(&h.state, &ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn verified_online_payment_marks_order_paid() {
    let h = Harness::new();
    let passenger = h.seed_passenger().await;
    let ctx = h.as_passenger(&passenger);
    let req = request(PaymentMethod::Online, 640.0, at(10, 8));
    let booked = payments::book_cab(&h.state, &ctx, req).await.unwrap();

    let callback = signed(&booked.razorpay_order_id, "pay_001");
    let order = payments::verify_payment(&h.state, &ctx, callback)
        .await
        .unwrap();

    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.paid_amount, 640.0);
    assert_eq!(order.order_expire, None);
    assert_eq!(order.booking_status, BookingStatus::Pending);
    assert_eq!(h.notifier.templates(), vec![NotificationTemplate::PaymentReceived]);
}

#[tokio::test]
async fn verified_hybrid_payment_is_partial() {
    let h = Harness::new();
    let passenger = h.seed_passenger().await;
    let ctx = h.as_passenger(&passenger);
    let req = request(PaymentMethod::Hybrid, 1000.0, at(10, 8));
    let booked = payments::book_cab(&h.state, &ctx, req).await.unwrap();

    let callback = signed(&booked.razorpay_order_id, "pay_hyb");
    let order = payments::verify_payment(&h.state, &ctx, callback)
        .await
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::PartiallyPaid);
    assert_eq!(order.paid_amount, 100.0);
}

#[tokio::test]
async fn replaying_a_payment_returns_the_order_unchanged() {
    let h = Harness::new();
    let passenger = h.seed_passenger().await;
    let ctx = h.as_passenger(&passenger);
    let order = h
        .seed_order(&passenger, PaymentMethod::Online, 900.0, at(10, 8))
        .await;

    let callback = signed(&order.razorpay_order_id, "pay_dup");
    let first = payments::verify_payment(&h.state, &ctx, callback.clone())
        .await
        .unwrap();
    let second = payments::verify_payment(&h.state, &ctx, callback)
        .await
        .unwrap();

    assert_eq!(first.version, second.version);
    assert_eq!(second.payment_status, PaymentStatus::Paid);
    assert_eq!(h.order(&order.id).await.version, first.version);
    assert_eq!(h.notifier.templates().len(), 1);
}

#[tokio::test]
async fn tampered_signature_is_rejected_without_touching_the_order() {
    let h = Harness::new();
    let passenger = h.seed_passenger().await;
    let ctx = h.as_passenger(&passenger);
    let order = h
        .seed_order(&passenger, PaymentMethod::Online, 900.0, at(10, 8))
        .await;

    let mut forged = signed(&order.razorpay_order_id, "pay_forged");
    forged.razorpay_signature = StubGateway::sign(&order.razorpay_order_id, "pay_other");

    let err = payments::verify_payment(&h.state, &ctx, forged).await.unwrap_err();
    match err {
        AppError::PaymentVerification(id) => assert_eq!(id, order.id.to_hex()),
        other => panic!("unexpected error: {:?}", other),
    }

    let stored = h.order(&order.id).await;
    assert_eq!(stored.payment_status, PaymentStatus::UnPaid);
    assert_eq!(stored.paid_amount, 0.0);
    assert_eq!(stored.version, order.version);
    assert!(h.store.find_payment("pay_forged").await.unwrap().is_none());
}

#[tokio::test]
async fn cash_orders_and_unknown_references_cannot_be_verified() {
    let h = Harness::new();
    let passenger = h.seed_passenger().await;
    let ctx = h.as_passenger(&passenger);
    let cash = h
        .seed_order(&passenger, PaymentMethod::Cash, 300.0, at(10, 8))
        .await;

    assert!(matches!(
        payments::verify_payment(&h.state, &ctx, signed(&cash.razorpay_order_id, "pay_cash")).await,
        Err(AppError::ValidationError(_))
    ));
    assert!(matches!(
        payments::verify_payment(&h.state, &ctx, signed("order_missing", "pay_x")).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn passengers_cannot_pay_for_someone_else() {
    let h = Harness::new();
    let owner = h.seed_passenger().await;
    let other = h.seed_passenger().await;
    let order = h
        .seed_order(&owner, PaymentMethod::Online, 900.0, at(10, 8))
        .await;

    let err = payments::verify_payment(
        &h.state,
        &h.as_passenger(&other),
        signed(&order.razorpay_order_id, "pay_theirs"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
    assert_eq!(h.order(&order.id).await.payment_status, PaymentStatus::UnPaid);
}
