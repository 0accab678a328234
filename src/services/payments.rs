//! Booking creation and gateway payment reconciliation.

use chrono::Duration;
use mongodb::bson::{self, oid::ObjectId};
use rand::Rng;
use serde_json::json;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::dtos::booking_dtos::{BookCabRequest, BookCabResponse, VerifyPaymentRequest};
use crate::errors::{AppError, Result};
use crate::models::{
    auth::{AuthContext, Role},
    order::{BookingStatus, BookingType, Order, PaymentMethod, PaymentStatus},
    payment::PaymentRecord,
};
use crate::services::{
    cache::PENDING_ORDERS,
    load_order,
    notifier::{notify_best_effort, NotificationTemplate},
};
use crate::state::AppState;
use crate::store::{with_write_retry, ChangeSet, StoreError};

fn cash_marker() -> String {
    format!("Cash_{:09}", rand::thread_rng().gen_range(0..1_000_000_000u32))
}

/// Creates a Pending order. Online and Hybrid bookings open a gateway order
/// for the amount due now and expire unless paid in time.
#[instrument(skip(state, ctx, req), fields(actor = %ctx.user_id))]
pub async fn book_cab(
    state: &AppState,
    ctx: &AuthContext,
    req: BookCabRequest,
) -> Result<BookCabResponse> {
    ctx.require(&[Role::Passenger])?;
    req.validate()?;

    let now = state.clock.now();
    if req.departure_date <= now {
        return Err(AppError::invalid_data("Departure date must be in the future"));
    }
    match (req.booking_type, req.drop_off_date) {
        (BookingType::RoundTrip, None) => {
            return Err(AppError::invalid_data("Round trips need a drop-off date"))
        }
        (_, Some(drop)) if drop < req.departure_date => {
            return Err(AppError::invalid_data("Drop-off cannot precede departure"))
        }
        _ => {}
    }
    if !req.passengers.is_empty() && req.passengers.len() != req.number_of_passengers as usize {
        return Err(AppError::invalid_data(
            "Passenger list does not match the number of passengers",
        ));
    }

    let settings = &state.settings;
    let amount_to_pay = match req.payment_method {
        PaymentMethod::Hybrid => settings.hybrid.online_deposit(req.booking_amount),
        PaymentMethod::Online => req.booking_amount,
        PaymentMethod::Cash => 0.0,
    };

    let (razorpay_order_id, order_expire) = match req.payment_method {
        PaymentMethod::Cash => (cash_marker(), None),
        PaymentMethod::Online | PaymentMethod::Hybrid => {
            let receipt = format!("order_{}", now.timestamp_millis());
            let amount_minor = (amount_to_pay * 100.0).round() as u64;
            let gateway_id = state
                .gateway
                .create_order(amount_minor, &settings.currency, &receipt)
                .await?;
            let expires = now + Duration::minutes(settings.order_expire_minutes);
            (gateway_id, Some(bson::DateTime::from_chrono(expires)))
        }
    };

    let order = Order {
        id: ObjectId::new(),
        user_id: ctx.user_id,
        booked_cab: None,
        driver_id: None,
        booking_type: req.booking_type,
        departure_date: req.departure_date,
        drop_off_date: req.drop_off_date,
        pickup_location: req.pickup_location,
        exact_location: req.exact_location,
        destination: req.destination,
        number_of_passengers: req.number_of_passengers,
        passengers: req.passengers,
        booking_amount: req.booking_amount,
        paid_amount: 0.0,
        payment_method: req.payment_method,
        payment_status: PaymentStatus::UnPaid,
        booking_status: BookingStatus::Pending,
        driver_share: None,
        razorpay_order_id: razorpay_order_id.clone(),
        order_expire,
        created_at: now,
        version: 0,
    };

    state
        .store
        .commit(ChangeSet::new().insert_order(&order))
        .await?;
    state.cache.invalidate(&[PENDING_ORDERS.to_string()]);
    info!(order = %order.id, method = ?order.payment_method, "🚕 Cab booked");

    Ok(BookCabResponse {
        order: order.into(),
        amount_to_pay,
        razorpay_order_id,
    })
}

/// Reconciles a gateway payment with its order. Replaying a known payment id
/// returns the order unchanged.
#[instrument(
    skip(state, ctx, req),
    fields(actor = %ctx.user_id, payment = %req.razorpay_payment_id)
)]
pub async fn verify_payment(
    state: &AppState,
    ctx: &AuthContext,
    req: VerifyPaymentRequest,
) -> Result<Order> {
    req.validate()?;
    let store = state.store.as_ref();

    let order = store
        .find_order_by_gateway_ref(&req.razorpay_order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    if ctx.role == Role::Passenger && order.user_id != ctx.user_id {
        return Err(AppError::unauthorized("order belongs to another passenger"));
    }

    if let Some(existing) = store.find_payment(&req.razorpay_payment_id).await? {
        info!("Payment already recorded, returning current order");
        return load_order(store, &existing.order).await;
    }

    if order.payment_method == PaymentMethod::Cash {
        return Err(AppError::invalid_data("Cash orders are not paid online"));
    }
    if !state.gateway.verify_signature(
        &order.razorpay_order_id,
        &req.razorpay_payment_id,
        &req.razorpay_signature,
    ) {
        warn!(order = %order.id, "❌ Payment signature mismatch");
        return Err(AppError::PaymentVerification(order.id.to_hex()));
    }

    let outcome =
        with_write_retry("verify-payment", || try_record_payment(state, order.id, &req)).await;
    let order = match outcome {
        Ok(order) => order,
        // a concurrent call recorded the same payment first
        Err(AppError::Store(StoreError::DuplicateKey(_))) => load_order(store, &order.id).await?,
        Err(e) => return Err(e),
    };
    state.invalidate_order(&order.id);
    info!(
        order = %order.id,
        status = ?order.payment_status,
        paid = order.paid_amount,
        "💰 Payment verified"
    );

    match store.find_user(&order.user_id).await {
        Ok(Some(passenger)) => {
            let data = json!({
                "orderId": order.id.to_hex(),
                "amount": format!("{:.2} {}", order.paid_amount, state.settings.currency),
                "paymentStatus": format!("{:?}", order.payment_status),
            });
            notify_best_effort(
                state.notifier.as_ref(),
                &passenger.phone_number,
                NotificationTemplate::PaymentReceived,
                &data,
            )
            .await;
        }
        Ok(None) => warn!(order = %order.id, "⚠️ Passenger missing, notification skipped"),
        Err(e) => warn!(order = %order.id, "⚠️ Passenger lookup failed: {}", e),
    }

    Ok(order)
}

async fn try_record_payment(
    state: &AppState,
    order_id: ObjectId,
    req: &VerifyPaymentRequest,
) -> Result<Order> {
    let store = state.store.as_ref();
    if let Some(existing) = store.find_payment(&req.razorpay_payment_id).await? {
        return load_order(store, &existing.order).await;
    }

    let mut order = load_order(store, &order_id).await?;
    let now = state.clock.now();
    match order.payment_method {
        PaymentMethod::Hybrid => {
            order.paid_amount = state.settings.hybrid.online_deposit(order.booking_amount);
            order.payment_status = PaymentStatus::PartiallyPaid;
        }
        PaymentMethod::Online => {
            order.paid_amount = order.booking_amount;
            order.payment_status = PaymentStatus::Paid;
        }
        PaymentMethod::Cash => {
            return Err(AppError::invalid_data("Cash orders are not paid online"));
        }
    }
    order.order_expire = None;

    let payment = PaymentRecord {
        id: ObjectId::new(),
        order: order.id,
        razorpay_order_id: req.razorpay_order_id.clone(),
        razorpay_payment_id: req.razorpay_payment_id.clone(),
        razorpay_signature: req.razorpay_signature.clone(),
        created_at: now,
    };

    store
        .commit(ChangeSet::new().insert_payment(&payment).replace_order(&order))
        .await?;
    order.version += 1;
    Ok(order)
}
