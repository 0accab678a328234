//! Order lifecycle coordinator: assign, confirm, cancel and complete.
//!
//! Each transition loads the order and the cab whose ledger it touches,
//! validates the edge and the actor before mutating anything, and commits the
//! order, the cab and (on completion) the driver's wallet as one change set.
//! Write conflicts are retried; ledger overlaps are not.

use mongodb::bson::oid::ObjectId;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::{AppError, Result};
use crate::models::{
    auth::{AuthContext, Role},
    cab::Cab,
    order::{DriverShare, Order, OrderEvent, PaymentMethod},
    user::User,
};
use crate::services::{
    load_cab, load_order, load_user,
    notifier::{notify_best_effort, NotificationTemplate},
};
use crate::state::AppState;
use crate::store::{with_write_retry, ChangeSet};

fn trip_details(order: &Order, cab: Option<&Cab>) -> serde_json::Value {
    json!({
        "orderId": order.id.to_hex(),
        "pickup": order.display_location(),
        "destination": order.destination,
        "departure": order.departure_date.format("%Y-%m-%d %H:%M").to_string(),
        "cabNumber": cab.map(|c| c.cab_number.as_str()).unwrap_or("-"),
    })
}

/// Drivers may only act on orders assigned to them.
fn ensure_owner(ctx: &AuthContext, order: &Order) -> Result<()> {
    if ctx.role == Role::Driver && !order.is_driver(&ctx.user_id) {
        return Err(AppError::unauthorized("order is not assigned to you"));
    }
    Ok(())
}

#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn assign(
    state: &AppState,
    ctx: &AuthContext,
    order_id: ObjectId,
    cab_id: ObjectId,
) -> Result<Order> {
    ctx.require(&[Role::Admin])?;

    let (order, cab, driver) =
        with_write_retry("assign", || try_assign(state, order_id, cab_id)).await?;
    state.invalidate_order(&order.id);

    info!(
        order = %order.id,
        cab = %cab.id,
        driver = %driver.id,
        "✅ Order assigned"
    );
    notify_best_effort(
        state.notifier.as_ref(),
        &driver.phone_number,
        NotificationTemplate::DriverAssigned,
        &trip_details(&order, Some(&cab)),
    )
    .await;

    Ok(order)
}

async fn try_assign(
    state: &AppState,
    order_id: ObjectId,
    cab_id: ObjectId,
) -> Result<(Order, Cab, User)> {
    let store = state.store.as_ref();
    let mut order = load_order(store, &order_id).await?;
    let next = order.check(OrderEvent::Assign)?;

    let mut cab = load_cab(store, &cab_id).await?;
    if cab.capacity < order.number_of_passengers {
        return Err(AppError::invalid_data(format!(
            "cab seats {} but the order has {} passengers",
            cab.capacity, order.number_of_passengers
        )));
    }
    let driver = load_user(store, &cab.belongs_to, "Driver").await?;

    cab.sweep_expired(state.clock.now());
    cab.reserve(order.id, order.departure_date, order.drop_off_date)?;

    order.driver_share = Some(DriverShare::for_order(&order, &state.settings.hybrid));
    order.driver_id = Some(cab.belongs_to);
    order.booked_cab = Some(cab.id);
    order.booking_status = next;

    state
        .store
        .commit(ChangeSet::new().replace_order(&order).replace_cab(&cab))
        .await?;
    order.version += 1;
    cab.version += 1;

    Ok((order, cab, driver))
}

#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn confirm(state: &AppState, ctx: &AuthContext, order_id: ObjectId) -> Result<Order> {
    ctx.require(&[Role::Driver])?;

    let (order, cab) = with_write_retry("confirm", || try_confirm(state, ctx, order_id)).await?;
    state.invalidate_order(&order.id);
    info!(order = %order.id, "✅ Booking accepted by driver");

    match state.store.find_user(&order.user_id).await {
        Ok(Some(passenger)) => {
            notify_best_effort(
                state.notifier.as_ref(),
                &passenger.phone_number,
                NotificationTemplate::BookingAccepted,
                &trip_details(&order, Some(&cab)),
            )
            .await
        }
        Ok(None) => {
            tracing::warn!(order = %order.id, "⚠️ Passenger missing, notification skipped")
        }
        Err(e) => tracing::warn!(order = %order.id, "⚠️ Passenger lookup failed: {}", e),
    }

    Ok(order)
}

async fn try_confirm(
    state: &AppState,
    ctx: &AuthContext,
    order_id: ObjectId,
) -> Result<(Order, Cab)> {
    let store = state.store.as_ref();
    let mut order = load_order(store, &order_id).await?;
    let next = order.check(OrderEvent::Confirm)?;
    if !order.is_driver(&ctx.user_id) {
        return Err(AppError::unauthorized("order is not assigned to you"));
    }
    // a departed trip has left the cab's upcoming ledger
    if order.departure_date <= state.clock.now() {
        return Err(AppError::InvalidTransition(format!(
            "order {} departed before it was confirmed",
            order.id
        )));
    }

    let cab_id = order
        .booked_cab
        .ok_or_else(|| AppError::not_found("Cab"))?;
    let mut cab = load_cab(store, &cab_id).await?;
    cab.accept(&order.id)?;
    order.booking_status = next;

    store
        .commit(ChangeSet::new().replace_order(&order).replace_cab(&cab))
        .await?;
    order.version += 1;
    cab.version += 1;

    Ok((order, cab))
}

/// Unassigns an order: its ledger entry is dropped and it returns to Pending.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn cancel(state: &AppState, ctx: &AuthContext, order_id: ObjectId) -> Result<Order> {
    ctx.require(&[Role::Driver, Role::Admin])?;

    let order = with_write_retry("cancel", || try_cancel(state, ctx, order_id)).await?;
    state.invalidate_order(&order.id);
    info!(order = %order.id, "↩️ Order returned to the assignable pool");
    Ok(order)
}

async fn try_cancel(state: &AppState, ctx: &AuthContext, order_id: ObjectId) -> Result<Order> {
    let store = state.store.as_ref();
    let mut order = load_order(store, &order_id).await?;
    let next = order.check(OrderEvent::Cancel)?;
    ensure_owner(ctx, &order)?;

    let mut changes = ChangeSet::new();
    if let Some(cab_id) = order.booked_cab {
        match store.find_cab(&cab_id).await? {
            Some(mut cab) => {
                cab.sweep_expired(state.clock.now());
                cab.release(&order.id);
                changes = changes.replace_cab(&cab);
            }
            None => tracing::warn!(cab = %cab_id, "⚠️ Booked cab no longer exists"),
        }
    }

    order.booking_status = next;
    order.driver_id = None;
    order.driver_share = None;
    order.booked_cab = None;

    store.commit(changes.replace_order(&order)).await?;
    order.version += 1;
    Ok(order)
}

/// Closes a confirmed trip once its departure has passed and settles the
/// driver's side: Online trips accrue a pending wallet credit, Hybrid and
/// Cash trips are recorded as already collected by the driver.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn complete(state: &AppState, ctx: &AuthContext, order_id: ObjectId) -> Result<Order> {
    ctx.require(&[Role::Driver, Role::Admin])?;

    let order = with_write_retry("complete", || try_complete(state, ctx, order_id)).await?;
    state.invalidate_order(&order.id);
    info!(
        order = %order.id,
        method = ?order.payment_method,
        "🏁 Booking completed"
    );
    Ok(order)
}

async fn try_complete(state: &AppState, ctx: &AuthContext, order_id: ObjectId) -> Result<Order> {
    let store = state.store.as_ref();
    let now = state.clock.now();

    let mut order = load_order(store, &order_id).await?;
    let next = order.check(OrderEvent::Complete)?;
    ensure_owner(ctx, &order)?;
    if order.departure_date > now {
        return Err(AppError::BookingNotCompleted);
    }

    let driver_id = order
        .driver_id
        .ok_or_else(|| AppError::not_found("Driver"))?;
    let mut driver = load_user(store, &driver_id, "Driver").await?;
    let mut share = order
        .driver_share
        .clone()
        .unwrap_or_else(|| DriverShare::for_order(&order, &state.settings.hybrid));

    let mut changes = ChangeSet::new();
    if let Some(cab_id) = order.booked_cab {
        let mut cab = load_cab(store, &cab_id).await?;
        cab.sweep_expired(now);
        cab.archive(&order.id);
        changes = changes.replace_cab(&cab);
    }

    match order.payment_method {
        PaymentMethod::Online => {
            driver
                .wallet
                .record_pending_credit(share.driver_cut, order.id, now)?;
        }
        PaymentMethod::Hybrid | PaymentMethod::Cash => {
            driver
                .wallet
                .record_collected_credit(share.driver_cut, order.id, now)?;
            share.mark_paid(now);
        }
    }

    order.driver_share = Some(share);
    order.booking_status = next;

    store
        .commit(changes.replace_order(&order).replace_user(&driver))
        .await?;
    order.version += 1;
    Ok(order)
}
