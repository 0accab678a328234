use mongodb::bson::oid::ObjectId;
use tracing::instrument;

use crate::errors::{AppError, Result};
use crate::models::{
    auth::{AuthContext, Role},
    order::{BookingStatus, OrderResponse},
};
use crate::services::cache::{get_typed, order_key, put_typed, PENDING_ORDERS};
use crate::services::load_order;
use crate::state::AppState;
use crate::store::OrderQuery;

/// Passengers see their own orders, drivers the ones assigned to them.
fn may_view(ctx: &AuthContext, order: &OrderResponse) -> bool {
    let me = ctx.user_id.to_hex();
    match ctx.role {
        Role::Admin => true,
        Role::Passenger => order.user_id == me,
        Role::Driver => order.driver_id.as_deref() == Some(me.as_str()),
    }
}

#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn my_bookings(state: &AppState, ctx: &AuthContext) -> Result<Vec<OrderResponse>> {
    let orders = state
        .store
        .list_orders(OrderQuery::ByUser(ctx.user_id))
        .await?;
    Ok(orders.into_iter().map(OrderResponse::from).collect())
}

#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn order_detail(
    state: &AppState,
    ctx: &AuthContext,
    order_id: ObjectId,
) -> Result<OrderResponse> {
    let key = order_key(&order_id);
    let order = match get_typed::<OrderResponse>(state.cache.as_ref(), &key) {
        Some(hit) => hit,
        None => {
            let fresh = OrderResponse::from(load_order(state.store.as_ref(), &order_id).await?);
            put_typed(state.cache.as_ref(), &key, &fresh, state.settings.cache_ttl);
            fresh
        }
    };

    if !may_view(ctx, &order) {
        return Err(AppError::unauthorized("you may not view this order"));
    }
    Ok(order)
}

/// The assignable pool.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn pending_orders(state: &AppState, ctx: &AuthContext) -> Result<Vec<OrderResponse>> {
    ctx.require(&[Role::Driver, Role::Admin])?;

    if let Some(hit) = get_typed::<Vec<OrderResponse>>(state.cache.as_ref(), PENDING_ORDERS) {
        return Ok(hit);
    }

    let pending: Vec<OrderResponse> = state
        .store
        .list_orders(OrderQuery::ByStatus(BookingStatus::Pending))
        .await?
        .into_iter()
        .map(OrderResponse::from)
        .collect();
    put_typed(
        state.cache.as_ref(),
        PENDING_ORDERS,
        &pending,
        state.settings.cache_ttl,
    );
    Ok(pending)
}

/// Completed trips driven by the caller, newest first.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn driver_all_bookings(
    state: &AppState,
    ctx: &AuthContext,
) -> Result<Vec<OrderResponse>> {
    ctx.require(&[Role::Driver, Role::Admin])?;
    let orders = state
        .store
        .list_orders(OrderQuery::CompletedByDriver(ctx.user_id))
        .await?;
    Ok(orders.into_iter().map(OrderResponse::from).collect())
}

/// Orders waiting on their driver's confirmation, newest first.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn assigning_orders(state: &AppState, ctx: &AuthContext) -> Result<Vec<OrderResponse>> {
    ctx.require(&[Role::Admin])?;
    let orders = state
        .store
        .list_orders(OrderQuery::ByStatus(BookingStatus::Assigning))
        .await?;
    Ok(orders.into_iter().map(OrderResponse::from).collect())
}
