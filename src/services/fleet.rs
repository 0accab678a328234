use mongodb::bson::oid::ObjectId;
use serde_json::json;
use tracing::{info, instrument};

use crate::dtos::booking_dtos::{RegisterCabRequest, UpdateCabRequest};
use crate::errors::{AppError, Result};
use crate::models::{
    auth::{AuthContext, Role},
    cab::{Availability, Cab},
    order::BookingStatus,
    user::User,
};
use crate::services::notifier::{notify_best_effort, NotificationTemplate};
use crate::services::{load_cab, load_user};
use crate::state::AppState;
use crate::store::{with_write_retry, ChangeSet, OrderQuery};

/// Rate a cab carries until an admin prices it.
pub const UNPRICED_RATE: f64 = 1.0;

fn ensure_cab_owner(ctx: &AuthContext, cab: &Cab) -> Result<()> {
    if ctx.is_admin() || cab.belongs_to == ctx.user_id {
        Ok(())
    } else {
        Err(AppError::unauthorized("this cab belongs to another driver"))
    }
}

/// Adds a cab to the caller's fleet and marks the owner as having one.
#[instrument(skip(state, ctx, request), fields(actor = %ctx.user_id))]
pub async fn register_cab(
    state: &AppState,
    ctx: &AuthContext,
    request: RegisterCabRequest,
) -> Result<Cab> {
    ctx.require(&[Role::Driver, Role::Admin])?;
    let rate = match request.rate {
        Some(rate) if ctx.is_admin() => rate,
        _ => UNPRICED_RATE,
    };

    let (owner, cab) = with_write_retry("register-cab", || {
        let request = request.clone();
        async move {
            let store = state.store.as_ref();
            let mut owner = load_user(store, &ctx.user_id, "User").await?;
            let mut cab = Cab {
                id: ObjectId::new(),
                model_name: request.model_name.trim().to_string(),
                capacity: request.capacity,
                feature: request.feature,
                cab_number: request.cab_number.trim().to_uppercase(),
                rate,
                is_ready: false,
                availability: Availability::Available,
                belongs_to: owner.id,
                upcoming_bookings: Vec::new(),
                past_bookings: Vec::new(),
                created_at: state.clock.now(),
                version: 0,
            };
            cab.set_rate(rate);

            let mut changes = ChangeSet::new().insert_cab(&cab);
            if !owner.have_cab {
                owner.have_cab = true;
                changes = changes.replace_user(&owner);
            }
            store.commit(changes).await?;
            Ok::<_, AppError>((owner, cab))
        }
    })
    .await?;

    info!(cab = %cab.id, owner = %owner.id, ready = cab.is_ready, "🚗 Cab registered");
    notify_best_effort(
        state.notifier.as_ref(),
        &owner.phone_number,
        NotificationTemplate::CabRegistered,
        &json!({ "cabNumber": cab.cab_number, "modelName": cab.model_name }),
    )
    .await;
    Ok(cab)
}

/// Edits a cab's details. Owners and admins may edit; only admins can
/// change the rate, which drivers' requests leave untouched.
#[instrument(skip(state, ctx, request), fields(actor = %ctx.user_id))]
pub async fn update_cab(
    state: &AppState,
    ctx: &AuthContext,
    cab_id: ObjectId,
    request: UpdateCabRequest,
) -> Result<Cab> {
    ctx.require(&[Role::Driver, Role::Admin])?;
    if request.rate.is_some() && !ctx.is_admin() {
        tracing::debug!(cab = %cab_id, "Ignoring rate change from a non-admin");
    }

    let cab = with_write_retry("update-cab", || {
        let request = request.clone();
        async move {
            let store = state.store.as_ref();
            let mut cab = load_cab(store, &cab_id).await?;
            ensure_cab_owner(ctx, &cab)?;

            if let Some(model_name) = request.model_name {
                cab.model_name = model_name.trim().to_string();
            }
            if let Some(feature) = request.feature {
                cab.feature = Some(feature);
            }
            if let Some(capacity) = request.capacity {
                cab.capacity = capacity;
            }
            if let Some(cab_number) = request.cab_number {
                cab.cab_number = cab_number.trim().to_uppercase();
            }
            if let (Some(rate), true) = (request.rate, ctx.is_admin()) {
                cab.set_rate(rate);
            }

            store.commit(ChangeSet::new().replace_cab(&cab)).await?;
            cab.version += 1;
            Ok::<_, AppError>(cab)
        }
    })
    .await?;

    info!(cab = %cab.id, "✏️ Cab updated");
    Ok(cab)
}

/// Removes a cab. A cab with reservations still ahead of it cannot go; the
/// owner loses the `have_cab` flag with their last cab.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn delete_cab(state: &AppState, ctx: &AuthContext, cab_id: ObjectId) -> Result<()> {
    ctx.require(&[Role::Driver, Role::Admin])?;

    with_write_retry("delete-cab", || async move {
        let store = state.store.as_ref();
        let cab = load_cab(store, &cab_id).await?;
        ensure_cab_owner(ctx, &cab)?;

        if let Some(entry) = cab.next_booking() {
            return Err(AppError::conflict(format!(
                "cab still has an upcoming booking for order {}",
                entry.order_id
            )));
        }
        // departed trips leave the ledger before they are completed
        for status in [BookingStatus::Assigning, BookingStatus::Confirmed] {
            let open = store
                .list_orders(OrderQuery::ByStatus(status))
                .await?
                .into_iter()
                .find(|order| order.booked_cab == Some(cab.id));
            if let Some(order) = open {
                return Err(AppError::conflict(format!(
                    "order {} on this cab is still {}",
                    order.id,
                    status.as_str()
                )));
            }
        }

        let mut changes = ChangeSet::new().delete_cab(&cab);
        let remaining = store
            .cabs_by_owner(&cab.belongs_to)
            .await?
            .into_iter()
            .filter(|other| other.id != cab.id)
            .count();
        if remaining == 0 {
            if let Some(mut owner) = store.find_user(&cab.belongs_to).await? {
                if owner.have_cab {
                    owner.have_cab = false;
                    changes = changes.replace_user(&owner);
                }
            }
        }
        store.commit(changes).await?;
        Ok::<_, AppError>(())
    })
    .await?;

    info!(cab = %cab_id, "🗑️ Cab deleted");
    Ok(())
}

/// The caller's own cabs, oldest first.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn driver_cabs(state: &AppState, ctx: &AuthContext) -> Result<Vec<Cab>> {
    ctx.require(&[Role::Driver, Role::Admin])?;
    let now = state.clock.now();
    let mut cabs = state.store.cabs_by_owner(&ctx.user_id).await?;
    for cab in cabs.iter_mut() {
        cab.sweep_expired(now);
    }
    Ok(cabs)
}

/// Sets or clears a driver's verified flag. Only drivers who own a cab can
/// be verified; unverified drivers' cabs never show up as available.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn verify_driver(
    state: &AppState,
    ctx: &AuthContext,
    driver_id: ObjectId,
    verified: bool,
) -> Result<User> {
    ctx.require(&[Role::Admin])?;

    let driver = with_write_retry("verify-driver", || async move {
        let store = state.store.as_ref();
        let mut driver = load_user(store, &driver_id, "Driver").await?;
        if driver.role != Role::Driver {
            return Err(AppError::not_found("Driver"));
        }
        if verified && !driver.have_cab {
            return Err(AppError::invalid_data(
                "driver must register a cab before verification",
            ));
        }
        if driver.is_verified_driver == verified {
            return Ok(driver);
        }

        driver.is_verified_driver = verified;
        store.commit(ChangeSet::new().replace_user(&driver)).await?;
        driver.version += 1;
        Ok::<_, AppError>(driver)
    })
    .await?;

    info!(driver = %driver.id, verified, "🪪 Driver verification updated");
    Ok(driver)
}
