use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::errors::{AppError, Result};
use crate::models::{
    auth::{AuthContext, Role},
    cab::{BookingEntry, Cab},
};
use crate::services::load_cab;
use crate::state::AppState;
use crate::store::{with_write_retry, ChangeSet};

/// Cabs of `capacity` with no upcoming departure within 24h either side of
/// `date`, owned by a verified driver. Expired entries are swept in memory
/// only; nothing is written.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn query_available(
    state: &AppState,
    ctx: &AuthContext,
    capacity: u32,
    date: DateTime<Utc>,
) -> Result<Vec<Cab>> {
    ctx.require(&[Role::Admin])?;

    let now = state.clock.now();
    let cabs = state.store.cabs_by_capacity(capacity).await?;

    let owners: Vec<_> = cabs
        .iter()
        .map(|cab| cab.belongs_to)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let verified: HashSet<_> = state
        .store
        .users_by_ids(&owners)
        .await?
        .into_iter()
        .filter(|user| user.role == Role::Driver && user.is_verified_driver)
        .map(|user| user.id)
        .collect();

    let available: Vec<Cab> = cabs
        .into_iter()
        .filter(|cab| verified.contains(&cab.belongs_to))
        .filter_map(|mut cab| {
            cab.sweep_expired(now);
            cab.is_free_around(date).then_some(cab)
        })
        .collect();

    tracing::info!(
        capacity,
        %date,
        found = available.len(),
        "🔎 Availability query"
    );
    Ok(available)
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingBooking {
    pub cab_id: String,
    pub cab_number: String,
    #[serde(flatten)]
    pub entry: BookingEntry,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DriverUpcoming {
    pub accepted: Vec<UpcomingBooking>,
    pub unaccepted: Vec<UpcomingBooking>,
}

/// Upcoming ledger entries across a driver's cabs, split by acceptance.
/// Drivers see their own cabs; admins name the driver.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn driver_upcoming(
    state: &AppState,
    ctx: &AuthContext,
    driver_id: Option<mongodb::bson::oid::ObjectId>,
) -> Result<DriverUpcoming> {
    ctx.require(&[Role::Driver, Role::Admin])?;
    let driver_id = match (ctx.role, driver_id) {
        (Role::Admin, Some(id)) => id,
        _ => ctx.user_id,
    };

    let now = state.clock.now();
    let mut upcoming = DriverUpcoming::default();
    for mut cab in state.store.cabs_by_owner(&driver_id).await? {
        cab.sweep_expired(now);
        let cab_id = cab.id.to_hex();
        for entry in cab.upcoming_bookings {
            let item = UpcomingBooking {
                cab_id: cab_id.clone(),
                cab_number: cab.cab_number.clone(),
                entry,
            };
            if item.entry.accepted {
                upcoming.accepted.push(item);
            } else {
                upcoming.unaccepted.push(item);
            }
        }
    }

    let by_departure = |a: &UpcomingBooking, b: &UpcomingBooking| {
        a.entry.departure_date.cmp(&b.entry.departure_date)
    };
    upcoming.accepted.sort_by(by_departure);
    upcoming.unaccepted.sort_by(by_departure);
    Ok(upcoming)
}

/// Prices a cab. A rate of exactly 1 marks it as not yet priced.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn set_cab_rate(
    state: &AppState,
    ctx: &AuthContext,
    cab_id: mongodb::bson::oid::ObjectId,
    rate: f64,
) -> Result<Cab> {
    ctx.require(&[Role::Admin])?;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(AppError::invalid_data("Rate must be a positive number"));
    }

    let cab = with_write_retry("set-rate", || async move {
        let mut cab = load_cab(state.store.as_ref(), &cab_id).await?;
        cab.set_rate(rate);
        state.store.commit(ChangeSet::new().replace_cab(&cab)).await?;
        cab.version += 1;
        Ok::<_, AppError>(cab)
    })
    .await?;

    tracing::info!(cab = %cab.id, rate, ready = cab.is_ready, "💲 Cab rate updated");
    Ok(cab)
}
