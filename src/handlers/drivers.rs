use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use validator::Validate;

use crate::{
    dtos::booking_dtos::{
        parse_object_id, ApiResponse, OrderActionRequest, Page, PageQuery, RegisterCabRequest,
        UpcomingQuery, UpdateCabRequest,
    },
    errors::Result,
    models::{auth::AuthContext, cab::CabResponse, order::OrderResponse},
    services::{
        availability::{self, DriverUpcoming},
        booking, fleet, orders,
    },
    state::AppState,
};

const HISTORY_PAGE_SIZE: u32 = 5;

pub async fn upcoming_bookings(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<ApiResponse<DriverUpcoming>>> {
    let driver_id = query
        .driver_id
        .as_deref()
        .map(|raw| parse_object_id(raw, "driverId"))
        .transpose()?;
    let upcoming = availability::driver_upcoming(&state, &ctx, driver_id).await?;
    Ok(Json(ApiResponse::ok("Upcoming bookings", upcoming)))
}

pub async fn confirm_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<OrderActionRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>> {
    let order_id = parse_object_id(&payload.order_id, "orderId")?;
    let order = booking::confirm(&state, &ctx, order_id).await?;
    Ok(Json(ApiResponse::ok("Booking confirmed", order.into())))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<OrderActionRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>> {
    let order_id = parse_object_id(&payload.order_id, "orderId")?;
    let order = booking::cancel(&state, &ctx, order_id).await?;
    Ok(Json(ApiResponse::ok("Booking cancelled", order.into())))
}

pub async fn complete_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<OrderActionRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>> {
    let order_id = parse_object_id(&payload.order_id, "orderId")?;
    let order = booking::complete(&state, &ctx, order_id).await?;
    Ok(Json(ApiResponse::ok("Booking completed", order.into())))
}

pub async fn my_cabs(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Vec<CabResponse>>>> {
    let cabs = fleet::driver_cabs(&state, &ctx).await?;
    let cabs = cabs.into_iter().map(CabResponse::from).collect();
    Ok(Json(ApiResponse::ok("Your cabs", cabs)))
}

pub async fn register_cab(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<RegisterCabRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CabResponse>>)> {
    payload.validate()?;
    let cab = fleet::register_cab(&state, &ctx, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Cab registered", cab.into())),
    ))
}

pub async fn update_cab(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCabRequest>,
) -> Result<Json<ApiResponse<CabResponse>>> {
    payload.validate()?;
    let cab_id = parse_object_id(&id, "cabId")?;
    let cab = fleet::update_cab(&state, &ctx, cab_id, payload).await?;
    Ok(Json(ApiResponse::ok("Cab updated", cab.into())))
}

pub async fn delete_cab(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    let cab_id = parse_object_id(&id, "cabId")?;
    fleet::delete_cab(&state, &ctx, cab_id).await?;
    Ok(Json(ApiResponse::ok("Cab deleted", ())))
}

pub async fn booking_history(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<OrderResponse>>>> {
    query.validate()?;
    let history = orders::driver_all_bookings(&state, &ctx).await?;
    let page = Page::of(
        history,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(HISTORY_PAGE_SIZE),
    );
    Ok(Json(ApiResponse::ok("Completed bookings", page)))
}
