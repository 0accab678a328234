use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use validator::Validate;

use crate::{
    dtos::booking_dtos::{
        parse_object_id, ApiResponse, AssignRequest, AvailableCabsRequest, Page, PageQuery,
        SetRateRequest, SettlePayoutRequest, VerifyDriverRequest,
    },
    errors::Result,
    models::{
        auth::AuthContext,
        cab::CabResponse,
        order::OrderResponse,
        user::{DriverPayoutResponse, DriverProfileResponse},
    },
    services::{
        availability, booking, fleet, orders,
        payouts::{self, PayoutReceipt},
    },
    state::AppState,
};

const DEFAULT_PAGE_SIZE: u32 = 10;
const ASSIGNING_PAGE_SIZE: u32 = 5;

pub async fn available_cabs(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<AvailableCabsRequest>,
) -> Result<Json<ApiResponse<Page<CabResponse>>>> {
    payload.validate()?;
    let cabs =
        availability::query_available(&state, &ctx, payload.capacity, payload.date).await?;
    let page = Page::of(
        cabs.into_iter().map(CabResponse::from).collect(),
        payload.page.unwrap_or(1),
        payload.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    );
    Ok(Json(ApiResponse::ok("Available cabs", page)))
}

pub async fn assign_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>> {
    let order_id = parse_object_id(&id, "orderId")?;
    let cab_id = parse_object_id(&payload.cab_id, "cabId")?;
    let order = booking::assign(&state, &ctx, order_id, cab_id).await?;
    Ok(Json(ApiResponse::ok("Driver assigned", order.into())))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>> {
    let order_id = parse_object_id(&id, "orderId")?;
    let order = booking::cancel(&state, &ctx, order_id).await?;
    Ok(Json(ApiResponse::ok("Assignment cancelled", order.into())))
}

pub async fn complete_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>> {
    let order_id = parse_object_id(&id, "orderId")?;
    let order = booking::complete(&state, &ctx, order_id).await?;
    Ok(Json(ApiResponse::ok("Booking completed", order.into())))
}

pub async fn set_cab_rate(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(payload): Json<SetRateRequest>,
) -> Result<Json<ApiResponse<CabResponse>>> {
    payload.validate()?;
    let cab_id = parse_object_id(&id, "cabId")?;
    let cab = availability::set_cab_rate(&state, &ctx, cab_id, payload.rate).await?;
    Ok(Json(ApiResponse::ok("Rate updated", cab.into())))
}

pub async fn pending_payouts(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Vec<DriverPayoutResponse>>>> {
    let drivers = payouts::pending_payouts(&state, &ctx).await?;
    Ok(Json(ApiResponse::ok("Pending payouts", drivers)))
}

pub async fn settle_payout(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<SettlePayoutRequest>,
) -> Result<Json<ApiResponse<PayoutReceipt>>> {
    let driver_id = parse_object_id(&payload.driver_id, "driverId")?;
    let order_id = parse_object_id(&payload.order_id, "orderId")?;
    let receipt = payouts::settle_payout(&state, &ctx, driver_id, order_id).await?;
    Ok(Json(ApiResponse::ok("Payout settled", receipt)))
}

pub async fn assigning_orders(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<OrderResponse>>>> {
    query.validate()?;
    let assigning = orders::assigning_orders(&state, &ctx).await?;
    let page = Page::of(
        assigning,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(ASSIGNING_PAGE_SIZE),
    );
    Ok(Json(ApiResponse::ok("Orders awaiting confirmation", page)))
}

pub async fn verify_driver(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(payload): Json<VerifyDriverRequest>,
) -> Result<Json<ApiResponse<DriverProfileResponse>>> {
    let driver_id = parse_object_id(&id, "driverId")?;
    let driver = fleet::verify_driver(&state, &ctx, driver_id, payload.flag).await?;
    let message = if payload.flag {
        "Driver verified"
    } else {
        "Driver verification revoked"
    };
    Ok(Json(ApiResponse::ok(message, driver.into())))
}
