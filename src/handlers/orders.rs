use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};

use crate::{
    dtos::booking_dtos::{
        parse_object_id, ApiResponse, BookCabRequest, BookCabResponse, VerifyPaymentRequest,
    },
    errors::Result,
    models::{auth::AuthContext, order::OrderResponse},
    services::{orders, payments},
    state::AppState,
};

// Passenger books a cab
pub async fn book_cab(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<BookCabRequest>,
) -> Result<Json<ApiResponse<BookCabResponse>>> {
    let booking = payments::book_cab(&state, &ctx, payload).await?;
    Ok(Json(ApiResponse::ok("Booking created", booking)))
}

// Gateway checkout callback
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>> {
    let order = payments::verify_payment(&state, &ctx, payload).await?;
    Ok(Json(ApiResponse::ok("Payment verified", order.into())))
}

pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>> {
    let orders = orders::my_bookings(&state, &ctx).await?;
    Ok(Json(ApiResponse::ok(
        format!("{} bookings found", orders.len()),
        orders,
    )))
}

pub async fn pending_orders(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>> {
    let orders = orders::pending_orders(&state, &ctx).await?;
    Ok(Json(ApiResponse::ok("Pending orders", orders)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>> {
    let order_id = parse_object_id(&id, "orderId")?;
    let order = orders::order_detail(&state, &ctx, order_id).await?;
    Ok(Json(ApiResponse::ok("Order details", order)))
}
