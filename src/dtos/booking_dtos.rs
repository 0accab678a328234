use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::cab::CabFeature;
use crate::models::order::{BookingType, OrderResponse, Passenger, PaymentMethod};

pub fn parse_object_id(raw: &str, field: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| AppError::invalid_data(format!("{} is not a valid id", field)))
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookCabRequest {
    pub booking_type: BookingType,
    pub departure_date: DateTime<Utc>,
    pub drop_off_date: Option<DateTime<Utc>>,

    #[validate(length(min = 1, message = "Pickup location is required"))]
    pub pickup_location: String,
    pub exact_location: Option<String>,

    #[validate(length(min = 1, message = "Destination is required"))]
    pub destination: String,

    #[validate(range(
        min = 1,
        max = 50,
        message = "Number of passengers must be between 1 and 50"
    ))]
    pub number_of_passengers: u32,
    #[serde(default)]
    pub passengers: Vec<Passenger>,

    #[validate(range(exclusive_min = 0.0, message = "Booking amount must be positive"))]
    pub booking_amount: f64,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookCabResponse {
    pub order: OrderResponse,
    pub amount_to_pay: f64,
    pub razorpay_order_id: String,
}

/// Checkout callback fields, named as the gateway sends them.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, message = "razorpay_order_id is required"))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1, message = "razorpay_payment_id is required"))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1, message = "razorpay_signature is required"))]
    pub razorpay_signature: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AvailableCabsRequest {
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: u32,
    pub date: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Slices `all` into the 1-based `page` of size `limit`.
    pub fn of(all: Vec<T>, page: u32, limit: u32) -> Self {
        let total = all.len();
        let size = limit.max(1) as usize;
        let skip = (page.max(1) as usize - 1) * size;
        Page {
            items: all.into_iter().skip(skip).take(size).collect(),
            page: page.max(1),
            limit: limit.max(1),
            total,
            total_pages: total.div_ceil(size),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub cab_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderActionRequest {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingQuery {
    pub driver_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetRateRequest {
    #[validate(range(exclusive_min = 0.0, message = "Rate must be a positive number"))]
    pub rate: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCabRequest {
    #[validate(length(min = 1, message = "Model name is required"))]
    pub model_name: String,
    pub feature: Option<CabFeature>,
    #[validate(range(min = 1, max = 50, message = "Capacity must be between 1 and 50"))]
    pub capacity: u32,
    #[validate(length(min = 1, message = "Cab number is required"))]
    pub cab_number: String,
    /// Honoured for admins only; drivers' cabs start unpriced.
    #[validate(range(exclusive_min = 0.0, message = "Rate must be a positive number"))]
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCabRequest {
    #[validate(length(min = 1, message = "Model name cannot be empty"))]
    pub model_name: Option<String>,
    pub feature: Option<CabFeature>,
    #[validate(range(min = 1, max = 50, message = "Capacity must be between 1 and 50"))]
    pub capacity: Option<u32>,
    #[validate(length(min = 1, message = "Cab number cannot be empty"))]
    pub cab_number: Option<String>,
    #[validate(range(exclusive_min = 0.0, message = "Rate must be a positive number"))]
    pub rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyDriverRequest {
    pub flag: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PageQuery {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlePayoutRequest {
    pub driver_id: String,
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            success: true,
            message: message.into(),
            data,
        }
    }
}
