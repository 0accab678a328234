pub mod availability;
pub mod booking;
pub mod cache;
pub mod fleet;
pub mod notifier;
pub mod orders;
pub mod payment_gateway;
pub mod payments;
pub mod payout_provider;
pub mod payouts;
pub mod razorpay;

use mongodb::bson::oid::ObjectId;

use crate::errors::{AppError, Result};
use crate::models::{cab::Cab, order::Order, user::User};
use crate::store::Store;

pub(crate) async fn load_order(store: &dyn Store, id: &ObjectId) -> Result<Order> {
    store
        .find_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

pub(crate) async fn load_cab(store: &dyn Store, id: &ObjectId) -> Result<Cab> {
    store
        .find_cab(id)
        .await?
        .ok_or_else(|| AppError::not_found("Cab"))
}

pub(crate) async fn load_user(store: &dyn Store, id: &ObjectId, what: &str) -> Result<User> {
    store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::not_found(what))
}
