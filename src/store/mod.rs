//! Persistence boundary for orders, cabs, users and payment records.
//!
//! Every document carries a `version`. Writes are staged in a [`ChangeSet`]
//! and applied by [`Store::commit`] as one unit: each replacement must match
//! the stored version (it is written back as `version + 1`), and a mismatch
//! fails the whole set with [`StoreError::WriteConflict`].

pub mod memory;
pub mod mongo;
pub mod retry;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use thiserror::Error;

use crate::models::{
    cab::Cab,
    order::{BookingStatus, Order},
    payment::PaymentRecord,
    user::User,
};

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use retry::with_write_retry;

pub const ORDERS: &str = "orders";
pub const CABS: &str = "cabs";
pub const USERS: &str = "users";
pub const PAYMENTS: &str = "payments";

#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency failure: someone else wrote the document first.
    #[error("write conflict on {0}")]
    WriteConflict(String),

    #[error("duplicate key in {0}")]
    DuplicateKey(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone)]
pub enum Change {
    InsertOrder(Order),
    ReplaceOrder(Order),
    InsertCab(Cab),
    ReplaceCab(Cab),
    /// Removes the cab, provided it is still at the carried version.
    DeleteCab(Cab),
    InsertUser(User),
    ReplaceUser(User),
    InsertPayment(PaymentRecord),
}

impl Change {
    pub fn collection(&self) -> &'static str {
        match self {
            Change::InsertOrder(_) | Change::ReplaceOrder(_) => ORDERS,
            Change::InsertCab(_) | Change::ReplaceCab(_) | Change::DeleteCab(_) => CABS,
            Change::InsertUser(_) | Change::ReplaceUser(_) => USERS,
            Change::InsertPayment(_) => PAYMENTS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_order(mut self, order: &Order) -> Self {
        self.changes.push(Change::InsertOrder(order.clone()));
        self
    }

    pub fn replace_order(mut self, order: &Order) -> Self {
        self.changes.push(Change::ReplaceOrder(order.clone()));
        self
    }

    pub fn insert_cab(mut self, cab: &Cab) -> Self {
        self.changes.push(Change::InsertCab(cab.clone()));
        self
    }

    pub fn replace_cab(mut self, cab: &Cab) -> Self {
        self.changes.push(Change::ReplaceCab(cab.clone()));
        self
    }

    pub fn delete_cab(mut self, cab: &Cab) -> Self {
        self.changes.push(Change::DeleteCab(cab.clone()));
        self
    }

    pub fn insert_user(mut self, user: &User) -> Self {
        self.changes.push(Change::InsertUser(user.clone()));
        self
    }

    pub fn replace_user(mut self, user: &User) -> Self {
        self.changes.push(Change::ReplaceUser(user.clone()));
        self
    }

    pub fn insert_payment(mut self, payment: &PaymentRecord) -> Self {
        self.changes.push(Change::InsertPayment(payment.clone()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

#[derive(Debug, Clone, Copy)]
pub enum OrderQuery {
    ByUser(ObjectId),
    ByStatus(BookingStatus),
    /// Completed trips driven by the given driver.
    CompletedByDriver(ObjectId),
}

impl OrderQuery {
    pub fn matches(&self, order: &Order) -> bool {
        match self {
            OrderQuery::ByUser(user_id) => &order.user_id == user_id,
            OrderQuery::ByStatus(status) => &order.booking_status == status,
            OrderQuery::CompletedByDriver(driver_id) => {
                order.booking_status == BookingStatus::Completed
                    && order.driver_id.as_ref() == Some(driver_id)
            }
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    async fn find_order(&self, id: &ObjectId) -> StoreResult<Option<Order>>;

    async fn find_order_by_gateway_ref(
        &self,
        razorpay_order_id: &str,
    ) -> StoreResult<Option<Order>>;

    /// Matching orders, newest first.
    async fn list_orders(&self, query: OrderQuery) -> StoreResult<Vec<Order>>;

    async fn find_cab(&self, id: &ObjectId) -> StoreResult<Option<Cab>>;

    async fn cabs_by_capacity(&self, capacity: u32) -> StoreResult<Vec<Cab>>;

    async fn cabs_by_owner(&self, owner: &ObjectId) -> StoreResult<Vec<Cab>>;

    async fn find_user(&self, id: &ObjectId) -> StoreResult<Option<User>>;

    async fn users_by_ids(&self, ids: &[ObjectId]) -> StoreResult<Vec<User>>;

    /// Users whose wallet balance is non-zero.
    async fn users_with_balance(&self) -> StoreResult<Vec<User>>;

    async fn find_payment(
        &self,
        razorpay_payment_id: &str,
    ) -> StoreResult<Option<PaymentRecord>>;

    /// Applies every change or none of them.
    async fn commit(&self, changes: ChangeSet) -> StoreResult<()>;
}

/// Newest first, the order every listing is served in.
pub(crate) fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
