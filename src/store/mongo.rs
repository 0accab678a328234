use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    error::{Error as MongoError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR},
    options::IndexOptions,
    Client, ClientSession, Collection, Database, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};

use super::{
    sort_newest_first, Change, ChangeSet, OrderQuery, Store, StoreError, StoreResult, CABS,
    ORDERS, PAYMENTS, USERS,
};
use crate::models::{
    cab::Cab,
    order::{BookingStatus, Order},
    payment::PaymentRecord,
    user::User,
};

const DUPLICATE_KEY: i32 = 11000;
const WRITE_CONFLICT: i32 = 112;

pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    fn orders(&self) -> Collection<Order> {
        self.db.collection(ORDERS)
    }

    fn cabs(&self) -> Collection<Cab> {
        self.db.collection(CABS)
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    fn payments(&self) -> Collection<PaymentRecord> {
        self.db.collection(PAYMENTS)
    }

    /// Unique gateway payment ids back the idempotent verification path; the
    /// TTL index lets MongoDB drop unpaid orders once `order_expire` passes.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = IndexOptions::builder().unique(true).build();
        self.payments()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "razorpayPaymentId": 1 })
                    .options(unique)
                    .build(),
            )
            .await
            .map_err(|e| classify(e, PAYMENTS))?;

        let ttl = IndexOptions::builder()
            .expire_after(Duration::from_secs(0))
            .build();
        self.orders()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "order_expire": 1 })
                    .options(ttl)
                    .build(),
            )
            .await
            .map_err(|e| classify(e, ORDERS))?;

        self.orders()
            .create_index(IndexModel::builder().keys(doc! { "razorpayOrderId": 1 }).build())
            .await
            .map_err(|e| classify(e, ORDERS))?;
        self.orders()
            .create_index(IndexModel::builder().keys(doc! { "userId": 1 }).build())
            .await
            .map_err(|e| classify(e, ORDERS))?;
        self.cabs()
            .create_index(IndexModel::builder().keys(doc! { "belongsTo": 1 }).build())
            .await
            .map_err(|e| classify(e, CABS))?;

        tracing::info!("✅ MongoDB indexes ensured");
        Ok(())
    }

    async fn apply(&self, session: &mut ClientSession, change: Change) -> StoreResult<()> {
        let collection = change.collection();
        match change {
            Change::InsertOrder(order) => {
                insert(&self.orders(), session, &order, collection).await
            }
            Change::InsertCab(cab) => insert(&self.cabs(), session, &cab, collection).await,
            Change::InsertUser(user) => insert(&self.users(), session, &user, collection).await,
            Change::InsertPayment(payment) => {
                insert(&self.payments(), session, &payment, collection).await
            }
            Change::ReplaceOrder(mut order) => {
                let filter = doc! { "_id": order.id, "version": order.version };
                order.version += 1;
                replace(&self.orders(), session, filter, &order, collection).await
            }
            Change::ReplaceCab(mut cab) => {
                let filter = doc! { "_id": cab.id, "version": cab.version };
                cab.version += 1;
                replace(&self.cabs(), session, filter, &cab, collection).await
            }
            Change::DeleteCab(cab) => {
                let filter = doc! { "_id": cab.id, "version": cab.version };
                let result = self
                    .cabs()
                    .delete_one(filter)
                    .session(&mut *session)
                    .await
                    .map_err(|e| classify(e, collection))?;
                if result.deleted_count == 0 {
                    return Err(StoreError::WriteConflict(collection.to_string()));
                }
                Ok(())
            }
            Change::ReplaceUser(mut user) => {
                let filter = doc! { "_id": user.id, "version": user.version };
                user.version += 1;
                replace(&self.users(), session, filter, &user, collection).await
            }
        }
    }

    async fn find_many<T>(
        &self,
        collection: &Collection<T>,
        filter: Document,
    ) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let name = collection.name().to_string();
        collection
            .find(filter)
            .await
            .map_err(|e| classify(e, &name))?
            .try_collect()
            .await
            .map_err(|e| classify(e, &name))
    }
}

async fn insert<T>(
    collection: &Collection<T>,
    session: &mut ClientSession,
    doc: &T,
    name: &str,
) -> StoreResult<()>
where
    T: Serialize + Send + Sync,
{
    collection
        .insert_one(doc)
        .session(session)
        .await
        .map(|_| ())
        .map_err(|e| classify(e, name))
}

async fn replace<T>(
    collection: &Collection<T>,
    session: &mut ClientSession,
    filter: Document,
    doc: &T,
    name: &str,
) -> StoreResult<()>
where
    T: Serialize + Send + Sync,
{
    let result = collection
        .replace_one(filter, doc)
        .session(session)
        .await
        .map_err(|e| classify(e, name))?;

    if result.matched_count == 0 {
        return Err(StoreError::WriteConflict(name.to_string()));
    }
    Ok(())
}

/// Maps driver errors onto the typed store taxonomy using error labels and
/// server codes.
fn classify(err: MongoError, collection: &str) -> StoreError {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        return StoreError::WriteConflict(collection.to_string());
    }
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
            StoreError::DuplicateKey(collection.to_string())
        }
        ErrorKind::Command(command) if command.code == WRITE_CONFLICT => {
            StoreError::WriteConflict(collection.to_string())
        }
        ErrorKind::Command(command) if command.code == DUPLICATE_KEY => {
            StoreError::DuplicateKey(collection.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn ping(&self) -> StoreResult<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn find_order(&self, id: &ObjectId) -> StoreResult<Option<Order>> {
        self.orders()
            .find_one(doc! { "_id": *id })
            .await
            .map_err(|e| classify(e, ORDERS))
    }

    async fn find_order_by_gateway_ref(
        &self,
        razorpay_order_id: &str,
    ) -> StoreResult<Option<Order>> {
        self.orders()
            .find_one(doc! { "razorpayOrderId": razorpay_order_id })
            .await
            .map_err(|e| classify(e, ORDERS))
    }

    async fn list_orders(&self, query: OrderQuery) -> StoreResult<Vec<Order>> {
        let filter = match query {
            OrderQuery::ByUser(user_id) => doc! { "userId": user_id },
            OrderQuery::ByStatus(status) => doc! { "bookingStatus": status.as_str() },
            OrderQuery::CompletedByDriver(driver_id) => doc! {
                "driverId": driver_id,
                "bookingStatus": BookingStatus::Completed.as_str(),
            },
        };
        let mut orders = self.find_many(&self.orders(), filter).await?;
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    async fn find_cab(&self, id: &ObjectId) -> StoreResult<Option<Cab>> {
        self.cabs()
            .find_one(doc! { "_id": *id })
            .await
            .map_err(|e| classify(e, CABS))
    }

    async fn cabs_by_capacity(&self, capacity: u32) -> StoreResult<Vec<Cab>> {
        let mut cabs = self
            .find_many(&self.cabs(), doc! { "capacity": capacity as i64 })
            .await?;
        cabs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(cabs)
    }

    async fn cabs_by_owner(&self, owner: &ObjectId) -> StoreResult<Vec<Cab>> {
        let mut cabs = self
            .find_many(&self.cabs(), doc! { "belongsTo": *owner })
            .await?;
        cabs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(cabs)
    }

    async fn find_user(&self, id: &ObjectId) -> StoreResult<Option<User>> {
        self.users()
            .find_one(doc! { "_id": *id })
            .await
            .map_err(|e| classify(e, USERS))
    }

    async fn users_by_ids(&self, ids: &[ObjectId]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.find_many(&self.users(), doc! { "_id": { "$in": ids.to_vec() } })
            .await
    }

    async fn users_with_balance(&self) -> StoreResult<Vec<User>> {
        self.find_many(&self.users(), doc! { "wallet.balance": { "$ne": 0 } })
            .await
    }

    async fn find_payment(
        &self,
        razorpay_payment_id: &str,
    ) -> StoreResult<Option<PaymentRecord>> {
        self.payments()
            .find_one(doc! { "razorpayPaymentId": razorpay_payment_id })
            .await
            .map_err(|e| classify(e, PAYMENTS))
    }

    async fn commit(&self, changes: ChangeSet) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut session = self
            .client
            .start_session()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        session
            .start_transaction()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        for change in changes.into_changes() {
            if let Err(err) = self.apply(&mut session, change).await {
                if let Err(abort_err) = session.abort_transaction().await {
                    tracing::warn!("⚠️ Failed to abort transaction: {}", abort_err);
                }
                return Err(err);
            }
        }

        session
            .commit_transaction()
            .await
            .map_err(|e| classify(e, "transaction"))
    }
}
