use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use super::{
    sort_newest_first, Change, ChangeSet, OrderQuery, Store, StoreError, StoreResult, CABS,
    ORDERS, PAYMENTS, USERS,
};
use crate::models::{cab::Cab, order::Order, payment::PaymentRecord, user::User};

#[derive(Default)]
struct Collections {
    orders: HashMap<ObjectId, Order>,
    cabs: HashMap<ObjectId, Cab>,
    users: HashMap<ObjectId, User>,
    // keyed by gateway payment id, which is unique
    payments: HashMap<String, PaymentRecord>,
}

/// In-process store with the same versioning and all-or-nothing commit
/// semantics as the MongoDB backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn versioned<T>(
    current: Option<&T>,
    version_of: impl Fn(&T) -> i64,
    expected: i64,
    collection: &str,
) -> StoreResult<()> {
    match current {
        Some(doc) if version_of(doc) == expected => Ok(()),
        _ => Err(StoreError::WriteConflict(collection.to_string())),
    }
}

impl Collections {
    fn validate(&self, change: &Change) -> StoreResult<()> {
        match change {
            Change::InsertOrder(order) if self.orders.contains_key(&order.id) => {
                Err(StoreError::DuplicateKey(ORDERS.to_string()))
            }
            Change::InsertCab(cab) if self.cabs.contains_key(&cab.id) => {
                Err(StoreError::DuplicateKey(CABS.to_string()))
            }
            Change::InsertUser(user) if self.users.contains_key(&user.id) => {
                Err(StoreError::DuplicateKey(USERS.to_string()))
            }
            Change::InsertPayment(payment)
                if self.payments.contains_key(&payment.razorpay_payment_id) =>
            {
                Err(StoreError::DuplicateKey(PAYMENTS.to_string()))
            }
            Change::ReplaceOrder(order) => {
                versioned(self.orders.get(&order.id), |o| o.version, order.version, ORDERS)
            }
            Change::ReplaceCab(cab) | Change::DeleteCab(cab) => {
                versioned(self.cabs.get(&cab.id), |c| c.version, cab.version, CABS)
            }
            Change::ReplaceUser(user) => {
                versioned(self.users.get(&user.id), |u| u.version, user.version, USERS)
            }
            _ => Ok(()),
        }
    }

    fn apply(&mut self, change: Change) {
        match change {
            Change::InsertOrder(order) => {
                self.orders.insert(order.id, order);
            }
            Change::ReplaceOrder(mut order) => {
                order.version += 1;
                self.orders.insert(order.id, order);
            }
            Change::InsertCab(cab) => {
                self.cabs.insert(cab.id, cab);
            }
            Change::ReplaceCab(mut cab) => {
                cab.version += 1;
                self.cabs.insert(cab.id, cab);
            }
            Change::DeleteCab(cab) => {
                self.cabs.remove(&cab.id);
            }
            Change::InsertUser(user) => {
                self.users.insert(user.id, user);
            }
            Change::ReplaceUser(mut user) => {
                user.version += 1;
                self.users.insert(user.id, user);
            }
            Change::InsertPayment(payment) => {
                self.payments
                    .insert(payment.razorpay_payment_id.clone(), payment);
            }
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_order(&self, id: &ObjectId) -> StoreResult<Option<Order>> {
        Ok(self.inner.read().await.orders.get(id).cloned())
    }

    async fn find_order_by_gateway_ref(
        &self,
        razorpay_order_id: &str,
    ) -> StoreResult<Option<Order>> {
        Ok(self
            .inner
            .read()
            .await
            .orders
            .values()
            .find(|order| order.razorpay_order_id == razorpay_order_id)
            .cloned())
    }

    async fn list_orders(&self, query: OrderQuery) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .inner
            .read()
            .await
            .orders
            .values()
            .filter(|order| query.matches(order))
            .cloned()
            .collect();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    async fn find_cab(&self, id: &ObjectId) -> StoreResult<Option<Cab>> {
        Ok(self.inner.read().await.cabs.get(id).cloned())
    }

    async fn cabs_by_capacity(&self, capacity: u32) -> StoreResult<Vec<Cab>> {
        let mut cabs: Vec<Cab> = self
            .inner
            .read()
            .await
            .cabs
            .values()
            .filter(|cab| cab.capacity == capacity)
            .cloned()
            .collect();
        cabs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(cabs)
    }

    async fn cabs_by_owner(&self, owner: &ObjectId) -> StoreResult<Vec<Cab>> {
        let mut cabs: Vec<Cab> = self
            .inner
            .read()
            .await
            .cabs
            .values()
            .filter(|cab| &cab.belongs_to == owner)
            .cloned()
            .collect();
        cabs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(cabs)
    }

    async fn find_user(&self, id: &ObjectId) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn users_by_ids(&self, ids: &[ObjectId]) -> StoreResult<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id).cloned())
            .collect())
    }

    async fn users_with_balance(&self) -> StoreResult<Vec<User>> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .filter(|user| user.wallet.balance != 0.0)
            .cloned()
            .collect())
    }

    async fn find_payment(
        &self,
        razorpay_payment_id: &str,
    ) -> StoreResult<Option<PaymentRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .payments
            .get(razorpay_payment_id)
            .cloned())
    }

    async fn commit(&self, changes: ChangeSet) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let changes = changes.into_changes();
        for change in &changes {
            inner.validate(change)?;
        }
        for change in changes {
            inner.apply(change);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cab::Availability;
    use chrono::Utc;

    fn cab() -> Cab {
        Cab {
            id: ObjectId::new(),
            model_name: "Dzire".into(),
            capacity: 4,
            feature: None,
            cab_number: "KA01AA0001".into(),
            rate: 11.0,
            is_ready: true,
            availability: Availability::Available,
            belongs_to: ObjectId::new(),
            upcoming_bookings: vec![],
            past_bookings: vec![],
            created_at: Utc::now(),
            version: 0,
        }
    }

    #[tokio::test]
    async fn replace_bumps_version() {
        let store = MemoryStore::new();
        let mut cab = cab();
        store.commit(ChangeSet::new().insert_cab(&cab)).await.unwrap();

        cab.rate = 12.0;
        store.commit(ChangeSet::new().replace_cab(&cab)).await.unwrap();
        let stored = store.find_cab(&cab.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.rate, 12.0);
    }

    #[tokio::test]
    async fn stale_replace_is_a_write_conflict() {
        let store = MemoryStore::new();
        let cab = cab();
        store.commit(ChangeSet::new().insert_cab(&cab)).await.unwrap();
        store.commit(ChangeSet::new().replace_cab(&cab)).await.unwrap();

        let err = store
            .commit(ChangeSet::new().replace_cab(&cab))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteConflict(c) if c == CABS));
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let store = MemoryStore::new();
        let stale = cab();
        let fresh = cab();
        store.commit(ChangeSet::new().insert_cab(&stale)).await.unwrap();
        store.commit(ChangeSet::new().replace_cab(&stale)).await.unwrap();

        let result = store
            .commit(ChangeSet::new().insert_cab(&fresh).replace_cab(&stale))
            .await;
        assert!(result.is_err());
        assert!(store.find_cab(&fresh.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_needs_the_current_version() {
        let store = MemoryStore::new();
        let cab = cab();
        store.commit(ChangeSet::new().insert_cab(&cab)).await.unwrap();
        store.commit(ChangeSet::new().replace_cab(&cab)).await.unwrap();

        let err = store
            .commit(ChangeSet::new().delete_cab(&cab))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteConflict(_)));

        let current = store.find_cab(&cab.id).await.unwrap().unwrap();
        store.commit(ChangeSet::new().delete_cab(&current)).await.unwrap();
        assert!(store.find_cab(&cab.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_payment_id_is_rejected() {
        let store = MemoryStore::new();
        let payment = PaymentRecord {
            id: ObjectId::new(),
            order: ObjectId::new(),
            razorpay_order_id: "order_1".into(),
            razorpay_payment_id: "pay_1".into(),
            razorpay_signature: "sig".into(),
            created_at: Utc::now(),
        };
        store.commit(ChangeSet::new().insert_payment(&payment)).await.unwrap();

        let again = PaymentRecord { id: ObjectId::new(), ..payment };
        let err = store
            .commit(ChangeSet::new().insert_payment(&again))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }
}
