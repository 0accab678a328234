#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mongodb::bson::oid::ObjectId;
use parking_lot::Mutex;
use serde_json::Value;

use cab_booking_api::{
    clock::FixedClock,
    config::HybridPolicy,
    errors::{AppError, Result},
    models::{
        auth::{AuthContext, Role},
        cab::{Availability, Cab},
        order::{BookingStatus, BookingType, Order, PaymentMethod, PaymentStatus},
        user::{BankDetails, PayoutAccount, User, Wallet},
    },
    services::{
        cache::MemoryCache,
        notifier::{NotificationTemplate, Notifier},
        payment_gateway::{sign_payment, verify_payment_signature, PaymentGateway},
        payout_provider::{PayoutProvider, TransferResult},
    },
    state::{AppState, BookingSettings},
    store::{ChangeSet, MemoryStore, Store},
};

pub const GATEWAY_SECRET: &str = "rzp_test_secret";
pub const JWT_SECRET: &str = "test-jwt-secret";

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 5, day, hour, 0, 0).unwrap()
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, NotificationTemplate, Value)>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn templates(&self) -> Vec<NotificationTemplate> {
        self.sent.lock().iter().map(|(_, t, _)| *t).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        recipient: &str,
        template: NotificationTemplate,
        data: &Value,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::external_api("sms provider unavailable"));
        }
        self.sent
            .lock()
            .push((recipient.to_string(), template, data.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct StubGateway {
    pub orders_created: AtomicU32,
    pub fail: AtomicBool,
}

impl StubGateway {
    pub fn sign(gateway_order_id: &str, payment_id: &str) -> String {
        sign_payment(GATEWAY_SECRET, gateway_order_id, payment_id).unwrap()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(
        &self,
        amount_minor: u64,
        _currency: &str,
        _receipt: &str,
    ) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::external_api("gateway down"));
        }
        let n = self.orders_created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("order_test_{}_{}", n, amount_minor))
    }

    fn verify_signature(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(GATEWAY_SECRET, gateway_order_id, payment_id, signature)
    }
}

#[derive(Default)]
pub struct StubPayouts {
    pub setups: AtomicU32,
    pub transfers: Mutex<Vec<(String, f64, String)>>,
    pub fail_transfer: AtomicBool,
    pub transfer_delay_ms: AtomicU64,
}

#[async_trait]
impl PayoutProvider for StubPayouts {
    async fn setup_account(
        &self,
        driver: &User,
        _bank: &BankDetails,
    ) -> Result<PayoutAccount> {
        self.setups.fetch_add(1, Ordering::SeqCst);
        Ok(PayoutAccount {
            contact_id: format!("cont_{}", driver.id.to_hex()),
            fund_account_id: format!("fa_{}", driver.id.to_hex()),
        })
    }

    async fn transfer(
        &self,
        fund_account_id: &str,
        amount: f64,
        reference: &str,
    ) -> Result<TransferResult> {
        let delay = self.transfer_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_transfer.load(Ordering::SeqCst) {
            return Err(AppError::payout("insufficient balance in payout account"));
        }
        let mut transfers = self.transfers.lock();
        transfers.push((fund_account_id.to_string(), amount, reference.to_string()));
        Ok(TransferResult {
            id: format!("pout_{}", transfers.len()),
            mode: "NEFT".to_string(),
        })
    }
}

pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: FixedClock,
    pub cache: Arc<MemoryCache>,
    pub notifier: Arc<RecordingNotifier>,
    pub gateway: Arc<StubGateway>,
    pub payouts: Arc<StubPayouts>,
}

pub fn settings() -> BookingSettings {
    BookingSettings {
        hybrid: HybridPolicy::default(),
        order_expire_minutes: 5,
        cache_ttl: Duration::from_secs(600),
        currency: "INR".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: BookingSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = FixedClock::new(at(1, 0));
        let cache = Arc::new(MemoryCache::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let gateway = Arc::new(StubGateway::default());
        let payouts = Arc::new(StubPayouts::default());

        let state = AppState::new(
            store.clone(),
            cache.clone(),
            gateway.clone(),
            payouts.clone(),
            notifier.clone(),
            Arc::new(clock.clone()),
            settings,
        );

        Harness {
            state,
            store,
            clock,
            cache,
            notifier,
            gateway,
            payouts,
        }
    }

    pub fn admin(&self) -> AuthContext {
        AuthContext::new(ObjectId::new(), Role::Admin)
    }

    pub fn as_driver(&self, driver: &User) -> AuthContext {
        AuthContext::new(driver.id, Role::Driver)
    }

    pub fn as_passenger(&self, passenger: &User) -> AuthContext {
        AuthContext::new(passenger.id, Role::Passenger)
    }

    pub async fn seed_user(&self, role: Role, verified: bool) -> User {
        let id = ObjectId::new();
        let user = User {
            id,
            username: format!("user_{}", &id.to_hex()[18..]),
            email: format!("{}@example.com", id.to_hex()),
            phone_number: format!("+9198{}", &id.to_hex()[16..]),
            role,
            is_verified_driver: verified,
            have_cab: false,
            wallet: Wallet::default(),
            created_at: at(1, 0),
            version: 0,
        };
        self.store
            .commit(ChangeSet::new().insert_user(&user))
            .await
            .unwrap();
        user
    }

    pub async fn seed_driver(&self) -> User {
        self.seed_user(Role::Driver, true).await
    }

    pub async fn seed_passenger(&self) -> User {
        self.seed_user(Role::Passenger, false).await
    }

    pub async fn seed_driver_with_bank(&self) -> User {
        let mut driver = self.seed_driver().await;
        driver.wallet.bank_details = Some(BankDetails {
            account_holder_name: driver.username.clone(),
            acc_no: "000123456789".to_string(),
            ifsc: "HDFC0001234".to_string(),
            bank_name: "HDFC Bank".to_string(),
        });
        self.store
            .commit(ChangeSet::new().replace_user(&driver))
            .await
            .unwrap();
        driver.version += 1;
        driver
    }

    pub async fn seed_cab(&self, owner: &User, capacity: u32) -> Cab {
        let cab = Cab {
            id: ObjectId::new(),
            model_name: "Innova Crysta".to_string(),
            capacity,
            feature: None,
            cab_number: format!("MH12{}", &ObjectId::new().to_hex()[18..]),
            rate: 14.0,
            is_ready: true,
            availability: Availability::Available,
            belongs_to: owner.id,
            upcoming_bookings: vec![],
            past_bookings: vec![],
            created_at: at(1, 0),
            version: 0,
        };
        self.store
            .commit(ChangeSet::new().insert_cab(&cab))
            .await
            .unwrap();
        cab
    }

    pub async fn seed_order(
        &self,
        passenger: &User,
        method: PaymentMethod,
        amount: f64,
        departure: DateTime<Utc>,
    ) -> Order {
        let id = ObjectId::new();
        let order = Order {
            id,
            user_id: passenger.id,
            booked_cab: None,
            driver_id: None,
            booking_type: BookingType::OneWay,
            departure_date: departure,
            drop_off_date: None,
            pickup_location: "Pune Station".to_string(),
            exact_location: None,
            destination: "Mumbai Airport".to_string(),
            number_of_passengers: 3,
            passengers: vec![],
            booking_amount: amount,
            paid_amount: 0.0,
            payment_method: method,
            payment_status: PaymentStatus::UnPaid,
            booking_status: BookingStatus::Pending,
            driver_share: None,
            razorpay_order_id: format!("order_seed_{}", id.to_hex()),
            order_expire: None,
            created_at: self.clock_now(),
            version: 0,
        };
        self.store
            .commit(ChangeSet::new().insert_order(&order))
            .await
            .unwrap();
        order
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        use cab_booking_api::clock::Clock;
        self.clock.now()
    }

    pub async fn order(&self, id: &ObjectId) -> Order {
        self.store.find_order(id).await.unwrap().unwrap()
    }

    pub async fn cab(&self, id: &ObjectId) -> Cab {
        self.store.find_cab(id).await.unwrap().unwrap()
    }

    pub async fn user(&self, id: &ObjectId) -> User {
        self.store.find_user(id).await.unwrap().unwrap()
    }
}
