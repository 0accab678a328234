use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::{AppConfig, HybridPolicy};
use crate::services::{
    cache::ResponseCache, notifier::Notifier, payment_gateway::PaymentGateway,
    payout_provider::PayoutProvider,
};
use crate::store::Store;

/// Business knobs the booking core reads on every request.
#[derive(Debug, Clone)]
pub struct BookingSettings {
    pub hybrid: HybridPolicy,
    pub order_expire_minutes: i64,
    pub cache_ttl: Duration,
    pub currency: String,
    pub jwt_secret: String,
}

impl BookingSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        BookingSettings {
            hybrid: config.hybrid,
            order_expire_minutes: config.order_expire_minutes,
            cache_ttl: Duration::from_secs(config.cache_ttl_seconds),
            currency: config.currency.clone(),
            jwt_secret: config.jwt_secret.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn ResponseCache>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub payouts: Arc<dyn PayoutProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub settings: Arc<BookingSettings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn ResponseCache>,
        gateway: Arc<dyn PaymentGateway>,
        payouts: Arc<dyn PayoutProvider>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: BookingSettings,
    ) -> Self {
        AppState {
            store,
            cache,
            gateway,
            payouts,
            notifier,
            clock,
            settings: Arc::new(settings),
        }
    }

    pub fn invalidate_order(&self, id: &mongodb::bson::oid::ObjectId) {
        self.cache
            .invalidate(&crate::services::cache::order_keys(id));
    }
}
