// config.rs
use std::env;
use std::str::FromStr;

use crate::errors::{AppError, Result};

/// How `HYBRID_PAYMENT_PERCENTAGE` is read when splitting a hybrid booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentageMeaning {
    /// The platform keeps `pct` of the booking; the driver gets the rest.
    PlatformCut,
    /// The driver is owed `pct` of the booking.
    DriverCut,
}

impl FromStr for PercentageMeaning {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "platform_cut" => Ok(PercentageMeaning::PlatformCut),
            "driver_cut" => Ok(PercentageMeaning::DriverCut),
            other => Err(AppError::configuration(format!(
                "HYBRID_PERCENTAGE_MEANING must be platform_cut or driver_cut, got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridPolicy {
    pub percentage: f64,
    pub meaning: PercentageMeaning,
}

impl Default for HybridPolicy {
    fn default() -> Self {
        HybridPolicy {
            percentage: 0.1,
            meaning: PercentageMeaning::PlatformCut,
        }
    }
}

impl HybridPolicy {
    pub fn driver_cut(&self, booking_amount: f64) -> f64 {
        match self.meaning {
            PercentageMeaning::PlatformCut => booking_amount - self.percentage * booking_amount,
            PercentageMeaning::DriverCut => self.percentage * booking_amount,
        }
    }

    /// The deposit a hybrid passenger pays online, in major units.
    pub fn online_deposit(&self, booking_amount: f64) -> f64 {
        (booking_amount * self.percentage).round()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::configuration(format!(
                "STORE_BACKEND must be mongo or memory, got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub api_key: String,
    pub api_secret: String,
    pub account_number: String,
}

#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub api_key: String,
    pub username: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_env: String,
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub razorpay: RazorpayConfig,
    pub sms: Option<SmsConfig>,
    pub hybrid: HybridPolicy,
    pub order_expire_minutes: i64,
    pub cache_ttl_seconds: u64,
    pub site_name: String,
    pub currency: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup so parsing can be exercised without
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AppError::configuration(format!("{} must be set", key)))
        };
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let store_backend: StoreBackend = or_default("STORE_BACKEND", "mongo").parse()?;
        let database_url = match store_backend {
            StoreBackend::Mongo => required("DATABASE_URL")?,
            StoreBackend::Memory => or_default("DATABASE_URL", ""),
        };

        let percentage = parse_number::<f64>(
            "HYBRID_PAYMENT_PERCENTAGE",
            &or_default("HYBRID_PAYMENT_PERCENTAGE", "0.1"),
        )?;
        if !(0.0..=1.0).contains(&percentage) {
            return Err(AppError::configuration(
                "HYBRID_PAYMENT_PERCENTAGE must be a fraction between 0 and 1",
            ));
        }

        let sms = match (lookup("SMS_API_KEY"), lookup("SMS_USERNAME")) {
            (Some(api_key), Some(username)) if !api_key.is_empty() => Some(SmsConfig {
                api_key,
                username,
                from: or_default("SMS_FROM", "CabBooking"),
            }),
            _ => None,
        };

        Ok(AppConfig {
            app_env: or_default("APP_ENV", "development"),
            host: or_default("HOST", "0.0.0.0"),
            port: parse_number("PORT", &or_default("PORT", "3000"))?,
            store_backend,
            database_url,
            database_name: or_default("DATABASE_NAME", "cab_booking"),
            jwt_secret: required("JWT_SECRET")?,
            razorpay: RazorpayConfig {
                api_key: required("RAZORPAY_API_KEY")?,
                api_secret: required("RAZORPAY_API_SECRET")?,
                account_number: or_default("RAZORPAY_ACCOUNT_NUMBER", ""),
            },
            sms,
            hybrid: HybridPolicy {
                percentage,
                meaning: or_default("HYBRID_PERCENTAGE_MEANING", "platform_cut").parse()?,
            },
            order_expire_minutes: parse_number(
                "ORDER_EXPIRE_MINUTES",
                &or_default("ORDER_EXPIRE_MINUTES", "5"),
            )?,
            cache_ttl_seconds: parse_number(
                "CACHE_TTL_SECONDS",
                &or_default("CACHE_TTL_SECONDS", "600"),
            )?,
            site_name: or_default("SITE_NAME", "Cab Booking"),
            currency: or_default("CURRENCY", "INR"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    pub fn get_config_info(&self) -> serde_json::Value {
        serde_json::json!({
            "environment": self.app_env,
            "is_production": self.is_production(),
            "store_backend": format!("{:?}", self.store_backend),
            "database_name": self.database_name,
            "hybrid_percentage": self.hybrid.percentage,
            "hybrid_meaning": format!("{:?}", self.hybrid.meaning),
            "order_expire_minutes": self.order_expire_minutes,
            "razorpay_key_set": !self.razorpay.api_key.is_empty(),
            "payout_account_set": !self.razorpay.account_number.is_empty(),
            "sms_enabled": self.sms.is_some(),
            "port": self.port,
            "host": self.host,
        })
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::configuration(format!("{} must be a number, got {}", key, raw)))
}
