use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::SmsConfig;
use crate::errors::{AppError, Result};

const SMS_URL: &str = "https://api.africastalking.com/version1/messaging";
const SMS_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTemplate {
    DriverAssigned,
    BookingAccepted,
    PaymentReceived,
    CabRegistered,
}

impl NotificationTemplate {
    pub fn render(&self, site_name: &str, data: &Value) -> String {
        let field = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .unwrap_or("-")
                .to_string()
        };
        match self {
            NotificationTemplate::DriverAssigned => format!(
                "{}: new trip assigned. Pickup {} at {}, heading to {}. Please confirm in the app.",
                site_name,
                field("pickup"),
                field("departure"),
                field("destination")
            ),
            NotificationTemplate::BookingAccepted => format!(
                "{}: your driver has accepted the trip from {} on {}. Cab {}.",
                site_name,
                field("pickup"),
                field("departure"),
                field("cabNumber")
            ),
            NotificationTemplate::PaymentReceived => format!(
                "{}: payment of {} received for booking {}. Status: {}.",
                site_name,
                field("amount"),
                field("orderId"),
                field("paymentStatus")
            ),
            NotificationTemplate::CabRegistered => format!(
                "{}: cab {} ({}) is registered. It can take trips once it has been priced.",
                site_name,
                field("cabNumber"),
                field("modelName")
            ),
        }
    }
}

/// Outbound message channel. Callers treat delivery as best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        recipient: &str,
        template: NotificationTemplate,
        data: &Value,
    ) -> Result<()>;
}

/// Sends and swallows: a failed notification is logged, never returned.
pub async fn notify_best_effort(
    notifier: &dyn Notifier,
    recipient: &str,
    template: NotificationTemplate,
    data: &Value,
) {
    if recipient.trim().is_empty() {
        tracing::warn!(?template, "⚠️ No recipient address, notification skipped");
        return;
    }
    if let Err(e) = notifier.notify(recipient, template, data).await {
        tracing::warn!(?template, recipient, "⚠️ Notification failed: {}", e);
    }
}

#[derive(Clone)]
pub struct SmsNotifier {
    config: SmsConfig,
    site_name: String,
    client: Client,
}

impl SmsNotifier {
    pub fn new(config: SmsConfig, site_name: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::configuration(format!("SMS client: {}", e)))?;

        Ok(Self {
            config,
            site_name,
            client,
        })
    }

    async fn send_once(&self, phone: &str, message: &str) -> Result<()> {
        let response = self
            .client
            .post(SMS_URL)
            .header("apiKey", &self.config.api_key)
            .header("Accept", "application/json")
            .form(&[
                ("username", self.config.username.as_str()),
                ("to", phone),
                ("message", message),
                ("from", self.config.from.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("SMS API error: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::ExternalApi(format!(
                "SMS sending failed with status: {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn notify(
        &self,
        recipient: &str,
        template: NotificationTemplate,
        data: &Value,
    ) -> Result<()> {
        let message = template.render(&self.site_name, data);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_once(recipient, &message).await {
                Ok(()) => {
                    tracing::info!(?template, "📨 SMS sent");
                    return Ok(());
                }
                Err(e) if attempt < SMS_ATTEMPTS => {
                    tracing::warn!(attempt, "⚠️ SMS attempt failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Writes notifications to the log when no SMS provider is configured.
pub struct LogNotifier {
    site_name: String,
}

impl LogNotifier {
    pub fn new(site_name: String) -> Self {
        Self { site_name }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        recipient: &str,
        template: NotificationTemplate,
        data: &Value,
    ) -> Result<()> {
        let message_id = uuid::Uuid::new_v4();
        tracing::info!(
            %message_id,
            recipient,
            "📨 {}",
            template.render(&self.site_name, data)
        );
        Ok(())
    }
}
