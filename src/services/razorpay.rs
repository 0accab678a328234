// services/razorpay.rs
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::config::RazorpayConfig;
use crate::errors::{AppError, Result};
use crate::models::user::{BankDetails, PayoutAccount, User};
use crate::services::payment_gateway::{verify_payment_signature, PaymentGateway};
use crate::services::payout_provider::{PayoutProvider, TransferResult};

const BASE_URL: &str = "https://api.razorpay.com/v1";
const VALIDATION_AMOUNT_PAISE: u64 = 100;
const PAYOUT_IDEMPOTENCY_HEADER: &str = "X-Payout-Idempotency";

#[derive(Debug, Serialize)]
pub struct CreateOrderRequest<'a> {
    pub amount: u64,
    pub currency: &'a str,
    pub receipt: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderResponse {
    pub id: String,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BankAccount<'a> {
    pub name: &'a str,
    pub ifsc: &'a str,
    pub account_number: &'a str,
}

#[derive(Debug, Serialize)]
pub struct FundAccountRequest<'a> {
    pub contact_id: &'a str,
    pub account_type: &'a str,
    pub bank_account: BankAccount<'a>,
}

#[derive(Debug, Serialize)]
pub struct PayoutRequest<'a> {
    pub account_number: &'a str,
    pub fund_account_id: &'a str,
    pub amount: u64,
    pub currency: &'a str,
    pub mode: &'a str,
    pub purpose: &'a str,
    pub queue_if_low_balance: bool,
    pub reference_id: &'a str,
    pub narration: String,
}

#[derive(Debug, Deserialize)]
pub struct IdResponse {
    pub id: String,
    pub status: Option<String>,
    pub mode: Option<String>,
}

#[derive(Clone)]
pub struct RazorpayClient {
    config: RazorpayConfig,
    site_name: String,
    currency: String,
    client: Client,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig, site_name: String, currency: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::configuration(format!("Razorpay client: {}", e)))?;

        Ok(RazorpayClient {
            config,
            site_name,
            currency,
            client,
        })
    }

    fn auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.config.api_key, self.config.api_secret);
        format!("Basic {}", base64.encode(credentials))
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.post_idempotent(endpoint, body, None).await
    }

    /// Same as `post`; a key makes the gateway collapse repeated requests.
    async fn post_idempotent<B, R>(
        &self,
        endpoint: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(format!("{}/{}", BASE_URL, endpoint))
            .header(header::AUTHORIZATION, self.auth_header())
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = idempotency_key {
            request = request.header(PAYOUT_IDEMPOTENCY_HEADER, key);
        }
        let response = request.json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Razorpay call to {} failed: {} - {}", endpoint, status, body);
            return Err(AppError::external_api(format!(
                "Razorpay {} returned {}",
                endpoint, status
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        receipt: &str,
    ) -> Result<String> {
        info!("Creating gateway order {} for {} {}", receipt, amount_minor, currency);
        let order: CreateOrderResponse = self
            .post(
                "orders",
                &CreateOrderRequest {
                    amount: amount_minor,
                    currency,
                    receipt,
                },
            )
            .await?;
        info!("✅ Gateway order {} created ({:?})", order.id, order.status);
        Ok(order.id)
    }

    fn verify_signature(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(
            &self.config.api_secret,
            gateway_order_id,
            payment_id,
            signature,
        )
    }
}

#[async_trait]
impl PayoutProvider for RazorpayClient {
    async fn setup_account(&self, driver: &User, bank: &BankDetails) -> Result<PayoutAccount> {
        let driver_ref = driver.id.to_hex();
        let contact: IdResponse = self
            .post(
                "contacts",
                &json!({
                    "name": driver.username,
                    "email": driver.email,
                    "contact": driver.phone_number,
                    "type": "Drivers",
                    "reference_id": driver_ref,
                }),
            )
            .await
            .map_err(|e| AppError::payout(format!("contact creation failed: {}", e)))?;
        info!("Payout contact {} created for driver {}", contact.id, driver_ref);

        let fund_account: IdResponse = self
            .post(
                "fund_accounts",
                &FundAccountRequest {
                    contact_id: &contact.id,
                    account_type: "bank_account",
                    bank_account: BankAccount {
                        name: &bank.account_holder_name,
                        ifsc: &bank.ifsc,
                        account_number: &bank.acc_no,
                    },
                },
            )
            .await
            .map_err(|e| AppError::payout(format!("fund account creation failed: {}", e)))?;
        info!("Fund account {} created", fund_account.id);

        let validation: IdResponse = self
            .post(
                "fund_accounts/validations",
                &json!({
                    "account_number": self.config.account_number,
                    "fund_account": { "id": fund_account.id },
                    "amount": VALIDATION_AMOUNT_PAISE,
                    "currency": self.currency,
                    "notes": { "Description": format!("{} account validation", self.site_name) },
                }),
            )
            .await
            .map_err(|e| AppError::payout(format!("fund account validation failed: {}", e)))?;
        info!("Fund account validation {} is {:?}", validation.id, validation.status);

        Ok(PayoutAccount {
            contact_id: contact.id,
            fund_account_id: fund_account.id,
        })
    }

    async fn transfer(
        &self,
        fund_account_id: &str,
        amount: f64,
        reference: &str,
    ) -> Result<TransferResult> {
        let payout: IdResponse = self
            .post_idempotent(
                "payouts",
                &PayoutRequest {
                    account_number: &self.config.account_number,
                    fund_account_id,
                    amount: (amount * 100.0).round() as u64,
                    currency: &self.currency,
                    mode: "NEFT",
                    purpose: "payout",
                    queue_if_low_balance: true,
                    reference_id: reference,
                    narration: format!("From {}", self.site_name),
                },
                Some(reference),
            )
            .await
            .map_err(|e| AppError::payout(format!("transfer failed: {}", e)))?;

        info!("💸 Payout {} queued ({:?})", payout.id, payout.status);
        Ok(TransferResult {
            id: payout.id,
            mode: payout.mode.unwrap_or_else(|| "NEFT".to_string()),
        })
    }
}
