use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::Result;

type HmacSha256 = Hmac<Sha256>;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a gateway order for `amount_minor` (paise) and returns its id.
    async fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        receipt: &str,
    ) -> Result<String>;

    /// Whether `signature` authenticates `payment_id` against `gateway_order_id`.
    fn verify_signature(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool;
}

fn payment_mac(secret: &str, gateway_order_id: &str, payment_id: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(format!("{}|{}", gateway_order_id, payment_id).as_bytes());
    Some(mac)
}

/// Hex HMAC-SHA256 of `"{order_id}|{payment_id}"`, the checkout signature.
pub fn sign_payment(secret: &str, gateway_order_id: &str, payment_id: &str) -> Option<String> {
    payment_mac(secret, gateway_order_id, payment_id)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a checkout signature.
pub fn verify_payment_signature(
    secret: &str,
    gateway_order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    payment_mac(secret, gateway_order_id, payment_id)
        .map(|mac| mac.verify_slice(&provided).is_ok())
        .unwrap_or(false)
}
