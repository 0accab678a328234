use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::models::user::{BankDetails, PayoutAccount, User};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    pub id: String,
    pub mode: String,
}

/// Moves settled driver earnings to their bank account.
#[async_trait]
pub trait PayoutProvider: Send + Sync {
    /// Provisions the payout destination for a driver's bank account.
    async fn setup_account(&self, driver: &User, bank: &BankDetails) -> Result<PayoutAccount>;

    /// Transfers `amount` (major units) to the fund account. `reference` is
    /// also the idempotency key, so repeating a transfer for the same order
    /// must not move money twice.
    async fn transfer(
        &self,
        fund_account_id: &str,
        amount: f64,
        reference: &str,
    ) -> Result<TransferResult>;
}
