use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::auth::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub transaction_date: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order_id: Option<ObjectId>,
    #[serde(default)]
    pub is_pending: bool,
    #[serde(default)]
    pub payout_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub account_holder_name: String,
    pub acc_no: String,
    pub ifsc: String,
    pub bank_name: String,
}

impl BankDetails {
    /// Digits-only account number and an IFSC of four letters then seven digits.
    pub fn is_valid(&self) -> bool {
        let acc_ok = !self.acc_no.is_empty() && self.acc_no.chars().all(|c| c.is_ascii_digit());
        let ifsc = self.ifsc.as_bytes();
        let ifsc_ok = ifsc.len() == 11
            && ifsc[..4].iter().all(|b| b.is_ascii_alphabetic())
            && ifsc[4..].iter().all(|b| b.is_ascii_digit());
        acc_ok
            && ifsc_ok
            && !self.account_holder_name.trim().is_empty()
            && !self.bank_name.trim().is_empty()
    }
}

/// Payout destination provisioned on first settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutAccount {
    pub contact_id: String,
    pub fund_account_id: String,
}

/// Marks a payout as in flight. Only one transfer per wallet runs at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutClaim {
    pub order_id: ObjectId,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq)]
pub enum WalletError {
    #[error("wallet already holds an entry for order {0}")]
    DuplicateEntry(ObjectId),

    #[error("no pending wallet entry for order {0}")]
    NoPendingEntry(ObjectId),

    #[error("a payout for order {0} is already in progress")]
    PayoutInProgress(ObjectId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub balance: f64,
    pub currency: String,
    #[serde(default)]
    pub bank_details: Option<BankDetails>,
    #[serde(default)]
    pub payout_account: Option<PayoutAccount>,
    #[serde(default)]
    pub transaction_history: Vec<WalletTransaction>,
    #[serde(default)]
    pub payout_claim: Option<PayoutClaim>,
}

impl Default for Wallet {
    fn default() -> Self {
        Wallet {
            balance: 0.0,
            currency: "INR".to_string(),
            bank_details: None,
            payout_account: None,
            transaction_history: Vec::new(),
            payout_claim: None,
        }
    }
}

impl Wallet {
    pub fn entry_for(&self, order_id: &ObjectId) -> Option<&WalletTransaction> {
        self.transaction_history
            .iter()
            .find(|tx| tx.order_id.as_ref() == Some(order_id))
    }

    fn ensure_unrecorded(&self, order_id: &ObjectId) -> Result<(), WalletError> {
        match self.entry_for(order_id) {
            Some(_) => Err(WalletError::DuplicateEntry(*order_id)),
            None => Ok(()),
        }
    }

    /// Platform owes the driver: balance grows until an admin payout clears it.
    pub fn record_pending_credit(
        &mut self,
        amount: f64,
        order_id: ObjectId,
        at: DateTime<Utc>,
    ) -> Result<(), WalletError> {
        self.ensure_unrecorded(&order_id)?;
        self.balance += amount;
        self.transaction_history.push(WalletTransaction {
            kind: TransactionType::Credit,
            amount,
            transaction_date: at,
            description: "You will get paid by us".to_string(),
            order_id: Some(order_id),
            is_pending: true,
            payout_id: None,
        });
        Ok(())
    }

    /// Driver already collected from the passenger; nothing owed.
    pub fn record_collected_credit(
        &mut self,
        amount: f64,
        order_id: ObjectId,
        at: DateTime<Utc>,
    ) -> Result<(), WalletError> {
        self.ensure_unrecorded(&order_id)?;
        self.transaction_history.push(WalletTransaction {
            kind: TransactionType::Credit,
            amount,
            transaction_date: at,
            description: "You have been paid by the passenger".to_string(),
            order_id: Some(order_id),
            is_pending: false,
            payout_id: None,
        });
        Ok(())
    }

    pub fn pending_amount(&self, order_id: &ObjectId) -> Result<f64, WalletError> {
        self.entry_for(order_id)
            .filter(|tx| tx.is_pending)
            .map(|tx| tx.amount)
            .ok_or(WalletError::NoPendingEntry(*order_id))
    }

    /// Reserves the pending credit for `order_id` ahead of a transfer and
    /// returns its amount. A claim older than `stale_after` is taken over.
    pub fn claim_payout(
        &mut self,
        order_id: &ObjectId,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<f64, WalletError> {
        let amount = self.pending_amount(order_id)?;
        if let Some(claim) = &self.payout_claim {
            if now - claim.claimed_at < stale_after {
                return Err(WalletError::PayoutInProgress(claim.order_id));
            }
        }
        self.payout_claim = Some(PayoutClaim {
            order_id: *order_id,
            claimed_at: now,
        });
        Ok(amount)
    }

    /// Drops the claim held for `order_id`, if any.
    pub fn release_claim(&mut self, order_id: &ObjectId) -> bool {
        match &self.payout_claim {
            Some(claim) if claim.order_id == *order_id => {
                self.payout_claim = None;
                true
            }
            _ => false,
        }
    }

    /// Clears the pending credit for `order_id`; returns the settled amount.
    pub fn settle(&mut self, order_id: &ObjectId, payout_id: &str) -> Result<f64, WalletError> {
        let tx = self
            .transaction_history
            .iter_mut()
            .find(|tx| tx.order_id.as_ref() == Some(order_id) && tx.is_pending)
            .ok_or(WalletError::NoPendingEntry(*order_id))?;

        tx.is_pending = false;
        tx.payout_id = Some(payout_id.to_string());
        self.balance -= tx.amount;
        let amount = tx.amount;
        self.release_claim(order_id);
        Ok(amount)
    }

    /// What the platform still owes: the sum of pending credits.
    pub fn outstanding(&self) -> f64 {
        self.transaction_history
            .iter()
            .filter(|tx| tx.kind == TransactionType::Credit && tx.is_pending)
            .map(|tx| tx.amount)
            .sum()
    }
}

// Database model for the users collection (fields the booking core reads)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub role: Role,
    #[serde(default)]
    pub is_verified_driver: bool,
    #[serde(default)]
    pub have_cab: bool,
    #[serde(default)]
    pub wallet: Wallet,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfileResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub is_verified_driver: bool,
    pub have_cab: bool,
}

impl From<User> for DriverProfileResponse {
    fn from(user: User) -> Self {
        DriverProfileResponse {
            id: user.id.to_hex(),
            username: user.username,
            email: user.email,
            phone_number: user.phone_number,
            is_verified_driver: user.is_verified_driver,
            have_cab: user.have_cab,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPayoutResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub balance: f64,
    pub currency: String,
    pub has_bank_details: bool,
    pub pending: Vec<WalletTransaction>,
}

impl From<User> for DriverPayoutResponse {
    fn from(user: User) -> Self {
        let has_bank_details = user
            .wallet
            .bank_details
            .as_ref()
            .map(BankDetails::is_valid)
            .unwrap_or(false);
        let pending = user
            .wallet
            .transaction_history
            .into_iter()
            .filter(|tx| tx.is_pending)
            .collect();

        DriverPayoutResponse {
            id: user.id.to_hex(),
            username: user.username,
            email: user.email,
            phone_number: user.phone_number,
            balance: user.wallet.balance,
            currency: user.wallet.currency,
            has_bank_details,
            pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> BankDetails {
        BankDetails {
            account_holder_name: "R. Kulkarni".into(),
            acc_no: "000123456789".into(),
            ifsc: "HDFC0001234".into(),
            bank_name: "HDFC".into(),
        }
    }

    #[test]
    fn bank_details_validation() {
        assert!(bank().is_valid());
        assert!(!BankDetails { ifsc: "HDF00001234".into(), ..bank() }.is_valid());
        assert!(!BankDetails { acc_no: "12AB".into(), ..bank() }.is_valid());
        assert!(!BankDetails { bank_name: " ".into(), ..bank() }.is_valid());
    }

    #[test]
    fn one_entry_per_order() {
        let mut wallet = Wallet::default();
        let order = ObjectId::new();
        wallet.record_pending_credit(900.0, order, Utc::now()).unwrap();
        assert_eq!(
            wallet.record_collected_credit(900.0, order, Utc::now()),
            Err(WalletError::DuplicateEntry(order))
        );
        assert_eq!(wallet.transaction_history.len(), 1);
    }

    #[test]
    fn balance_tracks_pending_credits() {
        let mut wallet = Wallet::default();
        let (a, b, c) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        wallet.record_pending_credit(500.0, a, Utc::now()).unwrap();
        wallet.record_pending_credit(250.0, b, Utc::now()).unwrap();
        wallet.record_collected_credit(900.0, c, Utc::now()).unwrap();
        assert_eq!(wallet.balance, wallet.outstanding());

        assert_eq!(wallet.settle(&a, "pout_1").unwrap(), 500.0);
        assert_eq!(wallet.balance, 250.0);
        assert_eq!(wallet.balance, wallet.outstanding());
        assert_eq!(wallet.entry_for(&a).unwrap().payout_id.as_deref(), Some("pout_1"));
    }

    #[test]
    fn settling_twice_fails() {
        let mut wallet = Wallet::default();
        let order = ObjectId::new();
        wallet.record_pending_credit(100.0, order, Utc::now()).unwrap();
        wallet.settle(&order, "pout_1").unwrap();
        assert_eq!(
            wallet.settle(&order, "pout_2"),
            Err(WalletError::NoPendingEntry(order))
        );
        assert_eq!(wallet.balance, 0.0);
    }

    #[test]
    fn one_payout_claim_at_a_time() {
        let mut wallet = Wallet::default();
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let now = Utc::now();
        let ttl = Duration::minutes(15);
        wallet.record_pending_credit(300.0, a, now).unwrap();
        wallet.record_pending_credit(200.0, b, now).unwrap();

        assert_eq!(wallet.claim_payout(&a, now, ttl).unwrap(), 300.0);
        assert_eq!(
            wallet.claim_payout(&a, now, ttl),
            Err(WalletError::PayoutInProgress(a))
        );
        assert_eq!(
            wallet.claim_payout(&b, now, ttl),
            Err(WalletError::PayoutInProgress(a))
        );

        assert!(!wallet.release_claim(&b));
        wallet.settle(&a, "pout_1").unwrap();
        assert_eq!(wallet.payout_claim, None);
        assert_eq!(wallet.claim_payout(&b, now, ttl).unwrap(), 200.0);
    }

    #[test]
    fn stale_claims_can_be_taken_over() {
        let mut wallet = Wallet::default();
        let order = ObjectId::new();
        let start = Utc::now();
        let ttl = Duration::minutes(15);
        wallet.record_pending_credit(300.0, order, start).unwrap();
        wallet.claim_payout(&order, start, ttl).unwrap();

        let later = start + Duration::minutes(16);
        assert_eq!(wallet.claim_payout(&order, later, ttl).unwrap(), 300.0);
        assert_eq!(wallet.payout_claim.as_ref().unwrap().claimed_at, later);
    }

    #[test]
    fn settled_entries_cannot_be_claimed() {
        let mut wallet = Wallet::default();
        let order = ObjectId::new();
        wallet.record_collected_credit(300.0, order, Utc::now()).unwrap();
        assert_eq!(
            wallet.claim_payout(&order, Utc::now(), Duration::minutes(15)),
            Err(WalletError::NoPendingEntry(order))
        );
        assert_eq!(wallet.payout_claim, None);
    }
}
