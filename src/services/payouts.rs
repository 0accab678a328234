use chrono::Duration;
use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::errors::{AppError, Result};
use crate::models::{
    auth::{AuthContext, Role},
    order::Order,
    user::{BankDetails, DriverPayoutResponse, PayoutAccount, User},
};
use crate::services::{load_order, load_user, payout_provider::TransferResult};
use crate::state::AppState;
use crate::store::{with_write_retry, ChangeSet};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutReceipt {
    pub transfer_id: String,
    pub mode: String,
    pub amount: f64,
    pub order_id: String,
    pub driver: DriverPayoutResponse,
}

/// Drivers the platform still owes money to.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn pending_payouts(
    state: &AppState,
    ctx: &AuthContext,
) -> Result<Vec<DriverPayoutResponse>> {
    ctx.require(&[Role::Admin])?;
    let drivers = state.store.users_with_balance().await?;
    Ok(drivers
        .into_iter()
        .filter(|user| user.role == Role::Driver)
        .map(DriverPayoutResponse::from)
        .collect())
}

/// Claims on a wallet older than this are treated as abandoned.
pub const PAYOUT_CLAIM_TTL_MINUTES: i64 = 15;

/// Pays out the pending wallet credit a driver earned on `order_id`.
///
/// The credit is claimed in the store before any money moves, so a second
/// settlement racing this one fails with a conflict instead of paying twice.
/// The transfer carries the order id as its idempotency reference. Once it
/// has gone through, the wallet and order are settled; if it fails, the claim
/// is released and the credit stays pending.
#[instrument(skip(state, ctx), fields(actor = %ctx.user_id))]
pub async fn settle_payout(
    state: &AppState,
    ctx: &AuthContext,
    driver_id: ObjectId,
    order_id: ObjectId,
) -> Result<PayoutReceipt> {
    ctx.require(&[Role::Admin])?;

    let (driver, amount) = with_write_retry("claim-payout", || {
        claim_payout(state, driver_id, order_id)
    })
    .await?;
    info!(driver = %driver_id, order = %order_id, amount, "🔒 Payout claimed");

    let (account, transfer) = match send_payout(state, &driver, amount, &order_id).await {
        Ok(sent) => sent,
        Err(SendFailure { account, error }) => {
            let released = with_write_retry("release-payout", || {
                release_claim(state, driver_id, order_id, account.as_ref())
            })
            .await;
            if let Err(e) = released {
                warn!(
                    driver = %driver_id,
                    order = %order_id,
                    "⚠️ Payout claim left in place after failed transfer: {}",
                    e
                );
            }
            return Err(error);
        }
    };
    info!(transfer = %transfer.id, amount, "💸 Transfer accepted");

    let (driver, _order) = with_write_retry("settle-payout", || {
        record_settlement(state, driver_id, order_id, &account, &transfer)
    })
    .await
    .map_err(|e| {
        error!(
            transfer = %transfer.id,
            driver = %driver_id,
            order = %order_id,
            "❌ Transfer sent but settlement not recorded: {}",
            e
        );
        e
    })?;
    state.invalidate_order(&order_id);

    Ok(PayoutReceipt {
        transfer_id: transfer.id,
        mode: transfer.mode,
        amount,
        order_id: order_id.to_hex(),
        driver: driver.into(),
    })
}

struct SendFailure {
    account: Option<PayoutAccount>,
    error: AppError,
}

/// Provisions the payout account when the driver has none, then transfers.
/// A freshly provisioned account is handed back even when the transfer fails.
async fn send_payout(
    state: &AppState,
    driver: &User,
    amount: f64,
    order_id: &ObjectId,
) -> std::result::Result<(PayoutAccount, TransferResult), SendFailure> {
    let (account, provisioned) = match driver.wallet.payout_account.clone() {
        Some(account) => (account, false),
        None => {
            info!(driver = %driver.id, "Provisioning payout account");
            let bank = driver
                .wallet
                .bank_details
                .as_ref()
                .ok_or_else(|| SendFailure {
                    account: None,
                    error: AppError::invalid_data("driver has no valid bank details on file"),
                })?;
            let account = state
                .payouts
                .setup_account(driver, bank)
                .await
                .map_err(|e| SendFailure {
                    account: None,
                    error: as_payout_error(e),
                })?;
            (account, true)
        }
    };

    match state
        .payouts
        .transfer(&account.fund_account_id, amount, &order_id.to_hex())
        .await
    {
        Ok(transfer) => Ok((account, transfer)),
        Err(e) => Err(SendFailure {
            account: provisioned.then_some(account),
            error: as_payout_error(e),
        }),
    }
}

fn as_payout_error(err: AppError) -> AppError {
    match err {
        AppError::Payout(_) => err,
        other => AppError::payout(other.to_string()),
    }
}

async fn claim_payout(
    state: &AppState,
    driver_id: ObjectId,
    order_id: ObjectId,
) -> Result<(User, f64)> {
    let store = state.store.as_ref();
    let mut driver = load_user(store, &driver_id, "Driver").await?;
    let order = load_order(store, &order_id).await?;
    if !order.is_driver(&driver.id) {
        return Err(AppError::invalid_data("order was not driven by this driver"));
    }
    driver.wallet.pending_amount(&order.id)?;
    let has_bank = driver
        .wallet
        .bank_details
        .as_ref()
        .map(BankDetails::is_valid)
        .unwrap_or(false);
    if !has_bank {
        return Err(AppError::invalid_data("driver has no valid bank details on file"));
    }

    let amount = driver.wallet.claim_payout(
        &order.id,
        state.clock.now(),
        Duration::minutes(PAYOUT_CLAIM_TTL_MINUTES),
    )?;
    store.commit(ChangeSet::new().replace_user(&driver)).await?;
    driver.version += 1;
    Ok((driver, amount))
}

async fn release_claim(
    state: &AppState,
    driver_id: ObjectId,
    order_id: ObjectId,
    account: Option<&PayoutAccount>,
) -> Result<()> {
    let store = state.store.as_ref();
    let mut driver = load_user(store, &driver_id, "Driver").await?;
    let mut changed = driver.wallet.release_claim(&order_id);
    if let (None, Some(account)) = (&driver.wallet.payout_account, account) {
        driver.wallet.payout_account = Some(account.clone());
        changed = true;
    }
    if changed {
        store.commit(ChangeSet::new().replace_user(&driver)).await?;
    }
    Ok(())
}

async fn record_settlement(
    state: &AppState,
    driver_id: ObjectId,
    order_id: ObjectId,
    account: &PayoutAccount,
    transfer: &TransferResult,
) -> Result<(User, Order)> {
    let store = state.store.as_ref();
    let mut driver = load_user(store, &driver_id, "Driver").await?;
    let mut order = load_order(store, &order_id).await?;
    let now = state.clock.now();

    if driver.wallet.payout_account.is_none() {
        driver.wallet.payout_account = Some(account.clone());
    }
    driver.wallet.settle(&order.id, &transfer.id)?;
    if let Some(share) = order.driver_share.as_mut() {
        share.mark_paid(now);
    }

    store
        .commit(ChangeSet::new().replace_user(&driver).replace_order(&order))
        .await?;
    driver.version += 1;
    order.version += 1;
    Ok((driver, order))
}
