use std::future::Future;
use std::time::Duration;

use crate::errors::{AppError, Result};
use crate::store::StoreError;

pub const MAX_WRITE_ATTEMPTS: u32 = 3;
pub const BASE_BACKOFF: Duration = Duration::from_millis(100);

/// Runs `attempt` until it stops failing with a write conflict, backing off
/// 100ms, 200ms, ... between tries. Any other outcome is returned as is.
pub async fn with_write_retry<T, F, Fut>(operation: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt().await {
            Err(AppError::Store(StoreError::WriteConflict(collection))) => {
                if tries >= MAX_WRITE_ATTEMPTS {
                    tracing::error!(
                        operation,
                        collection = %collection,
                        "❌ Write conflict persisted after {} attempts",
                        tries
                    );
                    return Err(AppError::conflict(format!(
                        "{} kept conflicting with concurrent updates to {}",
                        operation, collection
                    )));
                }

                let delay = BASE_BACKOFF * 2u32.pow(tries - 1);
                tracing::warn!(
                    operation,
                    collection = %collection,
                    attempt = tries,
                    "⚠️ Write conflict, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}
