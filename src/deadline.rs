//! Time-box helper for host-side waits.

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Await `future`, giving up after `limit`. The future is dropped on expiry;
/// blocking work it already handed off keeps running to completion.
pub async fn with_deadline<T, F>(future: F, limit: Duration, reason: &str) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!(
                target: "clip_finalizer::deadline",
                "{} did not finish within {:?}",
                reason,
                limit
            );
            Err(AppError::DeadlineExceeded(reason.to_string()))
        }
    }
}
