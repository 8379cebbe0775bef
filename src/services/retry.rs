use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Re-runs `op` while it fails with a retryable store error.
///
/// Meant for callers of the transfer engine running at `serializable` or
/// `repeatable_read`, where conflicting transfers are aborted rather than queued.
/// Waits `backoff * attempt` between attempts and gives up after `max_attempts`.
pub async fn retry_transient<T, F, Fut>(max_attempts: u32, backoff: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                warn!(attempt, error = %err, "Retrying after transient store error");
                tokio::time::sleep(backoff * attempt).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
