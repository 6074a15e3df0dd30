//! Fixed-delay retry for remote operations
//!
//! Transient failures (transport, per-attempt timeouts) are retried with a
//! fixed delay between attempts and no attempt cap; any other error
//! returns immediately. The delay is a cancellation point.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::cancel::CancelToken;
use crate::errors::{BridgeError, BridgeResult};

/// Invoke `operation` until it succeeds or fails non-transiently.
pub async fn retry_until<F, Fut, T>(
    operation_name: &str,
    delay: Duration,
    cancel: &CancelToken,
    mut operation: F,
) -> BridgeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BridgeResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(BridgeError::Cancelled);
    }

    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() => {
                attempt += 1;
                debug!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient error, waiting before retry"
                );
                cancel.sleep(delay).await?;
            }
            Err(err) => return Err(err),
        }
    }
}
