//! Cancellable retry loop and settle waits.

use crate::error::{EmperorError, Result};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Successful outcome of [`retry_until_accepted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted<T> {
    pub value: T,
    /// Attempts made, including the successful one
    pub attempts: u32,
}

/// Call `attempt` until it succeeds, sleeping `backoff` between failures.
///
/// There is no attempt limit; the only way out besides success is `cancel`,
/// which aborts both an in-flight attempt and a pending backoff.
pub async fn retry_until_accepted<F, Fut, T, E>(
    backoff: Duration,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<Accepted<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let mut attempts = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(EmperorError::Cancelled);
        }

        attempts += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EmperorError::Cancelled),
            outcome = attempt() => outcome,
        };

        match outcome {
            Ok(value) => return Ok(Accepted { value, attempts }),
            Err(e) => debug!(attempt = attempts, "Write not accepted, retrying: {}", e),
        }

        sleep_or_cancel(backoff, cancel).await?;
    }
}

/// Sleep for `duration` unless `cancel` fires first.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    until_cancelled(cancel, tokio::time::sleep(duration)).await
}

/// Drive `future` to completion unless `cancel` fires first, in which case
/// the future is dropped unfinished.
pub async fn until_cancelled<F: Future>(cancel: &CancellationToken, future: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EmperorError::Cancelled),
        output = future => Ok(output),
    }
}
