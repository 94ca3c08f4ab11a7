use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How often and how patiently a request is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: usize,
    /// Delay before the first retry; doubles after each failure.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 2,
            delay: Duration::from_millis(500),
        }
    }
}

/// Runs `operation` until it succeeds or the policy's retries are used up,
/// returning the last error.
pub async fn with_retry<F, Fut, T, E>(mut operation: F, policy: RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    let mut delay = policy.delay;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) if attempt > policy.retries => return Err(err),
            Err(err) => {
                debug!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempt,
                    policy.retries + 1,
                    err,
                    delay
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}
