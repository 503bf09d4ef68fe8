use reqwest::Client;
use std::{fmt::Display, future::Future, time::Duration};
use tokio::time::sleep;
use tracing::warn;

pub fn build_client() -> Client {
    let timeout = std::env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(15);
    let connect = std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5);
    Client::builder()
        .timeout(Duration::from_secs(timeout))
        .connect_timeout(Duration::from_secs(connect))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Fixed-delay retry: `attempts` counts the first try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

#[derive(Debug)]
pub struct RetryError<E> {
    pub last: E,
    pub attempts: u32,
}

/// Runs `op` until it succeeds or the policy's attempts are used up,
/// sleeping `policy.delay` between attempts. The last error is returned.
pub async fn retry<T, E, F, Fut>(
    policy: RetryPolicy,
    label: &'static str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                warn!(
                    target = "wb.http",
                    op = label,
                    attempt,
                    max_attempts = attempts,
                    error = %err,
                    "attempt_failed_retrying"
                );
                sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => {
                warn!(target = "wb.http", op = label, attempt, error = %err, "retries_exhausted");
                return Err(RetryError {
                    last: err,
                    attempts: attempt,
                });
            }
        }
    }
}
