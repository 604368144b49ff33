//! Fixed-delay bounded retry.

use log::warn;
use std::time::Duration;

/// Attempt budget and the pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Final error after every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Runs `op` until it succeeds or the policy's attempts are used up.
///
/// `op` receives the 1-based attempt number. Sleeps only between attempts,
/// yielding to other tasks while waiting. Returns the successful value and
/// the attempt it took.
pub async fn retry_fixed<T, E, F>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<(T, u32), RetryExhausted<E>>
where
    F: FnMut(u32) -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok((value, attempt)),
            Err(err) => {
                warn!(
                    "event=retry_attempt module=reminder op={label} status=error attempt={attempt} max_attempts={} error={err}",
                    policy.max_attempts
                );
                if attempt >= policy.max_attempts {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
            }
        }
        tokio::time::sleep(policy.delay).await;
        attempt += 1;
    }
}
