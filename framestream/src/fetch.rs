//! Timeout-guarded fetch with a fixed retry-delay sequence

use crate::error::{Result, StreamError};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Retry policy for a single frame payload fetch.
///
/// One initial attempt plus one retry per delay entry; every attempt is
/// individually bounded by `attempt_timeout`. There is no overall deadline
/// beyond the sum of attempt timeouts and delays.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempt_timeout: Duration,
    pub retry_delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempt_timeout: Duration::from_millis(3000),
            retry_delays: vec![Duration::from_millis(250), Duration::from_millis(750)],
        }
    }
}

impl RetryPolicy {
    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> usize {
        self.retry_delays.len() + 1
    }
}

/// Run `op` with timeout and retries per `policy`.
///
/// A timed-out attempt counts as a failure like any transport error. After
/// the delay sequence is exhausted the last error is propagated, wrapped in
/// [`StreamError::RetryExhausted`]. Cancellation short-circuits: it is the
/// caller tearing the fetch down, so no further attempts are made.
pub async fn fetch_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0usize;
    loop {
        let error = match timeout(policy.attempt_timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if e.is_cancelled() => return Err(e),
            Ok(Err(e)) => e,
            Err(_) => StreamError::Timeout {
                ms: policy.attempt_timeout.as_millis() as u64,
            },
        };

        if attempt >= policy.retry_delays.len() {
            return Err(StreamError::RetryExhausted {
                attempts: attempt + 1,
                source: Box::new(error),
            });
        }

        log::warn!(
            "fetch attempt {}/{} failed, retrying in {:?}: {}",
            attempt + 1,
            policy.max_attempts(),
            policy.retry_delays[attempt],
            error
        );
        sleep(policy.retry_delays[attempt]).await;
        attempt += 1;
    }
}
