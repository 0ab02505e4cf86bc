use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::result::Result;

/// Retry schedule for requests that must eventually land, like a chunk
/// server announcing itself to its name server. Attempt budget and backoff
/// base come from the caller's configuration; the delay doubles after each
/// failed attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u8,
    initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u8, initial_backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    fn backoff_after(&self, attempt: u8) -> Duration {
        let doublings = attempt.saturating_sub(1) as u32;
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(doublings))
    }

    /// Drive `operation` until it succeeds or the attempt budget is spent,
    /// returning the last error in the latter case.
    pub async fn run<F, Fut, R>(&self, mut operation: F) -> Result<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt >= self.max_attempts {
                        warn!(error = %e, attempts = attempt, "Giving up");
                        return Err(e);
                    }
                    let backoff = self.backoff_after(attempt);
                    warn!(error = %e, attempt, ?backoff, "Attempt failed, waiting to retry");
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
