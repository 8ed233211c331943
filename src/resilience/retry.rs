use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::settings::RetryConfig;

/// Fixed backoff schedule: the pause after failed attempt `n` is `delays[n - 1]`,
/// the last entry repeating when attempts outnumber delays. The final attempt
/// is followed by its pause too, so a failing source is not hammered by
/// callers arriving right after exhaustion.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

impl RetrySettings {
    pub fn from_config(retry: Option<&RetryConfig>) -> Self {
        let retry = retry.cloned().unwrap_or_default();
        Self {
            attempts: retry.attempts().max(1),
            delays: retry.delays(),
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        let index = usize::try_from(attempt.saturating_sub(1)).unwrap_or(usize::MAX);
        self.delays
            .get(index)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or_default()
    }

    /// Total pause spent when every attempt fails
    pub fn total_backoff(&self) -> Duration {
        (1..=self.attempts).map(|attempt| self.delay_after(attempt)).sum()
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    /// The operation receives the 1-based attempt number.
    pub async fn run_with_retry<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts => {
                    let delay = self.delay_after(attempt);
                    warn!("Attempt {attempt}/{} failed: {e}", self.attempts);
                    info!(
                        "Retrying in {}ms (attempt {}/{})",
                        delay.as_millis(),
                        attempt + 1,
                        self.attempts
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    error!("all {attempt} attempts failed: {e}");
                    debug!("holding failure for {}ms before reporting", delay.as_millis());
                    sleep(delay).await;
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::from_config(None)
    }
}
