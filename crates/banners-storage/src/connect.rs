//! Initial-connection retry shared by the store drivers.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Capped exponential backoff with a bounded total wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRetry {
    /// Delay before the second attempt.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for a single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Give up once this much time has passed since the first attempt.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_max_wait_ms() -> u64 {
    60_000
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

impl ConnectRetry {
    /// Delay after `attempt` failures (1-based), doubled each time and capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(
            self.initial_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

/// Runs `connect` until it succeeds or the policy's total wait is exhausted.
///
/// The last error is returned once the next delay would cross `max_wait_ms`.
pub async fn connect_with_backoff<T, E, F, Fut>(
    target: &str,
    policy: ConnectRetry,
    mut connect: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let deadline = Duration::from_millis(policy.max_wait_ms);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match connect().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(target, attempt, "connected after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                if started.elapsed() + delay > deadline {
                    tracing::error!(target, attempt, error = %e, "giving up connecting");
                    return Err(e);
                }
                tracing::warn!(
                    target,
                    attempt,
                    error = %e,
                    backoff_ms = delay.as_millis() as u64,
                    "connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
