//! Wait for a moved branch ref to become visible.
//!
//! The hosted API is eventually consistent: right after a ref update, reads of
//! the branch head may still return the previous commit. Only the observation
//! is retried here; the ref update itself never is.

use crate::error::SyncError;
use crate::remote::RemoteRepository;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Backoff policy for polling a branch head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefWaitPolicy {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_timeout_ms() -> u64 {
    60_000
}

impl Default for RefWaitPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RefWaitPolicy {
    /// Delay that follows `current`, capped at `max_delay_ms`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.multiplier).round();
        let capped = next_ms.clamp(0.0, self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Poll `branch` until its head equals `expected`.
///
/// Errors while reading the head are logged and polling continues; only the
/// timeout ends the wait unsuccessfully.
pub async fn wait_for_ref(
    remote: &dyn RemoteRepository,
    branch: &str,
    expected: &str,
    policy: &RefWaitPolicy,
) -> Result<(), SyncError> {
    let started = Instant::now();
    let deadline = started + policy.timeout();
    let mut delay = Duration::from_millis(policy.initial_delay_ms.max(1));
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match remote.head_commit(branch).await {
            Ok(Some(head)) if head == expected => {
                debug!(branch, expected, attempts, "Branch head caught up");
                return Ok(());
            }
            Ok(head) => {
                debug!(
                    branch,
                    expected,
                    observed = head.as_deref().unwrap_or("-"),
                    attempts,
                    "Branch head not yet updated"
                );
            }
            Err(err) => {
                warn!(branch, attempts, error = %err, "Failed to read branch head while waiting");
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(SyncError::RefPropagationTimeout {
                expected: expected.to_string(),
                waited_ms: started.elapsed().as_millis() as u64,
            });
        }
        tokio::time::sleep(std::cmp::min(delay, deadline - now)).await;
        delay = policy.next_delay(delay);
    }
}
