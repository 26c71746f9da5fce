use crate::ephemeris::types::{PositionRequest, ProviderChart};
use crate::error::ProviderError;
use async_trait::async_trait;
use log::warn;
use std::time::Duration;

/// Source of raw planetary positions.
#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn positions(&self, request: &PositionRequest) -> Result<ProviderChart, ProviderError>;
}

/// Per-attempt timeout and bounded exponential backoff for provider calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1` (attempts count from 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Call `provider` under `policy`, retrying timeouts and errors.
///
/// Returns [`ProviderError::Unavailable`] carrying the last failure once the
/// attempts are exhausted.
pub async fn fetch_with_retry(
    provider: &dyn PositionProvider,
    request: &PositionRequest,
    policy: &RetryPolicy,
) -> Result<ProviderChart, ProviderError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let pending = provider.positions(request);
        let outcome = match tokio::time::timeout(policy.timeout, pending).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                timeout_ms: policy.timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(chart) => return Ok(chart),
            Err(err) => {
                if attempt < attempts {
                    let delay = policy.backoff(attempt);
                    warn!(
                        "Position provider attempt {}/{} failed for {}: {}; retrying in {:?}",
                        attempt, attempts, request.timestamp, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(err);
            }
        }
    }

    Err(ProviderError::Unavailable {
        attempts,
        message: last_error.map(|err| err.to_string()).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(1),
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(30), Duration::from_millis(350));
    }
}
