use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use configs::StoreConfig;

use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    enabled: bool,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        backoff_base: Duration,
        backoff_max: Duration,
        enabled: bool,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            backoff_max,
            enabled,
        }
    }

    /// `max_retries` counts extra attempts after the first one; zero disables retrying.
    pub fn from_config(cfg: &StoreConfig) -> Self {
        Self::new(
            cfg.max_retries.saturating_add(1),
            cfg.backoff_base(),
            cfg.backoff_max(),
            cfg.max_retries > 0,
        )
    }

    /// Single attempt, no waiting.
    pub fn disabled() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts
        } else {
            1
        }
    }

    /// Exponential backoff capped at `backoff_max`. Attempt 0 never waits.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if !self.enabled || attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(attempt - 1);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }

    pub async fn wait_before_retry(&self, attempt: u32) {
        let backoff = self.backoff_for(attempt);
        if backoff.is_zero() {
            return;
        }
        debug!(?backoff, attempt, "retrying store command");
        sleep(backoff).await;
    }

    pub fn should_retry(&self, attempt: u32, error: &ServiceError) -> bool {
        if !self.enabled {
            return false;
        }
        if attempt >= self.max_attempts {
            debug!(max_attempts = self.max_attempts, "max retry attempts reached");
            return false;
        }
        if error.is_retryable() {
            true
        } else {
            debug!(%error, "error is not retryable");
            false
        }
    }
}

pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            policy.wait_before_retry(attempt).await;
        }
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(retries = attempt, "store command succeeded after retries");
                }
                return Ok(result);
            }
            Err(error) => {
                warn!(attempt = attempt + 1, %error, "store command failed");
                if policy.should_retry(attempt + 1, &error) {
                    attempt += 1;
                    continue;
                }
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(max_attempts: u32, enabled: bool) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(4), enabled)
    }

    fn transient() -> ServiceError {
        ServiceError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe"))
    }

    #[tokio::test]
    async fn success_first_try() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let result = retry_with_policy(&policy(3, true), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<i32, ServiceError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_after_transient_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let result = retry_with_policy(&policy(3, true), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_max_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let result: Result<(), _> = retry_with_policy(&policy(2, true), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn server_errors_are_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let result: Result<(), _> = retry_with_policy(&policy(5, true), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::Server("ERR syntax error".into()))
            }
        })
        .await;
        assert!(matches!(result, Err(ServiceError::Server(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_policy_tries_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let result: Result<(), _> = retry_with_policy(&RetryPolicy::disabled(), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::new(10, Duration::from_millis(10), Duration::from_millis(35), true);
        assert_eq!(p.backoff_for(0), Duration::ZERO);
        assert_eq!(p.backoff_for(1), Duration::from_millis(10));
        assert_eq!(p.backoff_for(2), Duration::from_millis(20));
        assert_eq!(p.backoff_for(3), Duration::from_millis(35));
        assert_eq!(p.backoff_for(30), Duration::from_millis(35));
    }

    #[test]
    fn config_retries_are_extra_attempts() {
        let cfg = StoreConfig { max_retries: 3, ..StoreConfig::default() };
        assert_eq!(RetryPolicy::from_config(&cfg).max_attempts(), 4);
        let cfg = StoreConfig { max_retries: 0, ..StoreConfig::default() };
        assert_eq!(RetryPolicy::from_config(&cfg).max_attempts(), 1);
    }
}
