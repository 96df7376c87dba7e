//! Bounded retry with exponential backoff
//!
//! Only [`ProviderError::Transient`] failures are retried. Not-found,
//! validation and authorization errors return immediately.

use std::future::Future;
use std::time::Duration;

use keycycle_core::{ProviderError, ProviderResult};

/// Codes a create call answers with when the resource is already there
const ALREADY_EXISTS_CODES: &[&str] = &["ResourceExistsException", "EntityAlreadyExists"];

/// Retry policy for provider calls
///
/// ```rust
/// use std::time::Duration;
/// use keycycle_aws::RetryPolicy;
///
/// let policy = RetryPolicy {
///     max_retries: 2,
///     base_delay_ms: 50,
///     jitter: false,
///     ..RetryPolicy::default()
/// };
/// assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Default: 3
    pub max_retries: u32,

    /// Delay before the first retry. Default: 200 ms
    pub base_delay_ms: u64,

    /// Cap on any single delay. Default: 5,000 ms
    pub max_delay_ms: u64,

    /// Growth factor per retry. Default: 2.0
    pub multiplier: f64,

    /// Add ±25% randomness to each delay. Default: true
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), capped, without jitter
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(delay_ms.min(self.max_delay_ms as f64) as u64)
    }

    /// Apply ±25% jitter when enabled
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }

        let delay_ms = delay.as_millis() as f64;
        let range = delay_ms * 0.25;
        let jitter = if range > 0.0 {
            rand::random_range(-range..=range)
        } else {
            0.0
        };
        Duration::from_millis((delay_ms + jitter).max(0.0) as u64)
    }
}

/// Run `call` until it succeeds, fails non-transiently, or retries run out
pub async fn retry_transient<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(operation, attempt, "Call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.apply_jitter(policy.calculate_delay(attempt));
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Transient failure, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::error!(operation, attempt, error = %err, "Retries exhausted");
                }
                return Err(err);
            }
        }
    }
}

/// [`retry_transient`] for calls that create a named resource.
///
/// A transiently failed attempt may still have created the resource, so an
/// "already exists" answer on a later attempt counts as success. The same
/// answer on the first attempt is returned as an error.
pub async fn retry_create<F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> ProviderResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<()>>,
{
    let mut attempts = 0u32;
    let result = retry_transient(policy, operation, || {
        attempts += 1;
        call()
    })
    .await;

    match result {
        Err(err) if attempts > 1 && is_already_exists(&err) => {
            tracing::warn!(
                operation,
                attempts,
                error = %err,
                "Resource exists after a retried create, treating it as created"
            );
            Ok(())
        }
        other => other,
    }
}

fn is_already_exists(err: &ProviderError) -> bool {
    matches!(
        err,
        ProviderError::Failed { code: Some(code), .. } if ALREADY_EXISTS_CODES.contains(&code.as_str())
    )
}

/// Shorthand for a transient error, used by tests and adapters alike
pub fn transient(operation: &'static str, message: impl Into<String>) -> ProviderError {
    ProviderError::Transient {
        operation,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn exists(operation: &'static str) -> ProviderError {
        ProviderError::Failed {
            operation,
            code: Some("ResourceExistsException".to_string()),
            message: "secret User_alice_AccessKey already exists".to_string(),
        }
    }

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay_ms, 200);
        assert!(policy.jitter);
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }

    #[test]
    fn delay_grows_then_caps() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.calculate_delay(0), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(400));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(800));
        assert_eq!(policy.calculate_delay(10), Duration::from_millis(5_000));
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let ms = policy.apply_jitter(Duration::from_millis(1_000)).as_millis();
            assert!((750..=1_250).contains(&ms), "jittered delay {ms}ms out of range");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(&RetryPolicy::default(), "GetUser", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(transient("GetUser", "Rate exceeded"))
            } else {
                Ok("arn:aws:iam::111122223333:user/alice")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "arn:aws:iam::111122223333:user/alice");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: ProviderResult<()> =
            retry_transient(&RetryPolicy::default(), "GetUser", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient("GetUser", "Rate exceeded"))
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn create_that_landed_before_a_transient_failure_succeeds() {
        // GIVEN a create whose first response is lost and whose retry
        // finds the resource already there
        let calls = AtomicU32::new(0);

        // WHEN
        let result = retry_create(&RetryPolicy::default(), "CreateSecret", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(transient("CreateSecret", "connection reset"))
            } else {
                Err(exists("CreateSecret"))
            }
        })
        .await;

        // THEN the resource counts as created
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn create_conflict_on_first_attempt_is_an_error() {
        let calls = AtomicU32::new(0);
        let result = retry_create(&RetryPolicy::default(), "CreateSecret", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(exists("CreateSecret"))
        })
        .await;

        assert!(matches!(
            result,
            Err(ProviderError::Failed { code: Some(ref code), .. }) if code == "ResourceExistsException"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_failing_for_other_reasons_is_not_masked() {
        let calls = AtomicU32::new(0);
        let result = retry_create(&RetryPolicy::default(), "CreateSecret", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(transient("CreateSecret", "Rate exceeded"))
            } else {
                Err(ProviderError::Failed {
                    operation: "CreateSecret",
                    code: Some("AccessDeniedException".to_string()),
                    message: "denied".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn not_found_is_never_retried() {
        let calls = AtomicU32::new(0);
        let result: ProviderResult<()> =
            retry_transient(&RetryPolicy::default(), "DescribeSecret", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::not_found("secret User_alice_AccessKey"))
            })
            .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
