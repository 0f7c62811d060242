//! Bounded retry of fallible API calls.
//!
//! A [`Retrier`] re-issues an operation while its failures classify as
//! retryable, waiting `base_delay * attempt` between attempts. Attempts run
//! strictly one after another.
//!
//! The wrapped operation must be idempotent. Nothing here fences repeated
//! side effects, so wrapping a non-idempotent POST can apply it twice.

pub mod sleeper;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{classify, ErrorKind, RawFailure};

pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};

/// How many times to attempt a call and how long to wait in between.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    /// Delay unit in milliseconds; the wait after attempt `n` is `n` units.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(1, 0)
    }

    /// Sets the maximum number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay_ms = u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The wait after the given failed attempt (1-based): `base_delay_ms * attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }

    /// Whether a failure of `kind` on `attempt` (1-based) earns another attempt.
    pub fn should_retry(&self, attempt: u32, kind: ErrorKind) -> bool {
        kind.is_retryable() && attempt < self.max_attempts
    }
}

/// Drives an operation through a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Retrier<S = TokioSleeper> {
    policy: RetryPolicy,
    sleeper: S,
}

impl Retrier<TokioSleeper> {
    /// Creates a retrier that waits on the tokio timer.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: TokioSleeper,
        }
    }
}

impl<S: Sleeper> Retrier<S> {
    /// Creates a retrier with a custom sleeper.
    pub fn with_sleeper(policy: RetryPolicy, sleeper: S) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable kind, or
    /// runs out of attempts. The error returned is the last attempt's failure.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, RawFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RawFailure>>,
    {
        let mut attempt: u32 = 1;
        loop {
            let failure = match operation().await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            let kind = classify(&failure);
            if !self.policy.should_retry(attempt, kind) {
                debug!(
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    kind = %kind,
                    "giving up on request"
                );
                return Err(failure);
            }

            let delay = self.policy.delay_for(attempt);
            debug!(
                attempt,
                kind = %kind,
                delay_ms = delay.as_millis() as u64,
                "retrying request after backoff"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Runs `operation` under `policy`, waiting on the tokio timer between attempts.
pub async fn retry<T, F, Fut>(operation: F, policy: &RetryPolicy) -> Result<T, RawFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RawFailure>>,
{
    Retrier::new(policy.clone()).run(operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting_op(
        calls: Arc<AtomicU32>,
        fail_until: u32,
        failure: RawFailure,
    ) -> impl FnMut() -> std::future::Ready<Result<u32, RawFailure>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < fail_until {
                std::future::ready(Err(failure.clone()))
            } else {
                std::future::ready(Ok(n))
            }
        }
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 1000);
    }

    #[test]
    fn test_retry_policy_new_clamps_attempts() {
        assert_eq!(RetryPolicy::new(0, 100).max_attempts, 1);
        assert_eq!(RetryPolicy::default().with_max_attempts(0).max_attempts, 1);
    }

    #[test]
    fn test_delay_is_linear_in_attempt() {
        let policy = RetryPolicy::new(5, 1000);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
        assert_eq!(policy.delay_for(4), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::new(5, u64::MAX);
        assert_eq!(policy.delay_for(2), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_with_base_delay() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(250));
        assert_eq!(policy.base_delay_ms, 250);
    }

    #[test]
    fn test_should_retry_respects_max_attempts() {
        let policy = RetryPolicy::new(3, 10);
        assert!(policy.should_retry(1, ErrorKind::Server));
        assert!(policy.should_retry(2, ErrorKind::Network));
        assert!(!policy.should_retry(3, ErrorKind::Timeout));
    }

    #[test]
    fn test_should_retry_rejects_non_retryable_kinds() {
        let policy = RetryPolicy::new(10, 10);
        for kind in [
            ErrorKind::Auth,
            ErrorKind::Validation,
            ErrorKind::NotFound,
            ErrorKind::Unknown,
        ] {
            assert!(!policy.should_retry(1, kind), "{:?}", kind);
        }
    }

    #[test]
    fn test_policy_deserialize_with_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 5}"#).unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay_ms, 1000);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let sleeper = RecordingSleeper::new();
        let retrier = Retrier::with_sleeper(RetryPolicy::default(), sleeper.clone());
        let calls = Arc::new(AtomicU32::new(0));

        let result = retrier
            .run(counting_op(calls.clone(), 1, RawFailure::status(500)))
            .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_server_errors_retried_until_success() {
        let sleeper = RecordingSleeper::new();
        let retrier = Retrier::with_sleeper(RetryPolicy::new(3, 1000), sleeper.clone());
        let calls = Arc::new(AtomicU32::new(0));

        let result = retrier
            .run(counting_op(calls.clone(), 3, RawFailure::status(503)))
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn test_validation_error_not_retried() {
        let sleeper = RecordingSleeper::new();
        let retrier = Retrier::with_sleeper(RetryPolicy::new(3, 1000), sleeper.clone());
        let calls = Arc::new(AtomicU32::new(0));

        let result = retrier
            .run(counting_op(calls.clone(), u32::MAX, RawFailure::status(422)))
            .await;

        assert_eq!(result, Err(RawFailure::status(422)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let sleeper = RecordingSleeper::new();
        let retrier = Retrier::with_sleeper(RetryPolicy::no_retry(), sleeper.clone());
        let calls = Arc::new(AtomicU32::new(0));

        let result = retrier
            .run(counting_op(calls.clone(), u32::MAX, RawFailure::unreachable("down")))
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_failure_not_retried() {
        let sleeper = RecordingSleeper::new();
        let retrier = Retrier::with_sleeper(RetryPolicy::new(4, 10), sleeper.clone());
        let calls = Arc::new(AtomicU32::new(0));

        let result = tokio_test::block_on(retrier.run(counting_op(
            calls.clone(),
            u32::MAX,
            RawFailure::other("invalid JSON in response body"),
        )));

        assert!(matches!(result, Err(RawFailure::Other { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sleeper.total(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_on_tokio_timer() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let result = retry(
            counting_op(calls.clone(), 3, RawFailure::timed_out("slow")),
            &RetryPolicy::new(3, 500),
        )
        .await;

        assert_eq!(result, Ok(3));
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }
}
