use std::future::Future;
use std::time::Duration;

use anyhow::Result;

use super::error::{AnalysisError, ErrorKind, RateLimited, RetryPolicy};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryMetadata {
    pub kind: ErrorKind,
    /// Every invocation of the operation, the first one included.
    pub attempts: u32,
    pub total_backoff: Duration,
}

#[derive(Debug)]
pub struct RecoveryOutcome<T> {
    pub success: bool,
    pub value: Option<T>,
    pub error: Option<anyhow::Error>,
    pub metadata: RecoveryMetadata,
}

impl<T> RecoveryOutcome<T> {
    /// Collapse into a `Result`, wrapping exhaustion as the `AnalysisError`
    /// for the call site's kind.
    pub fn into_result(self) -> std::result::Result<T, AnalysisError> {
        let attempts = self.metadata.attempts;
        match (self.value, self.error) {
            (Some(value), _) => Ok(value),
            (None, Some(err)) => Err(AnalysisError::from_kind(self.metadata.kind, attempts, err)),
            (None, None) => Err(AnalysisError::from_kind(
                self.metadata.kind,
                attempts,
                anyhow::anyhow!("operation produced neither a value nor an error"),
            )),
        }
    }
}

/// Retries a failing operation with pure exponential backoff.
#[derive(Debug, Clone, Default)]
pub struct RecoveryExecutor {
    /// Overrides every policy's base backoff; used to keep tests fast.
    backoff_override: Option<Duration>,
}

impl RecoveryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backoff_override(backoff: Duration) -> Self {
        Self {
            backoff_override: Some(backoff),
        }
    }

    fn effective_policy(&self, kind: ErrorKind) -> RetryPolicy {
        let mut policy = kind.policy();
        if let (Some(backoff), false) = (
            self.backoff_override,
            matches!(kind, ErrorKind::RateLimited { .. }),
        ) {
            policy.backoff = backoff;
        }
        policy
    }

    /// Run `op` under the policy declared for `kind`.
    ///
    /// The operation is invoked up to `max_attempts` times. After the n-th
    /// failure the executor sleeps `backoff × 2^(n−1)` before the next try.
    /// A [`RateLimited`] failure replaces the remaining budget with a single
    /// retry after the provider's requested delay.
    pub async fn execute<T, F, Fut>(&self, kind: ErrorKind, mut op: F) -> RecoveryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut policy = self.effective_policy(kind);
        let mut attempts = 0u32;
        let mut budget = policy.max_attempts.max(1);
        let mut total_backoff = Duration::ZERO;
        let mut rate_limited = false;

        loop {
            attempts += 1;
            let err = match op().await {
                Ok(value) => {
                    if attempts > 1 {
                        log_info!("{} recovered after {} attempt(s)", kind, attempts);
                    }
                    return RecoveryOutcome {
                        success: true,
                        value: Some(value),
                        error: None,
                        metadata: RecoveryMetadata {
                            kind,
                            attempts,
                            total_backoff,
                        },
                    };
                }
                Err(err) => err,
            };

            if !rate_limited {
                if let Some(limit) = err.downcast_ref::<RateLimited>() {
                    rate_limited = true;
                    policy = ErrorKind::RateLimited {
                        retry_after: limit.retry_after,
                    }
                    .policy();
                    budget = attempts + policy.max_attempts;
                    log_warn!(
                        "{} rate limited; retrying once after {:?}",
                        kind,
                        limit.retry_after
                    );
                }
            }

            if attempts >= budget {
                log_warn!(
                    "{} failed after {} attempt(s) (severity {}): {err:#}",
                    kind,
                    attempts,
                    kind.severity().as_str()
                );
                return RecoveryOutcome {
                    success: false,
                    value: None,
                    error: Some(err),
                    metadata: RecoveryMetadata {
                        kind,
                        attempts,
                        total_backoff,
                    },
                };
            }

            let delay = if rate_limited {
                policy.backoff
            } else {
                policy.delay_for(attempts)
            };
            log_warn!(
                "{} attempt {}/{} failed: {err:#}; retrying in {:?}",
                kind,
                attempts,
                budget,
                delay
            );
            total_backoff += delay;
            tokio::time::sleep(delay).await;
        }
    }

    /// [`execute`](Self::execute) collapsed into a `Result`.
    pub async fn retry<T, F, Fut>(
        &self,
        kind: ErrorKind,
        op: F,
    ) -> std::result::Result<T, AnalysisError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute(kind, op).await.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn flaky(
        failures: u32,
    ) -> (Arc<AtomicU32>, impl FnMut() -> futures::future::Ready<Result<u32>>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let op = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= failures {
                futures::future::ready(Err(anyhow::anyhow!("failure #{n}")))
            } else {
                futures::future::ready(Ok(n))
            }
        };
        (calls, op)
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_last_allowed_attempt() {
        let executor = RecoveryExecutor::new();
        let max = ErrorKind::VectorStore.policy().max_attempts;
        let (calls, op) = flaky(max - 1);

        let outcome = executor.execute(ErrorKind::VectorStore, op).await;

        assert!(outcome.success);
        assert_eq!(outcome.metadata.attempts, max);
        assert_eq!(outcome.value, Some(max));
        assert!(outcome.error.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), max);
        // 1000ms + 2000ms
        assert_eq!(outcome.metadata.total_backoff, Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_final_error_when_budget_exhausted() {
        let executor = RecoveryExecutor::new();
        let max = ErrorKind::Embedding.policy().max_attempts;
        let (calls, op) = flaky(max + 1);

        let outcome = executor.execute(ErrorKind::Embedding, op).await;

        assert!(!outcome.success);
        assert_eq!(outcome.metadata.attempts, max);
        assert_eq!(calls.load(Ordering::SeqCst), max);
        let message = outcome.error.expect("error").to_string();
        assert_eq!(message, format!("failure #{max}"));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_outcome_converts_to_typed_error() {
        let executor = RecoveryExecutor::new();
        let (_, op) = flaky(u32::MAX);

        let err = executor
            .retry(ErrorKind::Initialization, op)
            .await
            .expect_err("should fail");

        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert_eq!(err.attempts(), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_switches_to_single_retry_after_requested_delay() {
        let executor = RecoveryExecutor::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let outcome = executor
            .execute(ErrorKind::Embedding, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                futures::future::ready(Err::<(), _>(anyhow::Error::new(RateLimited {
                    retry_after: Duration::from_millis(300),
                })))
            })
            .await;

        assert!(!outcome.success);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.metadata.total_backoff, Duration::from_millis(300));
    }

    #[tokio::test]
    async fn backoff_override_applies_to_regular_kinds() {
        let executor = RecoveryExecutor::with_backoff_override(Duration::from_millis(1));
        let (_, op) = flaky(2);

        let outcome = executor.execute(ErrorKind::Cache, op).await;

        assert!(!outcome.success);
        assert_eq!(outcome.metadata.attempts, 2);
        assert_eq!(outcome.metadata.total_backoff, Duration::from_millis(1));
    }
}
