//! Failure taxonomy for the analysis pipeline.
//!
//! Every failure belongs to one closed [`ErrorKind`]; the kind carries an
//! intrinsic [`Severity`] and the [`RetryPolicy`] recovery applies to it.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Boxed cause carried by [`AnalysisError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff: Duration::from_millis(backoff_ms),
        }
    }

    /// Pause before retrying after the given 1-based failed attempt:
    /// `backoff × 2^(attempt − 1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << exponent)
    }

    pub fn is_retryable(&self) -> bool {
        self.max_attempts > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Initialization,
    Embedding,
    VectorStore,
    Cache,
    Analysis,
    /// Provider asked us to slow down; retried once after `retry_after`.
    RateLimited { retry_after: Duration },
}

impl ErrorKind {
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::Initialization => Severity::High,
            ErrorKind::Embedding | ErrorKind::VectorStore | ErrorKind::Analysis => {
                Severity::Medium
            }
            ErrorKind::Cache | ErrorKind::RateLimited { .. } => Severity::Low,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        match self {
            ErrorKind::Initialization => RetryPolicy::new(3, 1000),
            ErrorKind::Embedding => RetryPolicy::new(5, 500),
            ErrorKind::VectorStore => RetryPolicy::new(3, 1000),
            ErrorKind::Cache => RetryPolicy::new(2, 200),
            ErrorKind::Analysis => RetryPolicy::new(3, 500),
            ErrorKind::RateLimited { retry_after } => RetryPolicy {
                max_attempts: 1,
                backoff: *retry_after,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Initialization => "initialization",
            ErrorKind::Embedding => "embedding",
            ErrorKind::VectorStore => "vector_store",
            ErrorKind::Cache => "cache",
            ErrorKind::Analysis => "analysis",
            ErrorKind::RateLimited { .. } => "rate_limited",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by providers (inside `anyhow::Error`) to request a slower retry.
#[derive(Debug, Clone, Copy, Error)]
#[error("rate limited, retry after {retry_after:?}")]
pub struct RateLimited {
    pub retry_after: Duration,
}

/// Error surfaced to callers of the analysis pipeline.
///
/// Each variant names the failed stage and keeps the original cause as its
/// `source`, so the full chain is available through
/// [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("initialization failed after {attempts} attempt(s): {source}")]
    Initialization {
        attempts: u32,
        #[source]
        source: BoxError,
    },

    #[error("embedding generation failed after {attempts} attempt(s): {source}")]
    Embedding {
        attempts: u32,
        #[source]
        source: BoxError,
    },

    #[error("vector store query failed after {attempts} attempt(s): {source}")]
    VectorStore {
        attempts: u32,
        #[source]
        source: BoxError,
    },

    #[error("sentiment cache failed: {source}")]
    Cache {
        #[source]
        source: BoxError,
    },

    #[error("analysis failed: {source}")]
    Analysis {
        #[source]
        source: BoxError,
    },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
}

impl AnalysisError {
    /// Wrap a failed stage as the error variant for `kind`.
    pub fn from_kind(kind: ErrorKind, attempts: u32, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        match kind {
            ErrorKind::Initialization => AnalysisError::Initialization { attempts, source },
            ErrorKind::Embedding => AnalysisError::Embedding { attempts, source },
            ErrorKind::VectorStore => AnalysisError::VectorStore { attempts, source },
            ErrorKind::Cache => AnalysisError::Cache { source },
            ErrorKind::Analysis => AnalysisError::Analysis { source },
            ErrorKind::RateLimited { retry_after } => AnalysisError::RateLimited { retry_after },
        }
    }

    pub fn analysis(source: impl Into<BoxError>) -> Self {
        AnalysisError::Analysis {
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Initialization { .. } => ErrorKind::Initialization,
            AnalysisError::Embedding { .. } => ErrorKind::Embedding,
            AnalysisError::VectorStore { .. } => ErrorKind::VectorStore,
            AnalysisError::Cache { .. } => ErrorKind::Cache,
            AnalysisError::Analysis { .. } => ErrorKind::Analysis,
            AnalysisError::RateLimited { retry_after } => ErrorKind::RateLimited {
                retry_after: *retry_after,
            },
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    /// Attempts made before giving up, where the stage was retried.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            AnalysisError::Initialization { attempts, .. }
            | AnalysisError::Embedding { attempts, .. }
            | AnalysisError::VectorStore { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn policies_match_taxonomy_table() {
        assert_eq!(ErrorKind::Initialization.policy(), RetryPolicy::new(3, 1000));
        assert_eq!(ErrorKind::Embedding.policy(), RetryPolicy::new(5, 500));
        assert_eq!(ErrorKind::VectorStore.policy(), RetryPolicy::new(3, 1000));
        assert_eq!(ErrorKind::Cache.policy(), RetryPolicy::new(2, 200));
        assert_eq!(ErrorKind::Analysis.policy(), RetryPolicy::new(3, 500));

        let limited = ErrorKind::RateLimited {
            retry_after: Duration::from_millis(750),
        };
        assert_eq!(limited.policy(), RetryPolicy::new(1, 750));
        assert!(!limited.policy().is_retryable());
    }

    #[test]
    fn severities_match_taxonomy_table() {
        assert_eq!(ErrorKind::Initialization.severity(), Severity::High);
        assert_eq!(ErrorKind::Embedding.severity(), Severity::Medium);
        assert_eq!(ErrorKind::VectorStore.severity(), Severity::Medium);
        assert_eq!(ErrorKind::Cache.severity(), Severity::Low);
        assert_eq!(ErrorKind::Analysis.severity(), Severity::Medium);
    }

    #[test]
    fn delay_doubles_per_attempt_without_jitter() {
        let policy = RetryPolicy::new(5, 500);
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(4000));
    }

    #[test]
    fn wrapped_error_keeps_cause_chain() {
        let cause = anyhow::anyhow!("connection reset").context("embedding request");
        let err = AnalysisError::from_kind(ErrorKind::Embedding, 5, cause);

        assert_eq!(err.kind(), ErrorKind::Embedding);
        assert_eq!(err.attempts(), Some(5));
        assert!(err.to_string().contains("after 5 attempt(s)"));
        let source = err.source().expect("source");
        assert!(source.to_string().contains("embedding request"));
    }
}
