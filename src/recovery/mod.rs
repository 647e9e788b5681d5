pub mod error;
pub mod executor;

pub use error::{AnalysisError, BoxError, ErrorKind, RateLimited, RetryPolicy, Severity};
pub use executor::{RecoveryExecutor, RecoveryMetadata, RecoveryOutcome};
