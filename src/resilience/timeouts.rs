//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap backend calls with a hard deadline
//! - Cancel the in-flight future when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Deadline expiry is folded into the call's own error type so the breaker
//!   counts it like any other failure

use std::future::Future;
use std::time::Duration;

/// Run `fut` with a deadline, mapping expiry through `on_timeout`.
///
/// The future is dropped on expiry, which releases any connection it held.
pub async fn with_deadline<T, E, Fut>(
    deadline: Duration,
    fut: Fut,
    on_timeout: impl FnOnce() -> E,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
