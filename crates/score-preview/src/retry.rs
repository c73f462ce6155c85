//! Retry policy for transient origin failures.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::types::PageOutcome;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// How many times to try a fetch and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// One try, no retry.
    pub const fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    /// A single retry after [`DEFAULT_RETRY_DELAY`].
    fn default() -> Self {
        Self::new(2, DEFAULT_RETRY_DELAY)
    }
}

/// Run `op` until it returns something other than [`PageOutcome::Transient`]
/// or the policy is exhausted.
///
/// Returns the last outcome and the number of attempts made. `Found` and
/// `Missing` are final on the first try.
pub async fn retry_transient<F, Fut>(policy: &RetryPolicy, mut op: F) -> (PageOutcome, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PageOutcome>,
{
    let max = policy.max_attempts.max(1);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let outcome = op().await;
        match outcome {
            PageOutcome::Transient(ref cause) if attempts < max => {
                debug!("transient failure (attempt {attempts}/{max}): {cause}");
                tokio::time::sleep(policy.delay).await;
            }
            other => return (other, attempts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn found() -> PageOutcome {
        PageOutcome::Found {
            bytes: vec![1],
            url: "u".to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let (outcome, attempts) = retry_transient(&RetryPolicy::default(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            found()
        })
        .await;
        assert!(outcome.is_found());
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_is_not_retried() {
        let (outcome, attempts) =
            retry_transient(&RetryPolicy::default(), || async { PageOutcome::Missing }).await;
        assert_eq!(outcome, PageOutcome::Missing);
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let (outcome, attempts) = retry_transient(&policy, || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                PageOutcome::Transient("reset".to_string())
            } else {
                found()
            }
        })
        .await;
        assert!(outcome.is_found());
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_transient_exhausts_policy() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let (outcome, attempts) = retry_transient(&policy, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            PageOutcome::Transient("timeout".to_string())
        })
        .await;
        assert!(outcome.is_transient());
        assert_eq!(attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        let (_, attempts) =
            retry_transient(&policy, || async { PageOutcome::Transient("x".into()) }).await;
        assert_eq!(attempts, 1);
    }
}
