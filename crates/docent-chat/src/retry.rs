//! Bounded-time, bounded-attempt execution of remote calls.
//!
//! [`run_with_retry`] wraps an arbitrary async operation. Timeouts are
//! retried with exponential backoff until the attempts or the total time
//! budget run out; any other error is returned on the spot.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use docent_core::DocentConfig;

use crate::error::ChatError;

/// Headroom kept between the last backoff sleep and the total deadline.
const DEADLINE_MARGIN: Duration = Duration::from_millis(100);

/// Errors that can tell whether they were a timeout.
pub trait Retryable {
    fn is_timeout(&self) -> bool;
}

impl Retryable for ChatError {
    fn is_timeout(&self) -> bool {
        ChatError::is_timeout(self)
    }
}

/// Category of a remote call, selecting its per-attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Document search and similar lookups.
    Lookup,
    /// Language model calls.
    Conversation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Budget for all attempts and sleeps together.
    pub max_total: Duration,
    /// Budget for a single attempt.
    pub attempt_budget: Duration,
}

impl RetryPolicy {
    /// Build the policy for an operation category from configuration.
    pub fn for_kind(config: &DocentConfig, kind: OperationKind) -> Self {
        let attempt_budget = match kind {
            OperationKind::Lookup => config.search.timeout(),
            OperationKind::Conversation => config.model.timeout(),
        };
        Self {
            max_retries: config.retry.max_retries,
            base_delay: config.retry.base_delay(),
            max_total: config.retry.max_total(),
            attempt_budget,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Backoff before retry number `attempt_index + 1`: `base_delay * 2^attempt_index`.
    pub fn backoff(&self, attempt_index: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt_index.min(30)))
    }
}

/// Failure of a call run through [`run_with_retry`].
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("timed out after {attempts} attempt(s) in {elapsed:?}")]
    Timeout { attempts: u32, elapsed: Duration },
    #[error("{0}")]
    Failed(E),
}

impl<E> RetryError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RetryError::Timeout { .. })
    }
}

impl From<RetryError<ChatError>> for ChatError {
    fn from(err: RetryError<ChatError>) -> Self {
        match err {
            RetryError::Timeout { elapsed, .. } => ChatError::Timeout(elapsed),
            RetryError::Failed(e) => e,
        }
    }
}

/// Run `operation` under `policy`.
///
/// Each attempt is bounded by `min(attempt_budget, max_total - elapsed)`.
/// No attempt starts once `max_total` has elapsed.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        let elapsed = start.elapsed();
        if elapsed >= policy.max_total {
            return Err(RetryError::Timeout { attempts, elapsed });
        }
        let bound = policy.attempt_budget.min(policy.max_total - elapsed);

        attempts += 1;
        match tokio::time::timeout(bound, operation()).await {
            Ok(Ok(value)) => {
                debug!(attempts, "Operation succeeded");
                return Ok(value);
            }
            Ok(Err(e)) if !e.is_timeout() => {
                debug!(attempts, error = %e, "Operation failed, not retrying");
                return Err(RetryError::Failed(e));
            }
            Ok(Err(e)) => warn!(attempt = attempts, error = %e, "Operation timed out"),
            Err(_) => warn!(attempt = attempts, budget = ?bound, "Attempt exceeded its budget"),
        }

        let elapsed = start.elapsed();
        if attempts > policy.max_retries || elapsed >= policy.max_total {
            return Err(RetryError::Timeout { attempts, elapsed });
        }

        let remaining = policy.max_total - elapsed;
        let delay = policy
            .backoff(attempts - 1)
            .min(remaining.saturating_sub(DEADLINE_MARGIN));
        if !delay.is_zero() {
            debug!(attempt = attempts, delay = ?delay, "Backing off before retry");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn policy(max_retries: u32, attempt_secs: u64, total_secs: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_secs(1),
            max_total: Duration::from_secs(total_secs),
            attempt_budget: Duration::from_secs(attempt_secs),
        }
    }

    /// Records the (paused) clock offset of every attempt.
    fn recorder() -> (Arc<Mutex<Vec<Duration>>>, Instant) {
        (Arc::new(Mutex::new(Vec::new())), Instant::now())
    }

    // ---- Policy ----

    #[test]
    fn test_backoff_doubles() {
        let p = policy(2, 5, 60);
        assert_eq!(p.backoff(0), Duration::from_secs(1));
        assert_eq!(p.backoff(1), Duration::from_secs(2));
        assert_eq!(p.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_saturates() {
        let p = policy(2, 5, 60);
        assert!(p.backoff(u32::MAX) >= p.backoff(30));
    }

    #[test]
    fn test_policy_for_kind() {
        let config = DocentConfig::default();
        let lookup = RetryPolicy::for_kind(&config, OperationKind::Lookup);
        let conversation = RetryPolicy::for_kind(&config, OperationKind::Conversation);
        assert_eq!(lookup.attempt_budget, config.search.timeout());
        assert_eq!(conversation.attempt_budget, config.model.timeout());
        assert_eq!(lookup.max_retries, 2);
        assert_eq!(lookup.base_delay, Duration::from_secs(1));
        assert_eq!(conversation.with_max_retries(0).max_retries, 0);
    }

    // ---- Retrying timeouts ----

    #[tokio::test(start_paused = true)]
    async fn test_timeout_error_retried_three_attempts() {
        let (calls, t0) = recorder();
        let result: Result<(), _> = run_with_retry(&policy(2, 5, 60), || {
            let calls = calls.clone();
            async move {
                calls.lock().unwrap().push(t0.elapsed());
                Err(ChatError::Timeout(Duration::from_secs(5)))
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Timeout { attempts: 3, .. })));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls[1] - calls[0] >= Duration::from_secs(1));
        assert!(calls[2] - calls[1] >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operation_cut_by_attempt_budget() {
        let (calls, t0) = recorder();
        let result: Result<(), RetryError<ChatError>> = run_with_retry(&policy(2, 5, 60), || {
            let calls = calls.clone();
            async move {
                calls.lock().unwrap().push(t0.elapsed());
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Timeout { attempts: 3, .. })));
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0], Duration::ZERO);
        assert!(calls[1] >= Duration::from_secs(6));
        assert!(calls[2] >= Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_budget_stops_early() {
        let (calls, t0) = recorder();
        let result: Result<(), RetryError<ChatError>> = run_with_retry(&policy(5, 5, 8), || {
            let calls = calls.clone();
            async move {
                calls.lock().unwrap().push(t0.elapsed());
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        })
        .await;

        match result {
            Err(RetryError::Timeout { attempts, elapsed }) => {
                assert!(attempts < 6);
                assert!(elapsed <= Duration::from_secs(8));
            }
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
        assert!(t0.elapsed() <= Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_timeout() {
        let (calls, t0) = recorder();
        let result = run_with_retry(&policy(2, 5, 60), || {
            let calls = calls.clone();
            async move {
                let n = {
                    let mut calls = calls.lock().unwrap();
                    calls.push(t0.elapsed());
                    calls.len()
                };
                if n < 2 {
                    Err(ChatError::Timeout(Duration::from_secs(5)))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    // ---- Non-retryable errors ----

    #[tokio::test(start_paused = true)]
    async fn test_non_timeout_error_single_attempt() {
        let (calls, t0) = recorder();
        let result: Result<(), _> = run_with_retry(&policy(2, 5, 60), || {
            let calls = calls.clone();
            async move {
                calls.lock().unwrap().push(t0.elapsed());
                Err(ChatError::Auth("invalid api key".to_string()))
            }
        })
        .await;

        assert_eq!(calls.lock().unwrap().len(), 1);
        match result {
            Err(RetryError::Failed(ChatError::Auth(msg))) => assert_eq!(msg, "invalid api key"),
            other => panic!("expected auth failure, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_single_attempt() {
        let (calls, t0) = recorder();
        let result: Result<(), _> = run_with_retry(&policy(0, 5, 60), || {
            let calls = calls.clone();
            async move {
                calls.lock().unwrap().push(t0.elapsed());
                Err(ChatError::Timeout(Duration::from_secs(5)))
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Timeout { attempts: 1, .. })));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_retry_error_into_chat_error() {
        let err: ChatError = RetryError::<ChatError>::Timeout {
            attempts: 3,
            elapsed: Duration::from_secs(9),
        }
        .into();
        assert!(err.is_timeout());

        let err: ChatError = RetryError::Failed(ChatError::Model("boom".to_string())).into();
        assert!(matches!(err, ChatError::Model(_)));
    }
}
