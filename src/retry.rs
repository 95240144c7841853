//! Bounded retry-with-timeout and readiness-polling primitives.
//!
//! Every payment-gateway bootstrap step (SDK readiness, card creation, mount
//! attach) runs through these two helpers instead of carrying its own ad hoc
//! loop, so the bounds live in one place and tests can shrink them.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounds for an operation that is attempted several times, each attempt
/// raced against a per-attempt timeout, with a fixed delay between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, attempt_timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            max_attempts,
            attempt_timeout,
            retry_delay,
        }
    }
}

/// Terminal outcome of an exhausted [`RetryPolicy`].
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("{operation} timed out after {attempts} attempt(s)")]
    TimedOut { operation: String, attempts: u32 },

    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    Failed {
        operation: String,
        attempts: u32,
        #[source]
        source: E,
    },
}

impl RetryPolicy {
    /// Run `attempt` until it succeeds or the policy is exhausted. The last
    /// failure (error or timeout) decides the terminal variant.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        debug_assert!(self.max_attempts > 0);
        let mut last_error: Option<E> = None;

        for n in 1..=self.max_attempts {
            match tokio::time::timeout(self.attempt_timeout, attempt()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => {
                    warn!(operation, attempt = n, error = %err, "attempt failed");
                    last_error = Some(err);
                }
                Err(_elapsed) => {
                    warn!(operation, attempt = n, "attempt timed out");
                    last_error = None;
                }
            }
            if n < self.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        match last_error {
            Some(source) => Err(RetryError::Failed {
                operation: operation.to_string(),
                attempts: self.max_attempts,
                source,
            }),
            None => Err(RetryError::TimedOut {
                operation: operation.to_string(),
                attempts: self.max_attempts,
            }),
        }
    }
}

/// Bounds for polling a boolean readiness probe at a fixed interval.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{operation} was not ready after {attempts} probe(s)")]
pub struct PollTimedOut {
    pub operation: String,
    pub attempts: u32,
}

impl PollPolicy {
    /// Probe until ready or the attempt budget runs out.
    pub async fn wait_until<F, Fut>(&self, operation: &str, mut probe: F) -> Result<(), PollTimedOut>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for n in 1..=self.max_attempts {
            if probe().await {
                return Ok(());
            }
            if n < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }
        Err(PollTimedOut {
            operation: operation.to_string(),
            attempts: self.max_attempts,
        })
    }
}
