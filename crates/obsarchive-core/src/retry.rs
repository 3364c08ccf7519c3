//! Bounded retry with a fixed backoff.
//!
//! One combinator serves both the staging daemon and object storage calls:
//! the caller supplies the operation, a policy, a predicate deciding which
//! errors are worth another attempt, and the shutdown token.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, ErrorKind};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Build a policy from an attempt count and a backoff in seconds.
    pub fn new(max_attempts: u32, backoff_seconds: u64) -> Self {
        Self {
            max_attempts,
            backoff: Duration::from_secs(backoff_seconds),
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Outcome of a retried operation that did not succeed.
#[derive(Debug, Error)]
pub enum RetryError<E: fmt::Display> {
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last: E,
    },
    /// Shutdown was requested before the operation could succeed.
    #[error("cancelled before completion")]
    Cancelled,
    /// The operation failed with an error the predicate rejected.
    #[error("{0}")]
    Fatal(E),
}

/// Run `op` until it succeeds, fails fatally, runs out of attempts, or
/// `cancel` fires.
///
/// The token is checked before every attempt and during each backoff pause.
/// An in-flight attempt is never interrupted. `op` receives the 1-based
/// attempt number.
pub async fn retry<T, E, F, Fut, P>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    is_retryable: P,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max = policy.attempts();
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable(&err) => return Err(RetryError::Fatal(err)),
            Err(err) if attempt >= max => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }
            Err(err) => {
                tracing::warn!(attempt, max_attempts = max, "Attempt failed, retrying: {}", err);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(policy.backoff) => {}
        }
        attempt += 1;
    }
}

impl From<RetryError<AppError>> for AppError {
    fn from(err: RetryError<AppError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => AppError::new(
                if last.kind == ErrorKind::ServiceUnavailable {
                    ErrorKind::ExternalService
                } else {
                    last.kind
                },
                format!("Gave up after {attempts} attempts: {}", last.message),
            ),
            RetryError::Cancelled => AppError::cancelled("Operation cancelled by shutdown"),
            RetryError::Fatal(e) => e,
        }
    }
}
