//! Convergence primitives for pushing desired configuration to a node.
//!
//! This library provides the pieces an apply loop needs to converge a node
//! onto a desired configuration:
//!
//! - **Failure classification**: every failed attempt is either retryable or
//!   permanent; permanent failures stop the loop immediately.
//! - **Deadline-bounded retry**: retryable failures are retried with
//!   exponential backoff until an absolute deadline. There is no attempt cap.
//! - **Config digests**: stable, loggable fingerprints of sensitive documents.
//!
//! # Invariants
//!
//! - No attempt starts once the deadline has passed
//! - An in-flight attempt is cut off at the deadline
//! - Backoff sleeps never extend past the deadline

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Base delay before the second attempt.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Upper bound on any single backoff delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(10);

/// Outcome of a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure<E> {
    /// Transient failure; try again if time remains.
    Retryable(E),

    /// The request itself is wrong; retrying cannot help.
    Permanent(E),
}

impl<E> Failure<E> {
    /// Returns true if the failure may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Error returned by [`retry_until`].
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// An attempt failed permanently.
    #[error("{0}")]
    Permanent(#[source] E),

    /// The deadline passed before any attempt succeeded.
    #[error("timeout after {elapsed:?} and {attempts} attempt(s){}", last_suffix(.last))]
    DeadlineExceeded {
        elapsed: Duration,
        attempts: u32,
        last: Option<E>,
    },
}

impl<E> RetryError<E> {
    /// Returns true if the loop gave up because time ran out.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }

    /// Number of attempts made, when known.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Permanent(_) => None,
            Self::DeadlineExceeded { attempts, .. } => Some(*attempts),
        }
    }
}

fn last_suffix<E: fmt::Display>(last: &Option<E>) -> String {
    match last {
        Some(last) => format!(", last error: {last}"),
        None => String::new(),
    }
}

/// Exponential backoff configuration.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub base: Duration,

    /// Maximum delay.
    pub max: Duration,

    /// Jitter factor (0.0 to 1.0).
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            max: DEFAULT_BACKOFF_MAX,
            jitter: 0.1,
        }
    }
}

impl BackoffPolicy {
    /// A policy without jitter, for reproducible schedules.
    pub fn fixed(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter: 0.0,
        }
    }

    /// Calculate the delay after `failures` consecutive failures (0-based).
    pub fn delay(&self, failures: u32) -> Duration {
        let delay = self.base.as_millis() as f64 * 2.0_f64.powi(failures.min(30) as i32);
        let delay = delay.min(self.max.as_millis() as f64);

        let jitter = rand_jitter(delay * self.jitter);
        let final_delay = (delay + jitter).clamp(0.0, self.max.as_millis() as f64);

        Duration::from_millis(final_delay as u64)
    }
}

fn rand_jitter(range: f64) -> f64 {
    if range <= 0.0 {
        return 0.0;
    }
    rand::rng().random_range(-range..=range)
}

/// Run `op` until it succeeds, fails permanently, or `deadline` passes.
///
/// `op` receives the 1-based attempt number. Retryable failures are followed
/// by a backoff sleep that is truncated at the deadline; the deadline error
/// carries the last retryable failure.
pub async fn retry_until<T, E, F, Fut>(
    deadline: Instant,
    backoff: &BackoffPolicy,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Failure<E>>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;
    let mut last = None;

    loop {
        if Instant::now() >= deadline {
            return Err(RetryError::DeadlineExceeded {
                elapsed: started.elapsed(),
                attempts,
                last,
            });
        }

        attempts += 1;

        match tokio::time::timeout_at(deadline, op(attempts)).await {
            Ok(Ok(value)) => {
                debug!(attempts, "Attempt succeeded");
                return Ok(value);
            }
            Ok(Err(Failure::Permanent(e))) => {
                warn!(attempt = attempts, error = %e, "Attempt failed permanently");
                return Err(RetryError::Permanent(e));
            }
            Ok(Err(Failure::Retryable(e))) => {
                warn!(attempt = attempts, error = %e, "Attempt failed, will retry");
                last = Some(e);
            }
            Err(_) => {
                warn!(attempt = attempts, "Attempt cut off by deadline");
                return Err(RetryError::DeadlineExceeded {
                    elapsed: started.elapsed(),
                    attempts,
                    last,
                });
            }
        }

        let wake = (Instant::now() + backoff.delay(attempts - 1)).min(deadline);
        tokio::time::sleep_until(wake).await;
    }
}

/// Fingerprint of a configuration document.
///
/// Used in logs in place of the (sensitive) document itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigDigest(String);

impl ConfigDigest {
    /// Compute a digest over raw document bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let result = hasher.finalize();
        Self(format!("sha256:{}", hex::encode(&result[..16]))) // First 16 bytes (128 bits)
    }

    /// Get the digest string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
