//! Exponential backoff used between retry attempts.
//!
//! Attempt semantics: attempt index `0` is the wait after the first failed call, so the
//! sequence is `base`, `2 * base`, `4 * base`, ... There is no jitter and no ceiling.
//! Arithmetic that would overflow saturates to `Duration::MAX`.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use deadline_retry::ExponentialBackoff;
//!
//! let backoff = ExponentialBackoff::new(Duration::from_millis(5)).unwrap();
//! assert_eq!(backoff.delay(0), Duration::from_millis(5));
//! assert_eq!(backoff.delay(1), Duration::from_millis(10));
//! assert_eq!(backoff.delay(3), Duration::from_millis(40));
//! ```

use std::fmt;
use std::time::Duration;

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffError {
    BaseMustBePositive,
}

impl fmt::Display for BackoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffError::BaseMustBePositive => write!(f, "base backoff must be greater than zero"),
        }
    }
}

impl std::error::Error for BackoffError {}

/// Doubling backoff: `base * 2^attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
}

impl ExponentialBackoff {
    /// Create an exponential backoff. `base` must be non-zero.
    pub fn new(base: Duration) -> Result<Self, BackoffError> {
        if base.is_zero() {
            return Err(BackoffError::BaseMustBePositive);
        }
        Ok(Self { base })
    }

    /// The wait after the first failure.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Delay to wait after the failed attempt with 0-based index `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        1u128
            .checked_shl(attempt)
            .and_then(|multiplier| self.base.as_nanos().checked_mul(multiplier))
            .and_then(duration_from_nanos)
            .unwrap_or(Duration::MAX)
    }

    /// Iterate the delays for attempts `0, 1, 2, ...`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..=u32::MAX).map(move |attempt| self.delay(attempt))
    }
}

fn duration_from_nanos(nanos: u128) -> Option<Duration> {
    let secs = u64::try_from(nanos / 1_000_000_000).ok()?;
    Some(Duration::new(secs, (nanos % 1_000_000_000) as u32))
}
