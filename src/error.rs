//! Error types for the retry primitive and its execution context.
use std::fmt;

/// Why an execution context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ContextError {
    /// The context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    /// The context was cancelled explicitly (or through a parent).
    #[error("context canceled")]
    Canceled,
}

impl ContextError {
    /// Check if the context expired because its deadline passed.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }

    /// Check if the context was cancelled for a reason other than its deadline.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Caller misuse detected before the first attempt. Never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The context handed to the retry loop carries no deadline.
    #[error("no deadline set by caller")]
    NoDeadline,
    /// The base backoff was zero.
    #[error("base backoff must be greater than zero")]
    ZeroBaseBackoff,
}

/// Outcome of a failed retry invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The call was misconfigured; the operation never ran.
    Config(ConfigError),
    /// The last attempt failed and the budget is spent; carries that attempt's error.
    Operation(E),
    /// The context fired while waiting between attempts.
    Cancelled(ContextError),
    /// The attempt loop ended without a verdict. Indicates a logic bug.
    Exhausted,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{}", e),
            Self::Operation(e) => write!(f, "{}", e),
            Self::Cancelled(e) => write!(f, "{}", e),
            Self::Exhausted => write!(f, "retry failed"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Operation(e) => Some(e),
            Self::Cancelled(e) => Some(e),
            Self::Exhausted => None,
        }
    }
}

impl<E> From<ConfigError> for RetryError<E> {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl<E> From<ContextError> for RetryError<E> {
    fn from(err: ContextError) -> Self {
        Self::Cancelled(err)
    }
}

impl<E> RetryError<E> {
    /// Check if the call was rejected before any attempt.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is the operation's own error.
    pub fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_))
    }

    /// Check if the context fired during a backoff wait.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Check if the context's deadline cut the loop short.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::Cancelled(ContextError::DeadlineExceeded))
    }

    /// Check if the context was cancelled explicitly.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Cancelled(ContextError::Canceled))
    }

    /// Get the operation error if this is an `Operation` variant.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Borrow the operation error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Access the configuration error if present.
    pub fn config_error(&self) -> Option<ConfigError> {
        match self {
            Self::Config(e) => Some(*e),
            _ => None,
        }
    }

    /// Access the context error if present.
    pub fn context_error(&self) -> Option<ContextError> {
        match self {
            Self::Cancelled(e) => Some(*e),
            _ => None,
        }
    }

    /// Transform the operation error, leaving other variants untouched.
    pub fn map_inner<F, U>(self, f: F) -> RetryError<U>
    where
        F: FnOnce(E) -> U,
    {
        match self {
            Self::Config(e) => RetryError::Config(e),
            Self::Operation(e) => RetryError::Operation(f(e)),
            Self::Cancelled(e) => RetryError::Cancelled(e),
            Self::Exhausted => RetryError::Exhausted,
        }
    }
}
