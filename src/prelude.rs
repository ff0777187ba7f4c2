//! Convenient re-exports for common deadline-retry types.
pub use crate::{
    backoff::ExponentialBackoff,
    context::{Context, ExecutionContext},
    error::{ConfigError, ContextError, RetryError},
    retry::{retry, ExponentialRetry, RetryConfig, RetryLayer, WithContext},
    sleeper::{Sleeper, TokioSleeper},
};
