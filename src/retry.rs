//! Deadline-bounded exponential retry.
//!
//! Semantics:
//! - `max_retries` counts retries, so an operation runs at most `max_retries + 1` times.
//! - The context must carry a deadline; otherwise the call fails before the first attempt.
//! - Every operation error is retried until the budget is spent. The last error is handed
//!   back unchanged as `RetryError::Operation`.
//! - After failed attempt `i` the loop waits `base * 2^i`, racing the wait against the
//!   context. If the context fires first the loop stops with `RetryError::Cancelled`.
//! - The operation itself is never interrupted; cancellation is only observed while waiting.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use deadline_retry::{retry, Context, RetryError};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let ctx = Context::with_timeout(&Context::background(), Duration::from_secs(1));
//! let mut calls = 0;
//! let value = retry(&ctx, 5, Duration::from_millis(5), || {
//!     calls += 1;
//!     let outcome = if calls < 3 { Err("transient") } else { Ok(7) };
//!     async move { outcome }
//! })
//! .await;
//! assert_eq!(value, Ok(7));
//! assert_eq!(calls, 3);
//!
//! let background = Context::background();
//! let err = retry(&background, 2, Duration::from_millis(1), || async { Ok::<_, ()>(()) })
//!     .await
//!     .unwrap_err();
//! assert!(matches!(err, RetryError::Config(_)));
//! # });
//! ```

use crate::backoff::ExponentialBackoff;
use crate::context::{Context, ExecutionContext};
use crate::error::{ConfigError, ContextError, RetryError};
use crate::sleeper::{Sleeper, TokioSleeper};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;

/// Retry budget used by `ExponentialRetryBuilder::new`.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Base backoff used by `ExponentialRetryBuilder::new`.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(100);

/// Retry `operation` until it succeeds, `max_retries` retries are spent, or `ctx` fires.
///
/// Waits are real tokio sleeps. Use [`ExponentialRetry`] to plug in a different sleeper.
pub async fn retry<C, T, E, Fut, Op>(
    ctx: &C,
    max_retries: u32,
    base_backoff: Duration,
    operation: Op,
) -> Result<T, RetryError<E>>
where
    C: ExecutionContext + ?Sized,
    Fut: Future<Output = Result<T, E>>,
    Op: FnMut() -> Fut,
{
    if !ctx.has_deadline() {
        return Err(ConfigError::NoDeadline.into());
    }
    let backoff =
        ExponentialBackoff::new(base_backoff).map_err(|_| ConfigError::ZeroBaseBackoff)?;
    ExponentialRetry { max_retries, backoff, sleeper: Arc::new(TokioSleeper) }
        .execute(ctx, operation)
        .await
}

/// Plain-data tunables of an [`ExponentialRetry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait after the first failure; doubled for each later one.
    pub base_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES, base_backoff: DEFAULT_BASE_BACKOFF }
    }
}

/// Reusable retry policy: budget, backoff and sleeper.
#[derive(Debug, Clone)]
pub struct ExponentialRetry {
    max_retries: u32,
    backoff: ExponentialBackoff,
    sleeper: Arc<dyn Sleeper>,
}

impl ExponentialRetry {
    /// Construct a new builder with defaults.
    pub fn builder() -> ExponentialRetryBuilder {
        ExponentialRetryBuilder::new()
    }

    /// Build a policy from plain configuration, using the tokio sleeper.
    pub fn from_config(config: RetryConfig) -> Result<Self, BuildError> {
        ExponentialRetryBuilder::from(config).build()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        self.backoff
    }

    /// The policy's tunables as plain data.
    pub fn config(&self) -> RetryConfig {
        RetryConfig { max_retries: self.max_retries, base_backoff: self.backoff.base() }
    }

    /// Run `operation` under this policy, bounded by `ctx`.
    pub async fn execute<C, T, E, Fut, Op>(
        &self,
        ctx: &C,
        mut operation: Op,
    ) -> Result<T, RetryError<E>>
    where
        C: ExecutionContext + ?Sized,
        Fut: Future<Output = Result<T, E>>,
        Op: FnMut() -> Fut,
    {
        if !ctx.has_deadline() {
            return Err(ConfigError::NoDeadline.into());
        }

        for attempt in 0..=self.max_retries {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if attempt == self.max_retries {
                return Err(RetryError::Operation(err));
            }

            let delay = self.backoff.delay(attempt);
            tokio::select! {
                _ = self.sleeper.sleep(delay) => {}
                reason = ctx.done() => {
                    log_interrupted(reason, attempt, delay);
                    return Err(RetryError::Cancelled(reason));
                }
            }
        }

        Err(RetryError::Exhausted)
    }
}

fn log_interrupted(reason: ContextError, attempt: u32, delay: Duration) {
    let backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    match reason {
        ContextError::DeadlineExceeded => {
            tracing::info!(attempt, backoff_ms, "deadline exceeded")
        }
        ContextError::Canceled => tracing::info!(attempt, backoff_ms, "canceled"),
    }
}

/// Builder for `ExponentialRetry`.
#[derive(Debug, Clone)]
pub struct ExponentialRetryBuilder {
    max_retries: u32,
    base_backoff: Duration,
    sleeper: Arc<dyn Sleeper>,
}

/// Errors produced while building a retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// `base_backoff` must be > 0.
    ZeroBaseBackoff,
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::ZeroBaseBackoff => write!(f, "base_backoff must be > 0"),
        }
    }
}

impl std::error::Error for BuildError {}

impl ExponentialRetryBuilder {
    pub fn new() -> Self {
        Self::from(RetryConfig::default())
    }

    /// Retries after the first attempt. Zero means a single attempt.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Wait after the first failure. Must be > 0.
    pub fn base_backoff(mut self, base: Duration) -> Self {
        self.base_backoff = base;
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn build(self) -> Result<ExponentialRetry, BuildError> {
        let backoff =
            ExponentialBackoff::new(self.base_backoff).map_err(|_| BuildError::ZeroBaseBackoff)?;
        Ok(ExponentialRetry { max_retries: self.max_retries, backoff, sleeper: self.sleeper })
    }
}

impl Default for ExponentialRetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<RetryConfig> for ExponentialRetryBuilder {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_backoff: config.base_backoff,
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

/// A request paired with the context that bounds it.
#[derive(Debug, Clone)]
pub struct WithContext<R> {
    pub context: Context,
    pub request: R,
}

impl<R> WithContext<R> {
    pub fn new(context: Context, request: R) -> Self {
        Self { context, request }
    }
}

/// Tower layer retrying the wrapped service under an `ExponentialRetry` policy.
#[derive(Debug, Clone)]
pub struct RetryLayer {
    policy: ExponentialRetry,
}

impl RetryLayer {
    pub fn new(policy: ExponentialRetry) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RetryService { inner: service, policy: self.policy.clone() }
    }
}

/// Retry service produced by `RetryLayer`.
///
/// Each attempt drives a clone of the inner service to readiness and calls it with a
/// clone of the request. Readiness failures count as failed attempts.
#[derive(Debug, Clone)]
pub struct RetryService<S> {
    inner: S,
    policy: ExponentialRetry,
}

impl<S, R> Service<WithContext<R>> for RetryService<S>
where
    R: Clone + Send + 'static,
    S: Service<R> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = RetryError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    /// Always ready: the inner service's readiness is awaited per attempt, and a readiness
    /// failure counts as a failed attempt.
    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: WithContext<R>) -> Self::Future {
        let policy = self.policy.clone();
        let inner = self.inner.clone();
        let WithContext { context, request } = req;
        Box::pin(async move {
            policy.execute(&context, move || inner.clone().oneshot(request.clone())).await
        })
    }
}
