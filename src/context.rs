//! Execution context: an optional deadline paired with cooperative cancellation.
//!
//! A `Context` is a cheap, clonable handle. Contexts form a tree: a child derived with
//! [`Context::with_cancel`], [`Context::with_deadline`] or [`Context::with_timeout`] is
//! cancelled whenever its parent is, and its deadline is never later than the parent's.
//!
//! The deadline is checked lazily. No background task is spawned per context; the timer
//! only exists while someone awaits [`Context::done`].
//!
//! ```rust
//! use std::time::Duration;
//! use deadline_retry::{Context, ContextError};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let root = Context::background();
//! assert!(!root.has_deadline());
//!
//! let ctx = Context::with_timeout(&root, Duration::from_millis(5));
//! assert_eq!(ctx.done().await, ContextError::DeadlineExceeded);
//! assert!(root.err().is_none());
//! # });
//! ```

use crate::error::ContextError;
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Timeouts that overflow `Instant` collapse to this horizon (~30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// What the retry loop needs from the caller's context.
#[async_trait]
pub trait ExecutionContext: Send + Sync {
    /// Absolute point in time after which the context is expired, if any.
    fn deadline(&self) -> Option<Instant>;

    /// Whether a deadline is attached.
    fn has_deadline(&self) -> bool {
        self.deadline().is_some()
    }

    /// Resolve once the context is cancelled or expired, with the reason.
    async fn done(&self) -> ContextError;

    /// `None` while the context is live, otherwise why it is done.
    fn err(&self) -> Option<ContextError>;
}

#[derive(Debug)]
struct Inner {
    deadline: Option<Instant>,
    token: CancellationToken,
    cause: OnceLock<ContextError>,
    cancelled_at: OnceLock<Instant>,
    parent: Option<Context>,
}

/// Deadline-bearing, cancellable execution context.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Root context: no deadline, only cancelled explicitly.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline: None,
                token: CancellationToken::new(),
                cause: OnceLock::new(),
                cancelled_at: OnceLock::new(),
                parent: None,
            }),
        }
    }

    /// Child that can be cancelled on its own; inherits the parent's deadline.
    pub fn with_cancel(parent: &Context) -> Self {
        Self::derive(parent, parent.inner.deadline)
    }

    /// Child expiring at `deadline`, or at the parent's deadline if that is earlier.
    pub fn with_deadline(parent: &Context, deadline: Instant) -> Self {
        let effective = match parent.inner.deadline {
            Some(inherited) => inherited.min(deadline),
            None => deadline,
        };
        Self::derive(parent, Some(effective))
    }

    /// Child expiring `timeout` from now (or earlier, per the parent).
    pub fn with_timeout(parent: &Context, timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE);
        Self::with_deadline(parent, deadline)
    }

    fn derive(parent: &Context, deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline,
                token: parent.inner.token.child_token(),
                cause: OnceLock::new(),
                cancelled_at: OnceLock::new(),
                parent: Some(parent.clone()),
            }),
        }
    }

    /// The effective deadline.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Whether a deadline is attached.
    pub fn has_deadline(&self) -> bool {
        self.inner.deadline.is_some()
    }

    /// Time left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Cancel this context and every context derived from it.
    ///
    /// A context whose deadline already passed keeps `DeadlineExceeded` as its reason.
    pub fn cancel(&self) {
        let _ = self.inner.cancelled_at.set(Instant::now());
        self.inner.token.cancel();
    }

    /// Guard that cancels the context when dropped.
    pub fn cancel_on_drop(&self) -> CancelGuard {
        CancelGuard { ctx: self.clone() }
    }

    /// `None` while live; otherwise whichever of cancellation and deadline came first.
    /// Once reported the reason never changes.
    pub fn err(&self) -> Option<ContextError> {
        if let Some(cause) = self.inner.cause.get() {
            return Some(*cause);
        }
        let expired = self.inner.deadline.filter(|d| Instant::now() >= *d);
        let cause = match (self.cancelled_at(), expired) {
            (Some(at), Some(deadline)) if deadline <= at => ContextError::DeadlineExceeded,
            (Some(_), _) => ContextError::Canceled,
            (None, Some(_)) => ContextError::DeadlineExceeded,
            (None, None) => return None,
        };
        Some(self.settle(cause))
    }

    /// Whether the context is cancelled or expired.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Wait until the context is cancelled or its deadline passes.
    ///
    /// Dropping the returned future releases its timer.
    pub async fn done(&self) -> ContextError {
        if let Some(err) = self.err() {
            return err;
        }
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.inner.token.cancelled().await,
        }
        self.err().unwrap_or(ContextError::Canceled)
    }

    // Earliest explicit cancel on the path to the root. Ancestor deadlines need no walk:
    // a child's deadline is never later than its parent's.
    fn cancelled_at(&self) -> Option<Instant> {
        let mut earliest: Option<Instant> = None;
        let mut node = Some(self);
        while let Some(ctx) = node {
            if let Some(at) = ctx.inner.cancelled_at.get() {
                earliest = Some(earliest.map_or(*at, |e| e.min(*at)));
            }
            node = ctx.inner.parent.as_ref();
        }
        earliest
    }

    // First writer wins; later callers read back whatever was recorded.
    fn settle(&self, cause: ContextError) -> ContextError {
        let _ = self.inner.cause.set(cause);
        self.inner.cause.get().copied().unwrap_or(cause)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[async_trait]
impl ExecutionContext for Context {
    fn deadline(&self) -> Option<Instant> {
        Context::deadline(self)
    }

    async fn done(&self) -> ContextError {
        Context::done(self).await
    }

    fn err(&self) -> Option<ContextError> {
        Context::err(self)
    }
}

/// Cancels its context on drop. See [`Context::cancel_on_drop`].
#[derive(Debug)]
#[must_use = "the context is cancelled as soon as the guard is dropped"]
pub struct CancelGuard {
    ctx: Context,
}

impl CancelGuard {
    /// The guarded context.
    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}
