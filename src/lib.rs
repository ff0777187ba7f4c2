#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # deadline-retry
//!
//! A cancellation-aware retry primitive for async Rust: run a fallible operation until it
//! succeeds, the retry budget runs out, or the caller's context expires, doubling the wait
//! between attempts.
//!
//! ## Features
//!
//! - **Deadline required**: a context without a deadline is rejected before the first
//!   attempt, so every retry loop has a bounded worst case
//! - **Exponential backoff** (`base * 2^attempt`), raced against context cancellation
//! - **Last error verbatim** on exhaustion, no synthesized wrapper
//! - **Hierarchical contexts** with deadlines and explicit cancellation
//! - **Tower layer** for retrying services
//! - **Injectable sleepers** for fast, deterministic tests
//!
//! ## Quick Start
//!
//! ```rust
//! use deadline_retry::{retry, Context};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ctx = Context::with_timeout(&Context::background(), Duration::from_secs(2));
//!
//!     let result = retry(&ctx, 3, Duration::from_millis(50), || async {
//!         // Your async operation here
//!         Ok::<_, std::io::Error>(())
//!     })
//!     .await;
//!     assert!(result.is_ok());
//! }
//! ```

pub mod backoff;
pub mod context;
pub mod error;
pub mod prelude;
pub mod retry;
pub mod sleeper;

// Re-exports
pub use backoff::{BackoffError, ExponentialBackoff};
pub use context::{CancelGuard, Context, ExecutionContext};
pub use error::{ConfigError, ContextError, RetryError};
pub use retry::{
    retry, BuildError, ExponentialRetry, ExponentialRetryBuilder, RetryConfig, RetryLayer,
    RetryService, WithContext,
};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
