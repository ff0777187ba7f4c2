//! Retry a flaky operation under a two-second deadline.
use deadline_retry::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), RetryError<std::io::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let ctx = Context::with_timeout(&Context::background(), Duration::from_secs(2));
    let attempts = AtomicUsize::new(0);

    let value = retry(&ctx, 4, Duration::from_millis(50), || {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            // Replace with your real fallible work
            if n < 2 {
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "not yet"))
            } else {
                Ok("hello from retry")
            }
        }
    })
    .await?;

    println!("{} after {} attempts", value, attempts.load(Ordering::SeqCst));

    // A deadline shorter than the first backoff interrupts the wait.
    let short = Context::with_timeout(&Context::background(), Duration::from_millis(20));
    let err = retry(&short, 4, Duration::from_millis(200), || async {
        Err::<(), _>(std::io::Error::new(std::io::ErrorKind::TimedOut, "still down"))
    })
    .await
    .unwrap_err();
    println!("gave up: {}", err);
    Ok(())
}
