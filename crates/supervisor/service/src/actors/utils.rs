use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A task kept failing after every allowed restart.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{task} failed {attempts} times in a row")]
pub(super) struct RetryExhausted {
    pub(super) task: &'static str,
    pub(super) attempts: u32,
}

/// Runs `operation` until cancelled, restarting it with backoff when it fails.
///
/// An operation that returns `Ok(())` is restarted immediately and clears the failure count.
/// After `max_retries` consecutive failures the loop gives up.
pub(super) async fn run_with_retry<Fut, E>(
    task: &'static str,
    operation: impl Fn() -> Fut,
    cancel_token: &CancellationToken,
    max_retries: u32,
) -> Result<(), RetryExhausted>
where
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let result = select! {
            _ = cancel_token.cancelled() => {
                info!(target: "supervisor::retrier", task, "Retry loop cancelled");
                return Ok(());
            }
            result = operation() => result,
        };

        match result {
            Ok(()) => {
                info!(target: "supervisor::retrier", task, "Task exited, restarting");
                attempt = 0;
            }
            Err(err) => {
                attempt += 1;

                if attempt > max_retries {
                    error!(target: "supervisor::retrier", task, %err, "Retry limit ({max_retries}) exceeded");
                    return Err(RetryExhausted { task, attempts: attempt });
                }

                let delay = backoff_delay(attempt);
                warn!(
                    target: "supervisor::retrier",
                    task,
                    %err,
                    ?delay,
                    "Attempt {attempt}/{max_retries} failed, retrying after delay"
                );

                select! {
                    _ = sleep(delay) => {}
                    _ = cancel_token.cancelled() => {
                        warn!(target: "supervisor::retrier", task, "Retry loop cancelled during backoff");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Exponential backoff capped at 30s.
fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt.min(5));
    Duration::from_secs(secs.min(30))
}
