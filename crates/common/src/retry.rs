//! Retry helper for upstream HTTP calls
//!
//! Operations report failures as `backoff::Error`: transient failures are
//! retried with exponential backoff until `max_retries` is spent, permanent
//! ones are returned immediately.

use crate::errors::AppError;
use backoff::{future::retry_notify, ExponentialBackoffBuilder};
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;

/// Run `operation` with exponential backoff.
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    max_retries: u32,
    mut operation: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, backoff::Error<AppError>>>,
{
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(200))
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(Some(Duration::from_secs(60)))
        .build();

    let mut attempt: u32 = 0;

    retry_notify(
        policy,
        || {
            attempt += 1;
            let current = attempt;
            let fut = operation();
            async move {
                match fut.await {
                    Err(backoff::Error::Transient { err, .. }) if current > max_retries => {
                        Err(backoff::Error::permanent(err))
                    }
                    other => other,
                }
            }
        },
        |err: AppError, wait: Duration| {
            tracing::warn!(
                operation = operation_name,
                error = %err,
                retry_in_ms = wait.as_millis() as u64,
                "Upstream call failed, retrying"
            );
        },
    )
    .await
}

/// Whether an HTTP status is worth retrying
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Classify a transport-level failure
pub fn classify_transport(err: reqwest::Error, wrap: impl FnOnce(String) -> AppError) -> backoff::Error<AppError> {
    let transient = err.is_timeout() || err.is_connect();
    let app_err = wrap(format!("Request failed: {}", err));
    if transient {
        backoff::Error::transient(app_err)
    } else {
        backoff::Error::permanent(app_err)
    }
}

/// Classify a non-success HTTP response
pub fn classify_status(
    status: StatusCode,
    body: &str,
    wrap: impl FnOnce(String) -> AppError,
) -> backoff::Error<AppError> {
    let app_err = wrap(format!("API error {}: {}", status, body));
    if is_transient_status(status) {
        backoff::Error::transient(app_err)
    } else {
        backoff::Error::permanent(app_err)
    }
}
