//! Uniform retry loop for remote operations.

use std::future::Future;

use tokio::time::sleep;
use tracing::warn;

use super::executor::JobHandle;
use crate::domain::RetryPolicy;
use crate::error::{Error, Result};

/// Run `op` under `policy`, retrying errors for which `retryable` holds.
///
/// `op` receives the 1-based attempt number. When a job handle is given,
/// every attempt after the first is recorded on the job, so the job's
/// attempt count tracks this loop and stays within both bounds.
pub async fn with_retry<T, F, Fut, R>(
    policy: &RetryPolicy,
    label: &str,
    handle: Option<&JobHandle>,
    retryable: R,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    R: Fn(&Error) -> bool,
{
    let mut attempt = 1;
    loop {
        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !retryable(&error) || !policy.allows_retry_after(attempt) {
            return Err(error);
        }

        let delay = policy.delay_after(attempt);
        warn!(
            operation = label,
            attempt,
            max_attempts = policy.max_attempts,
            delay_secs = delay.as_secs(),
            error = %error,
            "Retrying after transient failure"
        );
        sleep(delay).await;

        if let Some(handle) = handle {
            if !handle.begin_attempt() {
                return Err(error);
            }
        }
        attempt += 1;
    }
}

/// Retry only transient infrastructure errors.
pub async fn with_transient_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    handle: Option<&JobHandle>,
    op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry(policy, label, handle, Error::is_transient, op).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::InfraError;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_transient_retry(&fast_policy(5), "probe", None, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::transient("connection refused"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result: Result<()> = with_transient_retry(&fast_policy(3), "probe", None, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::transient("unreachable")) }
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 10s + 20s of backoff between three attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_transient_retry(&fast_policy(5), "install", None, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Infra(InfraError::ProcedureFailed {
                    procedure: "install".into(),
                    exit_code: 2,
                    stderr: "boom".into(),
                }))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
