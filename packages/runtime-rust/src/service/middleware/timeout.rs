//! Timeout middleware for jobs.
//!
//! Fails jobs that exceed their `timeout_ms` with `JobError::Timeout`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tower::{Layer, Service};

use crate::service::job::{JobError, JobPayload, JobReport};

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer enforcing the per-job timeout carried on each payload.
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S> Service<JobPayload> for TimeoutService<S>
where
    S: Service<JobPayload, Response = JobReport, Error = JobError> + Send,
    S::Future: Send + 'static,
{
    type Response = JobReport;
    type Error = JobError;
    type Future = Pin<Box<dyn Future<Output = Result<JobReport, JobError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, payload: JobPayload) -> Self::Future {
        let timeout_ms = payload.timeout_ms;
        let fut = self.inner.call(payload);
        Box::pin(async move {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(JobError::Timeout { timeout_ms }),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use interactor_core::Args;
    use tower::ServiceExt;

    use super::*;

    /// Service that takes a configurable delay before responding.
    struct SlowService {
        delay_ms: u64,
    }

    impl Service<JobPayload> for SlowService {
        type Response = JobReport;
        type Error = JobError;
        type Future = Pin<Box<dyn Future<Output = Result<JobReport, JobError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, payload: JobPayload) -> Self::Future {
            let delay = self.delay_ms;
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(JobReport {
                    job_id: payload.id,
                    class_name: payload.class_name,
                })
            })
        }
    }

    fn job(timeout_ms: u64) -> JobPayload {
        JobPayload::new("Slow", Args::new(), "default", timeout_ms)
    }

    #[tokio::test]
    async fn completes_within_timeout() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 10 });
        let report = svc.oneshot(job(1_000)).await.unwrap();
        assert_eq!(report.class_name, "Slow");
    }

    #[tokio::test]
    async fn exceeds_timeout_returns_error() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 200 });
        let err = svc.oneshot(job(50)).await.unwrap_err();
        assert!(matches!(err, JobError::Timeout { timeout_ms: 50 }));
        assert!(err.is_retryable());
    }
}
