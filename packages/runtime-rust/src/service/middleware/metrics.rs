//! Metrics middleware for jobs.
//!
//! Wraps each job in a `tracing` span and records
//! `interactor_jobs_total{class, outcome}` and
//! `interactor_job_duration_seconds{class}` through the `metrics` facade.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::job::{JobError, JobPayload, JobReport};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records job duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

/// Metric label for a job result.
fn outcome_label(result: &Result<JobReport, JobError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(JobError::AsyncExecutionFailure { .. }) => "failed",
        Err(JobError::UnresolvedClass { .. }) => "unresolved",
        Err(JobError::Timeout { .. }) => "timeout",
        Err(JobError::Overloaded) => "shed",
        Err(_) => "error",
    }
}

impl<S> Service<JobPayload> for MetricsService<S>
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
        let class_name = payload.class_name.clone();
        let span = info_span!(
            "job",
            class = %class_name,
            job_id = %payload.id,
            attempt = payload.attempt,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(payload);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();
                let outcome = outcome_label(&result);

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                metrics::counter!(
                    "interactor_jobs_total",
                    "class" => class_name.clone(),
                    "outcome" => outcome
                )
                .increment(1);
                metrics::histogram!("interactor_job_duration_seconds", "class" => class_name.clone())
                    .record(elapsed.as_secs_f64());

                tracing::info!(class = %class_name, duration_ms, outcome, "job complete");

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use interactor_core::{Args, ErrorCollection};
    use tower::ServiceExt;

    use super::*;

    /// Service that fails every job whose class name starts with `Bad`.
    struct JudgingService;

    impl Service<JobPayload> for JudgingService {
        type Response = JobReport;
        type Error = JobError;
        type Future = Pin<Box<dyn Future<Output = Result<JobReport, JobError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, payload: JobPayload) -> Self::Future {
            Box::pin(async move {
                if payload.class_name.starts_with("Bad") {
                    return Err(JobError::AsyncExecutionFailure {
                        class_name: payload.class_name,
                        errors: ErrorCollection::new(),
                        args: payload.args,
                    });
                }
                Ok(JobReport {
                    job_id: payload.id,
                    class_name: payload.class_name,
                })
            })
        }
    }

    #[tokio::test]
    async fn passes_through_response() {
        let payload = JobPayload::new("Good", Args::new(), "default", 1_000);
        let id = payload.id;
        let report = MetricsLayer.layer(JudgingService).oneshot(payload).await.unwrap();
        assert_eq!(report.job_id, id);
    }

    #[tokio::test]
    async fn passes_through_errors() {
        let payload = JobPayload::new("BadJob", Args::new(), "default", 1_000);
        let err = MetricsLayer.layer(JudgingService).oneshot(payload).await.unwrap_err();
        assert!(matches!(err, JobError::AsyncExecutionFailure { .. }));
    }

    #[test]
    fn labels_distinguish_failure_kinds() {
        assert_eq!(outcome_label(&Err(JobError::Overloaded)), "shed");
        assert_eq!(outcome_label(&Err(JobError::Timeout { timeout_ms: 1 })), "timeout");
        assert_eq!(
            outcome_label(&Err(JobError::UnresolvedClass {
                class_name: "X".to_string(),
                args: Args::new(),
            })),
            "unresolved"
        );
    }
}
