//! Pipeline composition: wraps the executor in every middleware layer.

use tower::ServiceBuilder;

use super::load_shed::{LoadShedLayer, LoadShedService};
use super::metrics::{MetricsLayer, MetricsService};
use super::timeout::{TimeoutLayer, TimeoutService};
use crate::service::config::RuntimeConfig;
use crate::service::executor::JobExecutor;

/// Fully layered job service, as built by [`build_job_pipeline`].
pub type JobPipeline = LoadShedService<TimeoutService<MetricsService<JobExecutor>>>;

/// Build the job pipeline around `executor`.
///
/// Layer order (outermost to innermost):
/// 1. `LoadShedLayer` -- reject when too many jobs are running
/// 2. `TimeoutLayer` -- enforce the payload's timeout
/// 3. `MetricsLayer` -- record timing and outcome
#[must_use]
pub fn build_job_pipeline(executor: JobExecutor, config: &RuntimeConfig) -> JobPipeline {
    ServiceBuilder::new()
        .layer(LoadShedLayer::new(config.max_concurrent_jobs))
        .layer(TimeoutLayer)
        .layer(MetricsLayer)
        .service(executor)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use interactor_core::{args, ServiceClass, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::service::adapter::AsyncAdapter;
    use crate::service::catalog::ClassCatalog;
    use crate::service::job::{JobError, JobPayload, QueueOptions};
    use crate::traits::JobBackend;

    struct NullBackend;

    #[async_trait]
    impl JobBackend for NullBackend {
        async fn push(&self, payload: JobPayload, _options: QueueOptions) -> Result<Uuid, JobError> {
            Ok(payload.id)
        }
    }

    fn pipeline() -> JobPipeline {
        let config = RuntimeConfig::default();
        let catalog = Arc::new(ClassCatalog::new());
        catalog.register(
            ServiceClass::define("Sleeper", |d| {
                d.input("ms");
                d.perform(|ctx| {
                    let ms = ctx.get("ms").and_then(Value::as_i64).unwrap_or_default();
                    std::thread::sleep(std::time::Duration::from_millis(ms.unsigned_abs()));
                    Ok(Value::Null)
                });
            })
            .unwrap(),
        );
        let adapter = AsyncAdapter::new(catalog, Arc::new(NullBackend), &config);
        build_job_pipeline(JobExecutor::new(Arc::new(adapter)), &config)
    }

    #[tokio::test]
    async fn pipeline_runs_jobs_through_all_layers() {
        let payload = JobPayload::new("Sleeper", args([("ms", 0)]), "default", 1_000);
        let report = pipeline().oneshot(payload).await.unwrap();
        assert_eq!(report.class_name, "Sleeper");
    }

    #[tokio::test]
    async fn slow_service_call_times_out() {
        let payload = JobPayload::new("Sleeper", args([("ms", 300)]), "default", 20);
        let err = pipeline().oneshot(payload).await.unwrap_err();
        assert!(matches!(err, JobError::Timeout { timeout_ms: 20 }));
    }

    #[tokio::test]
    async fn unknown_class_surfaces_unresolved() {
        let payload = JobPayload::new("Ghost", args([("x", 1)]), "default", 1_000);
        let err = pipeline().oneshot(payload).await.unwrap_err();
        assert!(matches!(err, JobError::UnresolvedClass { ref class_name, .. } if class_name == "Ghost"));
    }
}
