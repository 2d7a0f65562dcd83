use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;

use super::adapter::AsyncAdapter;
use super::job::{JobError, JobPayload, JobReport};

/// Innermost service of the job pipeline: runs one payload through the
/// [`AsyncAdapter`].
///
/// Service calls are synchronous, so each one runs on the blocking pool and
/// the returned future only awaits its completion.
#[derive(Clone)]
pub struct JobExecutor {
    adapter: Arc<AsyncAdapter>,
}

impl JobExecutor {
    #[must_use]
    pub fn new(adapter: Arc<AsyncAdapter>) -> Self {
        Self { adapter }
    }
}

impl Service<JobPayload> for JobExecutor {
    type Response = JobReport;
    type Error = JobError;
    type Future = Pin<Box<dyn Future<Output = Result<JobReport, JobError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, payload: JobPayload) -> Self::Future {
        let adapter = Arc::clone(&self.adapter);
        Box::pin(async move {
            let report = JobReport {
                job_id: payload.id,
                class_name: payload.class_name.clone(),
            };
            let run = move || adapter.execute(&payload.class_name, payload.args);
            tokio::task::spawn_blocking(run)
                .await
                .map_err(|join_err| anyhow::anyhow!("job task failed: {join_err}"))??;
            Ok(report)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use interactor_core::{args, ServiceClass, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::service::catalog::ClassCatalog;
    use crate::service::config::RuntimeConfig;
    use crate::service::job::QueueOptions;
    use crate::traits::JobBackend;

    struct NullBackend;

    #[async_trait]
    impl JobBackend for NullBackend {
        async fn push(&self, payload: JobPayload, _options: QueueOptions) -> Result<Uuid, JobError> {
            Ok(payload.id)
        }
    }

    fn executor() -> JobExecutor {
        let catalog = Arc::new(ClassCatalog::new());
        catalog.register(
            ServiceClass::define("Panicky", |d| {
                d.input("boom");
                d.perform(|ctx| {
                    if ctx.get("boom").is_some() {
                        panic!("boom");
                    }
                    Ok(Value::Null)
                });
            })
            .unwrap(),
        );
        let adapter = AsyncAdapter::new(catalog, Arc::new(NullBackend), &RuntimeConfig::default());
        JobExecutor::new(Arc::new(adapter))
    }

    #[tokio::test]
    async fn reports_the_job_it_ran() {
        let payload = JobPayload::new("Panicky", args([("other", 1)]), "default", 1_000);
        let id = payload.id;
        // "other" is undeclared, so the call raises before the routine runs
        let err = executor().oneshot(payload).await.unwrap_err();
        assert!(matches!(err, JobError::Invocation { .. }));

        let payload = JobPayload::new("Panicky", Default::default(), "default", 1_000);
        let report = executor().oneshot(payload.clone()).await.unwrap();
        assert_eq!(report.job_id, payload.id);
        assert_ne!(report.job_id, id);
        assert_eq!(report.class_name, "Panicky");
    }

    #[tokio::test]
    async fn panicking_routine_becomes_internal_error() {
        let payload = JobPayload::new("Panicky", args([("boom", true)]), "default", 1_000);
        let err = executor().oneshot(payload).await.unwrap_err();
        assert!(matches!(err, JobError::Internal(_)));
    }
}
