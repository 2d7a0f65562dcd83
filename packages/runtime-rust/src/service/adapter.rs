//! Deferred invocation of service classes through a job backend.
//!
//! [`AsyncAdapter::enqueue`] hands `(class_name, args)` to the backend and
//! returns immediately. When the job runs, [`AsyncAdapter::execute`]
//! resolves the class by name, calls it, and turns a failed outcome into
//! [`JobError::AsyncExecutionFailure`] so the backend's retry policy sees it.
//! Successful outcomes are discarded.

use std::sync::Arc;

use async_trait::async_trait;
use interactor_core::{Args, ServiceClass};
use tracing::{debug, warn};
use uuid::Uuid;

use super::catalog::ClassCatalog;
use super::config::RuntimeConfig;
use super::job::{JobError, JobPayload, QueueOptions};
use crate::traits::JobBackend;

pub struct AsyncAdapter {
    catalog: Arc<ClassCatalog>,
    backend: Arc<dyn JobBackend>,
    default_queue: String,
    job_timeout_ms: u64,
}

impl AsyncAdapter {
    #[must_use]
    pub fn new(
        catalog: Arc<ClassCatalog>,
        backend: Arc<dyn JobBackend>,
        config: &RuntimeConfig,
    ) -> Self {
        Self {
            catalog,
            backend,
            default_queue: config.default_queue.clone(),
            job_timeout_ms: config.job_timeout_ms,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<ClassCatalog> {
        &self.catalog
    }

    /// Queues a call to `class_name` with `args`. Nothing is resolved or run.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports when it cannot accept the job.
    pub async fn enqueue(
        &self,
        class_name: &str,
        args: Args,
        options: QueueOptions,
    ) -> Result<Uuid, JobError> {
        let queue = options
            .queue
            .clone()
            .unwrap_or_else(|| self.default_queue.clone());
        let payload = JobPayload::new(class_name, args, queue, self.job_timeout_ms);
        let id = self.backend.push(payload, options).await?;
        debug!(class = class_name, job_id = %id, "job enqueued");
        Ok(id)
    }

    /// Runs a queued call.
    ///
    /// # Errors
    ///
    /// - `UnresolvedClass` when no class is registered under `class_name`.
    /// - `Invocation` when the call raises (undeclared write, business-logic error).
    /// - `AsyncExecutionFailure` when the call completes with a failed outcome.
    pub fn execute(&self, class_name: &str, args: Args) -> Result<(), JobError> {
        let Some(class) = self.catalog.resolve(class_name) else {
            warn!(class = class_name, "job references an unregistered service class");
            return Err(JobError::UnresolvedClass {
                class_name: class_name.to_string(),
                args,
            });
        };

        let outcome = class
            .call(args.clone())
            .map_err(|source| JobError::Invocation {
                class_name: class_name.to_string(),
                source,
            })?;

        if outcome.failure() {
            return Err(JobError::AsyncExecutionFailure {
                class_name: class_name.to_string(),
                errors: outcome.errors().cloned().unwrap_or_default(),
                args,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CallLater
// ---------------------------------------------------------------------------

/// `call_later` on a service class: queue this class by name.
#[async_trait]
pub trait CallLater {
    /// # Errors
    ///
    /// Whatever the backend reports when it cannot accept the job.
    async fn call_later(
        &self,
        adapter: &AsyncAdapter,
        args: Args,
        options: QueueOptions,
    ) -> Result<Uuid, JobError>;
}

#[async_trait]
impl CallLater for ServiceClass {
    async fn call_later(
        &self,
        adapter: &AsyncAdapter,
        args: Args,
        options: QueueOptions,
    ) -> Result<Uuid, JobError> {
        adapter.enqueue(self.name(), args, options).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
