use async_trait::async_trait;
use uuid::Uuid;

use crate::service::job::{JobError, JobPayload, QueueOptions};

/// Pluggable job queue the async adapter hands work to.
/// Implementations: in-memory (tests, single process); external brokers plug in here.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Accept a job for later execution, honouring `options` for queue
    /// selection and scheduling. Returns the job id.
    async fn push(&self, payload: JobPayload, options: QueueOptions) -> Result<Uuid, JobError>;
}
