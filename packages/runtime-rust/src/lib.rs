//! Interactor Runtime: asynchronous execution, job queueing and HTTP rendering
//! for `interactor-core` service classes.

pub mod queue;
pub mod response;
pub mod service;
pub mod telemetry;
pub mod traits;

pub use queue::{DeadLetter, InMemoryJobBackend, JobDisposition};
pub use response::respond_with;
pub use service::{
    build_job_pipeline, AsyncAdapter, CallLater, ClassCatalog, JobError, JobExecutor, JobPayload,
    JobPipeline, JobReport, JobRunner, JobTask, JobWorker, QueueOptions, RuntimeConfig,
};
pub use telemetry::init_tracing;
pub use traits::JobBackend;
