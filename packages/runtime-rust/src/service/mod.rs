//! Asynchronous execution of service classes.
//!
//! 1. **Catalog** (`catalog`): resolves queued class names back to classes
//! 2. **Adapter** (`adapter`): enqueues calls and executes them when due
//! 3. **Middleware** (`middleware`): Tower layers (load-shedding, timeout, metrics)
//! 4. **Executor** (`executor`): innermost service running one job
//! 5. **Background workers** (`worker`): drain due jobs on every tick

pub mod adapter;
pub mod catalog;
pub mod config;
pub mod executor;
pub mod job;
pub mod middleware;
pub mod worker;

pub use adapter::{AsyncAdapter, CallLater};
pub use catalog::ClassCatalog;
pub use config::RuntimeConfig;
pub use executor::JobExecutor;
pub use job::{JobError, JobPayload, JobReport, QueueOptions};
pub use middleware::{build_job_pipeline, JobPipeline};
pub use worker::{JobRunner, JobTask, JobWorker};
