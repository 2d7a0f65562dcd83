//! Tower middleware layers for the job pipeline.
//!
//! - [`timeout`]: Per-job timeout enforcement
//! - [`metrics`]: Job timing and outcome counters
//! - [`load_shed`]: Semaphore-based concurrency limiting
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod load_shed;
pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use load_shed::LoadShedLayer;
pub use metrics::MetricsLayer;
pub use pipeline::{build_job_pipeline, JobPipeline};
pub use timeout::TimeoutLayer;
