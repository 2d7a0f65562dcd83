use std::time::Duration;

/// Runtime configuration for asynchronous service execution.
///
/// Controls queue naming, job timeouts, retry policy and worker cadence.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Queue used when `QueueOptions::queue` is not set.
    pub default_queue: String,
    /// Per-job timeout in milliseconds, stamped onto each payload at enqueue.
    pub job_timeout_ms: u64,
    /// Total attempts (first run included) before a job is dead-lettered.
    pub max_attempts: u32,
    /// Fixed delay before a failed job becomes due again.
    pub retry_backoff: Duration,
    /// Jobs executed concurrently before the pipeline sheds load.
    pub max_concurrent_jobs: u32,
    /// Interval between worker drains of the due queue, in milliseconds.
    pub tick_interval_ms: u64,
    /// Capacity of the worker's task channel.
    pub channel_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_queue: "default".to_string(),
            job_timeout_ms: 30_000,
            max_attempts: 5,
            retry_backoff: Duration::from_secs(10),
            max_concurrent_jobs: 64,
            tick_interval_ms: 1_000,
            channel_capacity: 256,
        }
    }
}
