//! Background execution of queued jobs.
//!
//! [`JobRunner`] pulls due jobs from an [`InMemoryJobBackend`], runs them
//! through the job pipeline and reports every result back to the backend's
//! retry policy. [`JobWorker`] drives a runner from a tokio task: it drains
//! on every tick and also accepts explicit [`JobTask`]s over a channel.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tower::{Service, ServiceExt};
use tracing::{debug, error};

use super::config::RuntimeConfig;
use super::job::{JobError, JobPayload, JobReport};
use super::middleware::JobPipeline;
use crate::queue::{InMemoryJobBackend, JobDisposition};

// ---------------------------------------------------------------------------
// JobRunner
// ---------------------------------------------------------------------------

/// Tasks accepted by a [`JobWorker`].
#[derive(Debug)]
pub enum JobTask {
    /// Run every job that is due now.
    Drain,
    /// Run one payload immediately, bypassing the schedule.
    Run(JobPayload),
}

/// Runs due jobs through `S` and reports results back to the backend.
pub struct JobRunner<S = JobPipeline> {
    backend: Arc<InMemoryJobBackend>,
    pipeline: S,
}

impl<S> JobRunner<S>
where
    S: Service<JobPayload, Response = JobReport, Error = JobError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    #[must_use]
    pub fn new(backend: Arc<InMemoryJobBackend>, pipeline: S) -> Self {
        Self { backend, pipeline }
    }

    /// Runs all jobs due now concurrently; returns how many ran.
    ///
    /// Every taken job is reported, including one whose task panicked, so no
    /// job leaves the queue without being completed, retried or dead-lettered.
    pub async fn drain(&mut self) -> usize {
        let due = self.backend.take_due(SystemTime::now());
        let count = due.len();
        if count == 0 {
            return 0;
        }
        debug!(count, "draining due jobs");

        let running: Vec<(JobPayload, JoinHandle<Result<(), JobError>>)> = due
            .into_iter()
            .map(|payload| {
                let svc = self.pipeline.clone();
                let job = payload.clone();
                let handle = tokio::spawn(async move { svc.oneshot(job).await.map(|_| ()) });
                (payload, handle)
            })
            .collect();

        for (payload, handle) in running {
            let result = handle.await.unwrap_or_else(|join_err| {
                error!(job_id = %payload.id, error = %join_err, "job task aborted");
                Err(JobError::Internal(anyhow::anyhow!("job task failed: {join_err}")))
            });
            self.report(payload, result);
        }
        count
    }

    /// Runs one payload now and returns what the backend did with it.
    pub async fn run_now(&mut self, payload: JobPayload) -> JobDisposition {
        let result = self.pipeline.clone().oneshot(payload.clone()).await.map(|_| ());
        self.report(payload, result)
    }

    async fn handle(&mut self, task: JobTask) {
        match task {
            JobTask::Drain => {
                self.drain().await;
            }
            JobTask::Run(payload) => {
                self.run_now(payload).await;
            }
        }
    }

    fn report(&self, payload: JobPayload, result: Result<(), JobError>) -> JobDisposition {
        self.backend.report(payload, result, SystemTime::now())
    }
}

// ---------------------------------------------------------------------------
// JobWorker
// ---------------------------------------------------------------------------

/// Handle to a spawned job loop.
pub struct JobWorker {
    tx: Option<mpsc::Sender<JobTask>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl JobWorker {
    /// Spawns the loop: drain every `tick_interval_ms`, handle submitted
    /// tasks in between, stop on [`stop`](Self::stop).
    pub fn start<S>(mut runner: JobRunner<S>, config: &RuntimeConfig) -> Self
    where
        S: Service<JobPayload, Response = JobReport, Error = JobError> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<JobTask>(config.channel_capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let tick = Duration::from_millis(config.tick_interval_ms.max(1));

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(tick);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticks.tick().await;

            loop {
                tokio::select! {
                    task = rx.recv() => match task {
                        Some(task) => runner.handle(task).await,
                        None => break,
                    },
                    _ = ticks.tick() => {
                        runner.drain().await;
                    }
                    _ = &mut shutdown_rx => break,
                }
            }

            debug!(pending = runner.backend.pending_len(), "job worker stopped");
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// # Errors
    ///
    /// Returns an error once the worker has been stopped.
    pub async fn submit(&self, task: JobTask) -> anyhow::Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(task)
                .await
                .map_err(|_| anyhow::anyhow!("job worker channel closed")),
            None => Err(anyhow::anyhow!("job worker not running")),
        }
    }

    /// Stops the loop and waits for the in-flight drain to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
