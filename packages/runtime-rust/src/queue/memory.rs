//! In-process job queue with scheduling, retries and a dead-letter list.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::service::config::RuntimeConfig;
use crate::service::job::{JobError, JobPayload, QueueOptions};
use crate::traits::JobBackend;

/// A job waiting for its due time, stored in wire form.
#[derive(Debug, Clone)]
struct ScheduledJob {
    due: SystemTime,
    bytes: Vec<u8>,
}

/// A job that exhausted its attempts or can never succeed.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub payload: JobPayload,
    pub reason: String,
}

/// What the backend did with a job after it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobDisposition {
    Completed,
    Retrying { attempt: u32, due: SystemTime },
    DeadLettered,
}

/// Queue backend for a single process.
///
/// Jobs are kept `MsgPack`-encoded per named queue. A failed job is retried
/// with a fixed backoff while its error is retryable and attempts remain;
/// otherwise it moves to the dead-letter list.
pub struct InMemoryJobBackend {
    queues: Mutex<HashMap<String, Vec<ScheduledJob>>>,
    dead: Mutex<Vec<DeadLetter>>,
    completed: AtomicU64,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl InMemoryJobBackend {
    #[must_use]
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            dead: Mutex::new(Vec::new()),
            completed: AtomicU64::new(0),
            max_attempts: config.max_attempts.max(1),
            retry_backoff: config.retry_backoff,
        }
    }

    fn schedule(&self, payload: &JobPayload, due: SystemTime) -> Result<(), JobError> {
        let bytes = payload.encode()?;
        self.queues
            .lock()
            .entry(payload.queue.clone())
            .or_default()
            .push(ScheduledJob { due, bytes });
        Ok(())
    }

    /// Removes and returns every job due at `now`, earliest first.
    ///
    /// Entries that fail to decode are dropped with an error log; they can
    /// never run.
    pub fn take_due(&self, now: SystemTime) -> Vec<JobPayload> {
        let mut due = Vec::new();
        {
            let mut queues = self.queues.lock();
            for jobs in queues.values_mut() {
                let (ready, waiting): (Vec<_>, Vec<_>) =
                    jobs.drain(..).partition(|job| job.due <= now);
                *jobs = waiting;
                due.extend(ready);
            }
        }
        due.sort_by_key(|job| job.due);

        due.into_iter()
            .filter_map(|job| match JobPayload::decode(&job.bytes) {
                Ok(payload) => Some(payload),
                Err(err) => {
                    error!(error = %err, "dropping undecodable job");
                    None
                }
            })
            .collect()
    }

    /// Applies the retry policy to a job that just ran.
    pub fn report(
        &self,
        mut payload: JobPayload,
        result: Result<(), JobError>,
        now: SystemTime,
    ) -> JobDisposition {
        let err = match result {
            Ok(()) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                return JobDisposition::Completed;
            }
            Err(err) => err,
        };

        // Shed jobs go back without spending an attempt.
        let next_attempt = if matches!(err, JobError::Overloaded) {
            payload.attempt
        } else {
            payload.attempt + 1
        };

        if err.is_retryable() && next_attempt < self.max_attempts {
            payload.attempt = next_attempt;
            let due = now + self.retry_backoff;
            match self.schedule(&payload, due) {
                Ok(()) => {
                    warn!(
                        job_id = %payload.id,
                        class = %payload.class_name,
                        attempt = next_attempt,
                        error = %err,
                        "job failed, retrying"
                    );
                    return JobDisposition::Retrying {
                        attempt: next_attempt,
                        due,
                    };
                }
                Err(encode_err) => {
                    error!(job_id = %payload.id, error = %encode_err, "cannot reschedule job");
                }
            }
        }

        error!(
            job_id = %payload.id,
            class = %payload.class_name,
            attempt = payload.attempt,
            error = %err,
            "job dead-lettered"
        );
        self.dead.lock().push(DeadLetter {
            payload,
            reason: err.to_string(),
        });
        JobDisposition::DeadLettered
    }

    /// Jobs waiting per queue, due or not.
    #[must_use]
    pub fn pending(&self) -> BTreeMap<String, usize> {
        self.queues
            .lock()
            .iter()
            .map(|(name, jobs)| (name.clone(), jobs.len()))
            .collect()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.queues.lock().values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead.lock().clone()
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl JobBackend for InMemoryJobBackend {
    async fn push(&self, payload: JobPayload, options: QueueOptions) -> Result<Uuid, JobError> {
        let due = options.due_at(SystemTime::now());
        self.schedule(&payload, due)?;
        debug!(job_id = %payload.id, queue = %payload.queue, "job scheduled");
        Ok(payload.id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
