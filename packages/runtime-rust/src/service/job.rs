//! Job payloads, queue options and job-level errors.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use interactor_core::{Args, ErrorCollection, ServiceError, Value};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire payload handed to the queue backend: which class to call, with what.
///
/// Encoded as `MsgPack` via `rmp-serde`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub id: Uuid,
    pub class_name: String,
    pub args: Args,
    pub queue: String,
    /// Zero-based attempt counter, bumped by the backend on retry.
    pub attempt: u32,
    pub timeout_ms: u64,
}

impl JobPayload {
    #[must_use]
    pub fn new(
        class_name: impl Into<String>,
        args: Args,
        queue: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            class_name: class_name.into(),
            args,
            queue: queue.into(),
            attempt: 0,
            timeout_ms,
        }
    }

    /// # Errors
    ///
    /// Returns `JobError::Encode` if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, JobError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// # Errors
    ///
    /// Returns `JobError::Decode` for bytes that are not a valid payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, JobError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Options forwarded verbatim to the queue backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueOptions {
    /// Target queue; the runtime's default queue when `None`.
    pub queue: Option<String>,
    /// Delay from enqueue time.
    pub wait: Option<Duration>,
    /// Absolute run time. Takes precedence over `wait`.
    pub at: Option<SystemTime>,
    /// Backend-specific options the runtime does not interpret.
    pub extra: BTreeMap<String, Value>,
}

impl QueueOptions {
    #[must_use]
    pub fn queue(mut self, name: impl Into<String>) -> Self {
        self.queue = Some(name.into());
        self
    }

    #[must_use]
    pub fn wait(mut self, delay: Duration) -> Self {
        self.wait = Some(delay);
        self
    }

    #[must_use]
    pub fn at(mut self, time: SystemTime) -> Self {
        self.at = Some(time);
        self
    }

    /// When a job enqueued at `now` becomes due.
    #[must_use]
    pub fn due_at(&self, now: SystemTime) -> SystemTime {
        self.at
            .or_else(|| self.wait.map(|delay| now + delay))
            .unwrap_or(now)
    }
}

/// Successful job execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job_id: Uuid,
    pub class_name: String,
}

/// Errors surfaced to the queue backend.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("cannot resolve service class `{class_name}`")]
    UnresolvedClass { class_name: String, args: Args },
    #[error("{class_name} failed: {}", errors.full_messages().join(", "))]
    AsyncExecutionFailure {
        class_name: String,
        errors: ErrorCollection,
        args: Args,
    },
    #[error("{class_name} raised: {source}")]
    Invocation {
        class_name: String,
        #[source]
        source: ServiceError,
    },
    #[error("job timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("worker overloaded, job deferred")]
    Overloaded,
    #[error("job payload encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("job payload decoding failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl JobError {
    /// Whether the backend's retry policy should try the job again.
    ///
    /// Failed outcomes, timeouts and load shedding are retried. Unresolvable
    /// classes, raised invocation errors and malformed payloads are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::AsyncExecutionFailure { .. }
            | JobError::Timeout { .. }
            | JobError::Overloaded => true,
            JobError::UnresolvedClass { .. }
            | JobError::Invocation { .. }
            | JobError::Encode(_)
            | JobError::Decode(_)
            | JobError::Internal(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use interactor_core::args;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn payload_survives_the_wire() {
        let payload = JobPayload::new(
            "SendWelcome",
            args([("email", Value::from("a@b.c")), ("count", Value::from(2))]),
            "mailers",
            5_000,
        );
        let bytes = payload.encode().unwrap();
        let decoded = JobPayload::decode(&bytes).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            JobPayload::decode(&[0xc1, 0x00]),
            Err(JobError::Decode(_))
        ));
    }

    #[test]
    fn at_takes_precedence_over_wait() {
        let now = UNIX_EPOCH + Duration::from_secs(100);
        let at = UNIX_EPOCH + Duration::from_secs(500);
        assert_eq!(QueueOptions::default().due_at(now), now);
        assert_eq!(
            QueueOptions::default().wait(Duration::from_secs(5)).due_at(now),
            now + Duration::from_secs(5)
        );
        assert_eq!(
            QueueOptions::default()
                .wait(Duration::from_secs(5))
                .at(at)
                .due_at(now),
            at
        );
    }

    #[test]
    fn retryability_by_variant() {
        let failure = JobError::AsyncExecutionFailure {
            class_name: "X".to_string(),
            errors: ErrorCollection::new(),
            args: Args::new(),
        };
        assert!(failure.is_retryable());
        let unresolved = JobError::UnresolvedClass {
            class_name: "Missing".to_string(),
            args: Args::new(),
        };
        assert!(!unresolved.is_retryable());
        assert_eq!(unresolved.to_string(), "cannot resolve service class `Missing`");
        let misuse = JobError::Invocation {
            class_name: "X".to_string(),
            source: ServiceError::UndeclaredFieldWrite {
                name: "a".to_string(),
                class: "X".to_string(),
            },
        };
        assert!(!misuse.is_retryable());
    }

    proptest! {
        #[test]
        fn due_time_never_precedes_enqueue_without_at(wait_ms in proptest::option::of(0u64..86_400_000)) {
            let now = UNIX_EPOCH + Duration::from_secs(1_000);
            let mut options = QueueOptions::default();
            options.wait = wait_ms.map(Duration::from_millis);
            let due = options.due_at(now);
            prop_assert!(due >= now);
            prop_assert_eq!(due, now + Duration::from_millis(wait_ms.unwrap_or(0)));
        }
    }
}
