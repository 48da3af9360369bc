//! Step execution with idempotency bookkeeping.
//!
//! Every marked unit of work inside a workflow body routes through
//! [`StepContext::run_step`]. The context keeps a replay cursor: the
//! first `run_step` call of an attempt is sequence 1, the next is 2,
//! and so on. A step whose record already exists in the journal is
//! replayed from the record — its function is never invoked again.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use strand_core::{Journal, StepOutcome, StepRecord, StepWrite};

use crate::error::{Result, SdkError};

/// Step execution context bound to one workflow instance attempt.
///
/// Handed to the workflow function by the engine; not constructed by
/// user code. Steps within one instance are strictly sequential — the
/// context is not shared across tasks.
pub struct StepContext {
    journal: Journal,
    instance_id: String,
    cursor: AtomicU32,
    cancel: CancellationToken,
}

impl StepContext {
    /// Create a context for a fresh execution attempt.
    pub(crate) fn new(
        journal: Journal,
        instance_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            journal,
            instance_id: instance_id.into(),
            cursor: AtomicU32::new(0),
            cancel,
        }
    }

    /// The instance this context is bound to.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// True once the runtime has asked this instance to stop before the
    /// next step. Long step-free stretches of workflow code may poll
    /// this to bail out earlier than the next `run_step` call would.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run a step at most-once-recorded.
    ///
    /// If the journal already holds a record for this position, the
    /// stored value is returned (or the stored error re-raised) and
    /// `step` is not invoked. Otherwise `step` runs and its outcome —
    /// success or failure — is durably recorded before this method
    /// returns. If a concurrently recovering runtime recorded the step
    /// first, that record wins and the local result is discarded.
    #[instrument(skip(self, step), fields(instance_id = %self.instance_id, step = %name))]
    pub async fn run_step<T, E, F, Fut>(&self, name: &str, step: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        E: fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let sequence = self.cursor.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(recorded) = self.journal.load_step(&self.instance_id, sequence).await? {
            debug!(sequence, "replaying recorded step");
            return self.replay(name, recorded);
        }

        // Cooperative cancellation: refuse to start new side effects once
        // shutdown is underway. Replayed steps above are unaffected.
        if self.cancel.is_cancelled() {
            return Err(SdkError::ShuttingDown);
        }

        let outcome = match step().await {
            Ok(value) => StepOutcome::Value {
                value: serde_json::to_value(value)?,
            },
            Err(e) => StepOutcome::Error {
                message: e.to_string(),
            },
        };

        let record = StepRecord {
            sequence,
            name: name.to_string(),
            outcome,
            completed_at: Utc::now(),
        };

        let authoritative = match self.journal.record_step(&self.instance_id, &record).await? {
            StepWrite::Recorded => {
                debug!(sequence, "step recorded");
                record
            }
            StepWrite::Conflict(existing) => {
                debug!(sequence, "step already recorded by another runtime, adopting its result");
                existing
            }
        };

        self.replay(name, authoritative)
    }

    /// Turn a recorded step into the caller's result, verifying the
    /// workflow reached the same step name at this position.
    fn replay<T: DeserializeOwned>(&self, requested: &str, record: StepRecord) -> Result<T> {
        if record.name != requested {
            return Err(SdkError::NonDeterminism {
                sequence: record.sequence,
                recorded: record.name,
                requested: requested.to_string(),
            });
        }

        match record.outcome {
            StepOutcome::Value { value } => serde_json::from_value(value).map_err(|e| {
                SdkError::Serialization(format!("recorded value of step '{}': {}", requested, e))
            }),
            StepOutcome::Error { message } => Err(SdkError::StepFailed {
                step: requested.to_string(),
                message,
            }),
        }
    }
}
