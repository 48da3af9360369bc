//! Typed journal layer over the log store.
//!
//! Maps workflow instances and step results onto store keys:
//!
//! | Key | Value |
//! |-----|-------|
//! | `instance/<id>` | [`InstanceRecord`] as JSON |
//! | `step/<id>/<seq>` | [`StepRecord`] as JSON, zero-padded sequence |
//!
//! Sequence numbers are zero-padded to eight digits so a prefix listing
//! of `step/<id>/` returns records in execution order. Step records are
//! written once with a conditional write and never mutated; instance
//! records are overwritten on status transitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::StoreError;
use crate::store::{LogStore, WriteOutcome};

/// Key prefix under which all instance records live.
pub const INSTANCE_PREFIX: &str = "instance/";

/// Store key for an instance record.
pub fn instance_key(instance_id: &str) -> String {
    format!("{}{}", INSTANCE_PREFIX, instance_id)
}

/// Store key for a step record.
pub fn step_key(instance_id: &str, sequence: u32) -> String {
    format!("step/{}/{:08}", instance_id, sequence)
}

/// Key prefix under which all step records of one instance live.
pub fn step_prefix(instance_id: &str) -> String {
    format!("step/{}/", instance_id)
}

/// Lifecycle status of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Instance created but execution has not started.
    Pending,
    /// Instance is executing, or was executing when its runtime died.
    Running,
    /// Instance finished successfully.
    Succeeded,
    /// Instance finished with an error.
    Failed,
}

impl WorkflowStatus {
    /// True for statuses that will never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// A workflow instance as persisted in the journal.
///
/// Created on invocation, mutated by the engine on status transitions,
/// never deleted (retained as history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Globally unique instance identifier.
    pub instance_id: String,
    /// Name of the registered workflow definition.
    pub workflow_name: String,
    /// Current lifecycle status.
    pub status: WorkflowStatus,
    /// Serialized argument payload, stored at creation so recovery can
    /// re-invoke the workflow with its original arguments.
    pub args: serde_json::Value,
    /// Final result once the instance succeeded.
    pub output: Option<serde_json::Value>,
    /// Captured error once the instance failed.
    pub error: Option<String>,
    /// Logical service name of the runtime that last ran this instance.
    pub executor: Option<String>,
    /// When the instance was created.
    pub created_at: DateTime<Utc>,
    /// When the instance first transitioned to running.
    pub started_at: Option<DateTime<Utc>>,
    /// When the instance reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl InstanceRecord {
    /// Build a fresh pending instance.
    pub fn pending(
        instance_id: impl Into<String>,
        workflow_name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            workflow_name: workflow_name.into(),
            status: WorkflowStatus::Pending,
            args,
            output: None,
            error: None,
            executor: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

/// Captured outcome of a step execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step returned successfully; its value is replayed verbatim.
    Value {
        /// Serialized return value.
        value: serde_json::Value,
    },
    /// The step raised; the captured error is re-raised on replay.
    Error {
        /// Captured error message.
        message: String,
    },
}

/// A step result as persisted in the journal. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Position of this step within its instance, starting at 1.
    pub sequence: u32,
    /// Step name supplied by the workflow body.
    pub name: String,
    /// Captured return value or captured error.
    pub outcome: StepOutcome,
    /// When the step first finished.
    pub completed_at: DateTime<Utc>,
}

/// Result of attempting to record a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepWrite {
    /// This writer's record was persisted.
    Recorded,
    /// Another runtime already recorded this step; its record is
    /// authoritative and the local result must be discarded.
    Conflict(StepRecord),
}

/// Typed journal operations shared by the engine, step executor and
/// recovery scanner. Cheap to clone; clones share the store handle.
#[derive(Clone)]
pub struct Journal {
    store: Arc<dyn LogStore>,
}

impl Journal {
    /// Create a journal over the given store.
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &Arc<dyn LogStore> {
        &self.store
    }

    fn decode<T: for<'de> Deserialize<'de>>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            details: e.to_string(),
        })
    }

    fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            details: e.to_string(),
        })
    }

    /// Conditionally create an instance record.
    ///
    /// Returns `false` if an instance with this id already existed, in
    /// which case the stored record is left untouched.
    #[instrument(skip(self, record), fields(instance_id = %record.instance_id))]
    pub async fn create_instance(&self, record: &InstanceRecord) -> Result<bool, StoreError> {
        let key = instance_key(&record.instance_id);
        let bytes = Self::encode(&key, record)?;
        let created = !self.store.put_if_absent(&key, &bytes).await?.is_conflict();
        debug!(created, "instance create attempted");
        Ok(created)
    }

    /// Load an instance record by id.
    pub async fn load_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceRecord>, StoreError> {
        let key = instance_key(instance_id);
        match self.store.read(&key).await? {
            Some(bytes) => Ok(Some(Self::decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Overwrite an instance record (status transitions).
    pub async fn store_instance(&self, record: &InstanceRecord) -> Result<(), StoreError> {
        let key = instance_key(&record.instance_id);
        let bytes = Self::encode(&key, record)?;
        self.store.write(&key, &bytes).await
    }

    /// Conditionally record a step result.
    ///
    /// If another runtime already wrote this `(instance, sequence)` slot,
    /// the stored record is returned as authoritative.
    #[instrument(skip(self, record), fields(instance_id = %instance_id, sequence = record.sequence))]
    pub async fn record_step(
        &self,
        instance_id: &str,
        record: &StepRecord,
    ) -> Result<StepWrite, StoreError> {
        let key = step_key(instance_id, record.sequence);
        let bytes = Self::encode(&key, record)?;
        match self.store.put_if_absent(&key, &bytes).await? {
            WriteOutcome::Written => Ok(StepWrite::Recorded),
            WriteOutcome::Conflict(existing) => {
                debug!("step slot already held, returning stored record");
                Ok(StepWrite::Conflict(Self::decode(&key, &existing)?))
            }
        }
    }

    /// Load a single step record, or `None` if the step has not
    /// completed yet.
    pub async fn load_step(
        &self,
        instance_id: &str,
        sequence: u32,
    ) -> Result<Option<StepRecord>, StoreError> {
        let key = step_key(instance_id, sequence);
        match self.store.read(&key).await? {
            Some(bytes) => Ok(Some(Self::decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// List all recorded steps of an instance in sequence order.
    pub async fn list_steps(&self, instance_id: &str) -> Result<Vec<StepRecord>, StoreError> {
        let pairs = self.store.list_prefix(&step_prefix(instance_id)).await?;
        pairs
            .iter()
            .map(|(key, bytes)| Self::decode(key, bytes))
            .collect()
    }

    /// List all instances currently in the given status.
    ///
    /// An undecodable instance record is skipped with a warning rather
    /// than failing the listing: one poisoned key must not make every
    /// other instance unlistable.
    pub async fn list_instances_with_status(
        &self,
        status: WorkflowStatus,
    ) -> Result<Vec<InstanceRecord>, StoreError> {
        let pairs = self.store.list_prefix(INSTANCE_PREFIX).await?;
        let mut records = Vec::new();
        for (key, bytes) in &pairs {
            let record: InstanceRecord = match Self::decode(key, bytes) {
                Ok(record) => record,
                Err(e) => {
                    warn!(key = %key.as_str(), error = %e, "skipping undecodable instance record");
                    continue;
                }
            };
            if record.status == status {
                records.push(record);
            }
        }
        Ok(records)
    }
}
