//! Workflow engine: drives a registered function to completion.
//!
//! One engine serves fresh invocations and recovery replays alike. The
//! instance state machine is `Pending -> Running -> {Succeeded |
//! Failed}`; `Running` is re-entrant, so a crash mid-execution leaves a
//! record that a later [`resume`](WorkflowEngine::resume) picks up and
//! replays through the step executor.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use strand_core::{InstanceRecord, Journal, WorkflowStatus};

use crate::error::{Result, SdkError};
use crate::registry::{ErasedWorkflowFn, WorkflowRegistry};
use crate::step::StepContext;

/// Drives workflow instances to completion, replaying recorded steps.
#[derive(Clone)]
pub(crate) struct WorkflowEngine {
    journal: Journal,
    registry: Arc<RwLock<WorkflowRegistry>>,
    service_name: String,
    cancel: CancellationToken,
}

impl WorkflowEngine {
    pub(crate) fn new(
        journal: Journal,
        registry: Arc<RwLock<WorkflowRegistry>>,
        service_name: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            journal,
            registry,
            service_name: service_name.into(),
            cancel,
        }
    }

    pub(crate) fn journal(&self) -> &Journal {
        &self.journal
    }

    pub(crate) fn knows(&self, workflow_name: &str) -> bool {
        self.registry
            .read()
            .expect("registry lock poisoned")
            .contains(workflow_name)
    }

    /// Start (or join) an instance for a fresh invocation.
    ///
    /// Creation is conditional: if the id is already taken, the stored
    /// instance is authoritative and this call behaves like a resume —
    /// which is what makes re-invoking a finished instance id return the
    /// recorded result instead of running anything twice.
    #[instrument(skip(self, args), fields(workflow = %workflow_name, instance_id = %instance_id))]
    pub(crate) async fn execute_new(
        &self,
        workflow_name: &str,
        instance_id: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let record = InstanceRecord::pending(instance_id, workflow_name, args);

        if self.journal.create_instance(&record).await? {
            info!("workflow instance created");
            return self.run(record).await;
        }

        let existing = self
            .journal
            .load_instance(instance_id)
            .await?
            .ok_or_else(|| SdkError::InstanceNotFound(instance_id.to_string()))?;
        if existing.workflow_name != workflow_name {
            warn!(
                stored = %existing.workflow_name,
                "instance id already bound to a different workflow, joining stored instance"
            );
        }
        self.run(existing).await
    }

    /// Resume an existing instance with its original stored arguments.
    #[instrument(skip(self), fields(instance_id = %instance_id))]
    pub(crate) async fn resume(&self, instance_id: &str) -> Result<serde_json::Value> {
        let record = self
            .journal
            .load_instance(instance_id)
            .await?
            .ok_or_else(|| SdkError::InstanceNotFound(instance_id.to_string()))?;
        self.run(record).await
    }

    /// Shared run path for fresh executions and replays.
    async fn run(&self, record: InstanceRecord) -> Result<serde_json::Value> {
        if let Some(outcome) = Self::stored_outcome(&record) {
            return outcome;
        }

        let workflow = self.lookup(&record.workflow_name)?;

        // Re-read before taking over: a rival executor may have finished
        // the instance since `record` was loaded, and its terminal
        // status must not be overwritten back to running.
        let mut record = match self.journal.load_instance(&record.instance_id).await? {
            Some(current) => {
                if let Some(outcome) = Self::stored_outcome(&current) {
                    return outcome;
                }
                current
            }
            None => record,
        };

        // Idempotent transition to running. started_at is set on the
        // first transition only; the executor field always reflects the
        // runtime currently driving the instance.
        record.status = WorkflowStatus::Running;
        record.started_at = record.started_at.or_else(|| Some(Utc::now()));
        record.executor = Some(self.service_name.clone());
        self.journal.store_instance(&record).await?;

        let ctx = StepContext::new(
            self.journal.clone(),
            record.instance_id.clone(),
            self.cancel.child_token(),
        );

        match workflow(ctx, record.args.clone()).await {
            Ok(output) => {
                record.status = WorkflowStatus::Succeeded;
                record.output = Some(output.clone());
                record.finished_at = Some(Utc::now());
                self.journal.store_instance(&record).await?;
                info!(instance_id = %record.instance_id, "workflow instance succeeded");
                Ok(output)
            }
            Err(e) if e.is_infrastructure() => {
                // Store outage or cooperative shutdown: not a property of
                // the workflow. Leave the instance running so recovery
                // replays it later.
                warn!(
                    instance_id = %record.instance_id,
                    error = %e,
                    "execution interrupted, instance left running for recovery"
                );
                Err(e)
            }
            Err(e) => {
                record.status = WorkflowStatus::Failed;
                record.error = Some(e.to_string());
                record.finished_at = Some(Utc::now());
                self.journal.store_instance(&record).await?;
                warn!(instance_id = %record.instance_id, error = %e, "workflow instance failed");
                Err(e)
            }
        }
    }

    /// Terminal instances replay their stored outcome; the function body
    /// never runs again.
    fn stored_outcome(record: &InstanceRecord) -> Option<Result<serde_json::Value>> {
        match record.status {
            WorkflowStatus::Succeeded => Some(Ok(record
                .output
                .clone()
                .unwrap_or(serde_json::Value::Null))),
            WorkflowStatus::Failed => Some(Err(SdkError::WorkflowFailed {
                instance_id: record.instance_id.clone(),
                message: record.error.clone().unwrap_or_default(),
            })),
            WorkflowStatus::Pending | WorkflowStatus::Running => None,
        }
    }

    fn lookup(&self, workflow_name: &str) -> Result<ErasedWorkflowFn> {
        let registry = self.registry.read().expect("registry lock poisoned");
        registry
            .get(workflow_name)
            .cloned()
            .ok_or_else(|| SdkError::UnknownWorkflow(workflow_name.to_string()))
    }
}
