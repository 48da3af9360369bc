//! Crash recovery: resume workflow instances left running.
//!
//! An instance in `Running` state with no live executor is the footprint
//! of a crash (or of a shutdown that drained mid-workflow). The scanner
//! lists those instances at launch and replays each through the engine.
//! Replay is safe to race: recorded steps are never re-invoked and the
//! conditional write arbitrates any slot both executors reach fresh.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use strand_core::WorkflowStatus;

use crate::config::RetryPolicy;
use crate::engine::WorkflowEngine;
use crate::error::{Result, SdkError};

/// Scans the journal for interrupted instances and resumes them.
pub(crate) struct RecoveryScanner {
    engine: WorkflowEngine,
    concurrency: usize,
    retry: RetryPolicy,
}

impl RecoveryScanner {
    pub(crate) fn new(engine: WorkflowEngine, concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            engine,
            concurrency: concurrency.max(1),
            retry,
        }
    }

    /// Resume every interrupted instance, with bounded concurrency.
    ///
    /// Returns the number of instances that reached a settled outcome
    /// (terminal state, or a recorded failure). Instances registered to
    /// another service are skipped; a failing instance never aborts
    /// recovery of the rest.
    #[instrument(skip(self))]
    pub(crate) async fn recover_all(&self) -> Result<usize> {
        let interrupted = self.list_interrupted().await?;
        if interrupted.is_empty() {
            info!("no interrupted instances found");
            return Ok(0);
        }
        info!(count = interrupted.len(), "resuming interrupted instances");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for record in interrupted {
            if !self.engine.knows(&record.workflow_name) {
                warn!(
                    instance_id = %record.instance_id,
                    workflow = %record.workflow_name,
                    "skipping instance with no local definition, it belongs to another service"
                );
                continue;
            }

            let engine = self.engine.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire().await;
                match engine.resume(&record.instance_id).await {
                    Ok(_) => true,
                    Err(e) if e.is_infrastructure() => {
                        warn!(
                            instance_id = %record.instance_id,
                            error = %e,
                            "recovery interrupted, instance left for a later pass"
                        );
                        false
                    }
                    Err(e) => {
                        // The failure is now recorded on the instance
                        // itself, which is a settled outcome.
                        warn!(instance_id = %record.instance_id, error = %e, "instance failed during recovery");
                        true
                    }
                }
            });
        }

        let mut settled = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => settled += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "recovery task panicked"),
            }
        }

        info!(settled, "recovery pass complete");
        Ok(settled)
    }

    /// List running instances, retrying connectivity-class store
    /// failures with backoff. Non-retryable errors surface immediately.
    async fn list_interrupted(&self) -> Result<Vec<strand_core::InstanceRecord>> {
        let mut attempt = 0u32;
        loop {
            match self
                .engine
                .journal()
                .list_instances_with_status(WorkflowStatus::Running)
                .await
            {
                Ok(records) => return Ok(records),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "listing interrupted instances failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(SdkError::Store(e)),
            }
        }
    }
}
