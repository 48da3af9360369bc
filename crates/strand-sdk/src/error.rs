//! SDK-specific error types.

use strand_core::StoreError;
use thiserror::Error;

/// Errors that can occur in the workflow runtime.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Configuration error (missing or invalid option). Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// The durable store could not be reached at launch.
    #[error("durable store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store operation failed mid-execution.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No workflow definition registered under this name.
    #[error("workflow '{0}' is not registered")]
    UnknownWorkflow(String),

    /// A workflow definition with this name already exists.
    #[error("workflow '{0}' is already registered")]
    DuplicateWorkflow(String),

    /// No instance persisted under this id.
    #[error("workflow instance '{0}' not found")]
    InstanceNotFound(String),

    /// A step function raised; the captured error was recorded and is
    /// re-raised to the workflow body. Non-fatal to the runtime.
    #[error("step '{step}' failed: {message}")]
    StepFailed {
        /// Name of the failed step.
        step: String,
        /// Captured error message.
        message: String,
    },

    /// The workflow body failed; the instance is marked failed and the
    /// captured error is surfaced to the caller.
    #[error("workflow instance '{instance_id}' failed: {message}")]
    WorkflowFailed {
        /// The failed instance.
        instance_id: String,
        /// Captured error message.
        message: String,
    },

    /// Replay reached a step whose name does not match the recorded
    /// sequence. Fatal to the instance only.
    #[error(
        "non-deterministic replay at sequence {sequence}: recorded step '{recorded}', workflow requested '{requested}'"
    )]
    NonDeterminism {
        /// Sequence number where the mismatch was observed.
        sequence: u32,
        /// Step name held by the journal.
        recorded: String,
        /// Step name the workflow body asked for.
        requested: String,
    },

    /// The runtime is not accepting invocations (not launched yet, or
    /// already shut down).
    #[error("runtime is not accepting new invocations")]
    NotAccepting,

    /// Execution was interrupted by a cooperative shutdown; the instance
    /// stays running in the journal and will be picked up by recovery.
    #[error("runtime is shutting down")]
    ShuttingDown,

    /// Serialization/deserialization of arguments, results or step
    /// values failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl SdkError {
    /// True for errors that must leave the instance in `Running` state
    /// rather than marking it failed: the failure is environmental, not
    /// a property of the workflow, and a later replay may succeed.
    pub(crate) fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            SdkError::Store(_) | SdkError::StoreUnavailable(_) | SdkError::ShuttingDown
        )
    }
}

/// Type alias for SDK results.
pub type Result<T> = std::result::Result<T, SdkError>;
