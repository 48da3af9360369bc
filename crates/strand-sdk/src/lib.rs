//! Durable workflow runtime for strand.
//!
//! Workflows are plain async Rust functions registered with a
//! [`Runtime`]. Their side effects are wrapped in steps via
//! [`StepContext::run_step`]; each step's outcome is recorded in a
//! durable journal before execution continues. When a process crashes
//! mid-workflow, the next launch finds the interrupted instance, replays
//! the recorded steps without re-executing them and picks up live
//! execution exactly where the journal ends.
//!
//! ```text
//!   Runtime ──register──> WorkflowRegistry
//!      │
//!    launch ──> connect store ──> RecoveryScanner ──resume──┐
//!      │                                                    │
//!   WorkflowHandle::invoke ──────────> WorkflowEngine <─────┘
//!                                          │
//!                                     StepContext::run_step
//!                                          │
//!                                   Journal (strand-core)
//! ```
//!
//! Guarantees:
//! - A recorded step is never re-invoked; replay returns the stored
//!   value or re-raises the stored error.
//! - Concurrent executors racing one instance are arbitrated by
//!   conditional writes; the first recorded outcome wins everywhere.
//! - Re-invoking a finished instance id returns the stored result.

#![deny(missing_docs)]

mod config;
mod engine;
mod error;
mod recovery;
mod registry;
mod runtime;
mod step;

pub use config::{RetryPolicy, RuntimeConfig};
pub use error::{Result, SdkError};
pub use registry::{ErasedWorkflowFn, WorkflowFuture, WorkflowRegistry};
pub use runtime::{Runtime, WorkflowHandle};
pub use step::StepContext;

pub use strand_core::{
    InstanceRecord, LogStore, MemoryStore, StepOutcome, StepRecord, WorkflowStatus,
};
