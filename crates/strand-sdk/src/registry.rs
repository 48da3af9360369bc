//! Workflow definition registry.
//!
//! Workflow functions are registered under a unique name with a
//! strongly-typed signature (arguments and result), then erased to a
//! single JSON-in/JSON-out function type so the engine and the recovery
//! scanner can drive any definition uniformly. The registry is a plain
//! value owned by the runtime; there is no process-wide singleton.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, SdkError};
use crate::step::StepContext;

/// Boxed future returned by an erased workflow function.
pub type WorkflowFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>;

/// Type-erased workflow function: deserializes its arguments, runs the
/// typed body with a step context, serializes the result.
pub type ErasedWorkflowFn =
    Arc<dyn Fn(StepContext, serde_json::Value) -> WorkflowFuture + Send + Sync>;

/// Registry mapping workflow names to their registered functions.
#[derive(Clone, Default)]
pub struct WorkflowRegistry {
    definitions: HashMap<String, ErasedWorkflowFn>,
}

impl WorkflowRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow function under `name`.
    ///
    /// The signature is validated here: arguments must deserialize and
    /// the result must serialize, so a definition that registers is a
    /// definition the engine can always invoke. Duplicate names are
    /// rejected — definitions are immutable once registered.
    pub fn register<A, R, F, Fut>(&mut self, name: &str, workflow: F) -> Result<()>
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(StepContext, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        if name.trim().is_empty() {
            return Err(SdkError::Config(
                "workflow name must not be empty".to_string(),
            ));
        }
        if self.definitions.contains_key(name) {
            return Err(SdkError::DuplicateWorkflow(name.to_string()));
        }

        let workflow = Arc::new(workflow);
        let erased: ErasedWorkflowFn = Arc::new(move |ctx, args| {
            let workflow = Arc::clone(&workflow);
            Box::pin(async move {
                let args: A = serde_json::from_value(args)
                    .map_err(|e| SdkError::Serialization(format!("workflow arguments: {}", e)))?;
                let result = workflow(ctx, args).await?;
                serde_json::to_value(result)
                    .map_err(|e| SdkError::Serialization(format!("workflow result: {}", e)))
            })
        });

        self.definitions.insert(name.to_string(), erased);
        Ok(())
    }

    /// Look up a definition by name.
    pub fn get(&self, name: &str) -> Option<&ErasedWorkflowFn> {
        self.definitions.get(name)
    }

    /// True if a definition with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// True if no definitions are registered.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
