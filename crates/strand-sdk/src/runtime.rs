//! Runtime supervisor: lifecycle, store wiring and typed invocation.
//!
//! The runtime owns the registry, the store connection and the
//! cancellation token. `launch` connects the store, runs a recovery pass
//! over interrupted instances and only then starts accepting new
//! invocations; `shutdown` stops accepting, trips the token and waits
//! for in-flight executions to drain at their next step boundary.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use strand_core::{LogStore, MemoryStore, PostgresStore, SqliteStore};

use crate::config::{RetryPolicy, RuntimeConfig};
use crate::engine::WorkflowEngine;
use crate::error::{Result, SdkError};
use crate::recovery::RecoveryScanner;
use crate::registry::WorkflowRegistry;
use crate::step::StepContext;

struct RuntimeInner {
    config: RuntimeConfig,
    registry: Arc<RwLock<WorkflowRegistry>>,
    injected_store: Option<Arc<dyn LogStore>>,
    engine: OnceLock<WorkflowEngine>,
    launch_lock: Mutex<()>,
    accepting: AtomicBool,
    shut_down: AtomicBool,
    cancel: CancellationToken,
    in_flight: AtomicUsize,
    drained: Notify,
}

/// The durable workflow runtime.
///
/// Cheap to clone; all clones share one lifecycle. Typical use:
///
/// ```no_run
/// # use strand_sdk::{Runtime, RuntimeConfig, StepContext};
/// # async fn example() -> strand_sdk::Result<()> {
/// let runtime = Runtime::new(RuntimeConfig::new("worker", "sqlite:.data/strand.db"))?;
/// let greet = runtime.register("greet", |ctx: StepContext, name: String| async move {
///     ctx.run_step("uppercase", || async move {
///         Ok::<_, std::convert::Infallible>(name.to_uppercase())
///     })
///     .await
/// })?;
/// runtime.launch().await?;
/// let output: String = greet.invoke("world".to_string()).await?;
/// runtime.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").finish_non_exhaustive()
    }
}

impl Runtime {
    /// Create a runtime that will connect to the store named by
    /// `config.store_url` at launch.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a runtime over an already-open store. The store URL in the
    /// config is ignored; everything else applies as usual.
    pub fn with_store(config: RuntimeConfig, store: Arc<dyn LogStore>) -> Result<Self> {
        Self::build(config, Some(store))
    }

    fn build(config: RuntimeConfig, injected_store: Option<Arc<dyn LogStore>>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RuntimeInner {
                config,
                registry: Arc::new(RwLock::new(WorkflowRegistry::new())),
                injected_store,
                engine: OnceLock::new(),
                launch_lock: Mutex::new(()),
                accepting: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                in_flight: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
        })
    }

    /// Register a workflow function and get back a typed handle for
    /// invoking it. Names are unique; duplicate registration fails.
    pub fn register<A, R, F, Fut>(&self, name: &str, workflow: F) -> Result<WorkflowHandle<A, R>>
    where
        A: Serialize + DeserializeOwned + Send + 'static,
        R: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(StepContext, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        self.inner
            .registry
            .write()
            .expect("registry lock poisoned")
            .register(name, workflow)?;
        info!(workflow = %name, "workflow registered");
        Ok(WorkflowHandle {
            inner: Arc::clone(&self.inner),
            name: name.to_string(),
            _signature: PhantomData,
        })
    }

    /// Connect the store, recover interrupted instances and start
    /// accepting invocations. Idempotent: a second call on a launched
    /// runtime is a no-op.
    ///
    /// The lifecycle is one-way: once [`shutdown`](Self::shutdown) has
    /// run, the cancellation token is permanently tripped and this
    /// returns [`SdkError::ShuttingDown`]. Build a new runtime instead.
    pub async fn launch(&self) -> Result<()> {
        let _guard = self.inner.launch_lock.lock().await;
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(SdkError::ShuttingDown);
        }
        if self.inner.accepting.load(Ordering::SeqCst) {
            return Ok(());
        }

        let store = match &self.inner.injected_store {
            Some(store) => Arc::clone(store),
            None => self.open_store().await?,
        };
        store
            .health_check()
            .await
            .map_err(|e| SdkError::StoreUnavailable(e.to_string()))?;

        let engine = self
            .inner
            .engine
            .get_or_init(|| {
                WorkflowEngine::new(
                    strand_core::Journal::new(store),
                    Arc::clone(&self.inner.registry),
                    self.inner.config.service_name.clone(),
                    self.inner.cancel.clone(),
                )
            })
            .clone();

        let scanner = RecoveryScanner::new(
            engine,
            self.inner.config.recovery_concurrency,
            RetryPolicy::default(),
        );
        let recovered = scanner.recover_all().await?;

        self.inner.accepting.store(true, Ordering::SeqCst);
        info!(
            service = %self.inner.config.service_name,
            recovered,
            "runtime launched"
        );
        Ok(())
    }

    /// Stop accepting invocations and drain in-flight executions.
    ///
    /// In-flight workflows stop at their next fresh step boundary (a
    /// running step is never interrupted mid-flight); their instances
    /// stay running in the journal for the next launch to recover.
    /// Terminal for this runtime: it cannot be relaunched afterwards.
    pub async fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        self.inner.accepting.store(false, Ordering::SeqCst);
        self.inner.cancel.cancel();
        info!("runtime shutting down, draining in-flight executions");

        loop {
            let drained = self.inner.drained.notified();
            if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
            drained.await;
        }
        info!("runtime shut down");
    }

    async fn open_store(&self) -> Result<Arc<dyn LogStore>> {
        let url = self.inner.config.store_url.as_str();
        let timeout = self.inner.config.connect_timeout;

        let connect = async {
            let store: Arc<dyn LogStore> = if url.starts_with("memory:") {
                Arc::new(MemoryStore::new())
            } else if let Some(path) = url.strip_prefix("sqlite:") {
                // Plain paths go through from_path so the database file
                // and its parent directories get created; URLs carrying
                // their own query options are passed through as-is.
                let store = if path.contains('?') {
                    SqliteStore::connect(url).await
                } else {
                    SqliteStore::from_path(path).await
                };
                Arc::new(store.map_err(|e| SdkError::StoreUnavailable(e.to_string()))?)
            } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
                Arc::new(
                    PostgresStore::connect(url)
                        .await
                        .map_err(|e| SdkError::StoreUnavailable(e.to_string()))?,
                )
            } else {
                return Err(SdkError::Config(format!(
                    "unsupported store URL scheme: '{url}' (expected memory:, sqlite: or postgres://)"
                )));
            };
            Ok(store)
        };

        match tokio::time::timeout(timeout, connect).await {
            Ok(result) => result,
            Err(_) => Err(SdkError::StoreUnavailable(format!(
                "store connection timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

/// Typed handle to a registered workflow, the entry point for starting
/// executions.
pub struct WorkflowHandle<A, R> {
    inner: Arc<RuntimeInner>,
    name: String,
    _signature: PhantomData<fn(A) -> R>,
}

impl<A, R> Clone for WorkflowHandle<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            name: self.name.clone(),
            _signature: PhantomData,
        }
    }
}

impl<A, R> WorkflowHandle<A, R>
where
    A: Serialize + Send + 'static,
    R: DeserializeOwned + Send + 'static,
{
    /// The registered workflow name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a new instance under a generated id and wait for its result.
    pub async fn invoke(&self, args: A) -> Result<R> {
        let instance_id = Uuid::new_v4().to_string();
        self.invoke_with_id(&instance_id, args).await
    }

    /// Start (or join) the instance with the given id.
    ///
    /// Invoking an id that already ran to completion returns the stored
    /// result without executing anything, which makes retries from the
    /// caller's side safe.
    pub async fn invoke_with_id(&self, instance_id: &str, args: A) -> Result<R> {
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(SdkError::NotAccepting);
        }
        let engine = self
            .inner
            .engine
            .get()
            .ok_or(SdkError::NotAccepting)?
            .clone();

        let _guard = InFlightGuard::enter(&self.inner);
        let args = serde_json::to_value(args)?;
        let output = engine.execute_new(&self.name, instance_id, args).await?;
        serde_json::from_value(output)
            .map_err(|e| SdkError::Serialization(format!("workflow result: {e}")))
    }
}

/// Tracks one in-flight execution for shutdown draining.
struct InFlightGuard {
    inner: Arc<RuntimeInner>,
}

impl InFlightGuard {
    fn enter(inner: &Arc<RuntimeInner>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            inner: Arc::clone(inner),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}
