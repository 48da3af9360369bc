//! Runtime lifecycle: fail-fast configuration, graceful shutdown and
//! the hand-off from a drained execution to the next launch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use strand_core::{Journal, WorkflowStatus};
use strand_sdk::{MemoryStore, Runtime, RuntimeConfig, SdkError, StepContext};

#[test]
fn missing_store_url_fails_before_any_store_contact() {
    let err = Runtime::new(RuntimeConfig::new("worker", "")).unwrap_err();
    assert!(matches!(err, SdkError::Config(_)));

    let err = Runtime::new(RuntimeConfig::new("", "memory:")).unwrap_err();
    assert!(matches!(err, SdkError::Config(_)));
}

/// Shutdown drains an in-flight workflow at its next step boundary: the
/// running step finishes, the next fresh step is refused, the instance
/// stays running in the journal, and the next launch completes it.
#[tokio::test]
async fn shutdown_drains_in_flight_and_recovery_completes_later() {
    let store = Arc::new(MemoryStore::new());
    let (step_one_done_tx, mut step_one_done_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    let first_attempt = Arc::new(AtomicBool::new(true));
    let step_two_calls = Arc::new(AtomicUsize::new(0));

    let build = |store: Arc<MemoryStore>| {
        let runtime =
            Runtime::with_store(RuntimeConfig::new("worker", "memory:"), store).unwrap();
        let tx = step_one_done_tx.clone();
        let first_attempt = Arc::clone(&first_attempt);
        let step_two_calls = Arc::clone(&step_two_calls);
        let handle = runtime
            .register("pausable", move |ctx: StepContext, (): ()| {
                let tx = tx.clone();
                let first_attempt = Arc::clone(&first_attempt);
                let step_two_calls = Arc::clone(&step_two_calls);
                async move {
                    let one: i64 = ctx
                        .run_step("one", || async {
                            Ok::<_, std::convert::Infallible>(1)
                        })
                        .await?;
                    let _ = tx.send(());
                    // First attempt parks here until the runtime asks it
                    // to stop, so the test can shut down mid-workflow.
                    if first_attempt.swap(false, Ordering::SeqCst) {
                        while !ctx.is_cancelled() {
                            tokio::time::sleep(Duration::from_millis(1)).await;
                        }
                    }
                    let two: i64 = ctx
                        .run_step("two", || {
                            let step_two_calls = Arc::clone(&step_two_calls);
                            async move {
                                step_two_calls.fetch_add(1, Ordering::SeqCst);
                                Ok::<_, std::convert::Infallible>(2)
                            }
                        })
                        .await?;
                    Ok(one + two)
                }
            })
            .unwrap();
        (runtime, handle)
    };

    let (runtime, handle) = build(store.clone());
    runtime.launch().await.unwrap();

    let invocation = tokio::spawn(async move { handle.invoke_with_id("wf-paused", ()).await });
    step_one_done_rx.recv().await.unwrap();

    // The workflow is parked between its steps; shutdown trips the token
    // and waits for it to bail out at the step-two boundary.
    runtime.shutdown().await;

    let err = invocation.await.unwrap().unwrap_err();
    assert!(matches!(err, SdkError::ShuttingDown));
    assert_eq!(step_two_calls.load(Ordering::SeqCst), 0);

    let journal = Journal::new(store.clone());
    let parked = journal.load_instance("wf-paused").await.unwrap().unwrap();
    assert_eq!(parked.status, WorkflowStatus::Running);

    // A later launch recovers the instance and finishes it.
    let (next_runtime, _handle) = build(store.clone());
    next_runtime.launch().await.unwrap();
    drop(step_one_done_rx);

    let finished = journal.load_instance("wf-paused").await.unwrap().unwrap();
    assert_eq!(finished.status, WorkflowStatus::Succeeded);
    assert_eq!(finished.output, Some(serde_json::json!(3)));
    assert_eq!(step_two_calls.load(Ordering::SeqCst), 1);

    next_runtime.shutdown().await;
}

/// launch() connects, recovers and then accepts; calling it twice is
/// harmless and the second call does not re-run recovery side effects.
#[tokio::test]
async fn relaunch_on_live_runtime_is_a_no_op() {
    let runtime = Runtime::new(RuntimeConfig::new("worker", "memory:")).unwrap();
    let wf = runtime
        .register("noop", |_ctx: StepContext, (): ()| async move { Ok(()) })
        .unwrap();

    runtime.launch().await.unwrap();
    runtime.launch().await.unwrap();
    wf.invoke(()).await.unwrap();
    runtime.shutdown().await;
}
