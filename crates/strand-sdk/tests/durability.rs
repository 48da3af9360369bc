//! End-to-end durability: crash recovery and concurrent executors
//! sharing one journal.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;

use strand_core::{InstanceRecord, Journal, StepOutcome, StepRecord, WorkflowStatus};
use strand_sdk::{MemoryStore, Runtime, RuntimeConfig, StepContext};

fn config(service: &str) -> RuntimeConfig {
    RuntimeConfig::new(service, "memory:")
}

/// A process records step one, crashes, and a fresh runtime finishes the
/// job: step one is replayed from the journal, step two runs exactly
/// once, and the instance ends up succeeded.
#[tokio::test]
async fn recovery_finishes_interrupted_instance() {
    let store = Arc::new(MemoryStore::new());

    // Journal as left behind by the crashed process.
    let journal = Journal::new(store.clone());
    let mut record = InstanceRecord::pending("order-17", "ship-order", serde_json::json!("17"));
    record.status = WorkflowStatus::Running;
    record.started_at = Some(Utc::now());
    record.executor = Some("worker-that-died".to_string());
    journal.store_instance(&record).await.unwrap();
    journal
        .record_step(
            "order-17",
            &StepRecord {
                sequence: 1,
                name: "reserve-stock".to_string(),
                outcome: StepOutcome::Value {
                    value: serde_json::json!("reservation-abc"),
                },
                completed_at: Utc::now(),
            },
        )
        .await
        .unwrap();

    let reserve_calls = Arc::new(AtomicUsize::new(0));
    let ship_calls = Arc::new(AtomicUsize::new(0));
    let reserve_in_wf = Arc::clone(&reserve_calls);
    let ship_in_wf = Arc::clone(&ship_calls);

    let runtime = Runtime::with_store(config("shipping"), store.clone()).unwrap();
    runtime
        .register("ship-order", move |ctx: StepContext, order: String| {
            let reserve_calls = Arc::clone(&reserve_in_wf);
            let ship_calls = Arc::clone(&ship_in_wf);
            async move {
                let reservation: String = ctx
                    .run_step("reserve-stock", || async move {
                        reserve_calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, std::convert::Infallible>("reservation-fresh".to_string())
                    })
                    .await?;
                let shipped: String = ctx
                    .run_step("ship", || async move {
                        ship_calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, std::convert::Infallible>(format!("shipped order {order}"))
                    })
                    .await?;
                Ok(format!("{reservation}: {shipped}"))
            }
        })
        .unwrap();

    // Recovery happens inside launch.
    runtime.launch().await.unwrap();

    assert_eq!(reserve_calls.load(Ordering::SeqCst), 0);
    assert_eq!(ship_calls.load(Ordering::SeqCst), 1);

    let finished = journal.load_instance("order-17").await.unwrap().unwrap();
    assert_eq!(finished.status, WorkflowStatus::Succeeded);
    // The pre-crash reservation survived; nothing was re-reserved.
    assert_eq!(
        finished.output,
        Some(serde_json::json!("reservation-abc: shipped order 17"))
    );

    runtime.shutdown().await;
}

/// Two runtimes recover the same instance at once over a shared store.
/// Conditional writes arbitrate each step slot: exactly one record per
/// step survives and both sides settle on the same stored outcome.
#[tokio::test]
async fn concurrent_recovery_is_arbitrated_by_the_journal() {
    let store = Arc::new(MemoryStore::new());

    let journal = Journal::new(store.clone());
    let mut record = InstanceRecord::pending("contended", "two-step", serde_json::Value::Null);
    record.status = WorkflowStatus::Running;
    journal.store_instance(&record).await.unwrap();

    let invocations = Arc::new(AtomicUsize::new(0));

    let make_runtime = |service: &str| {
        let runtime = Runtime::with_store(config(service), store.clone()).unwrap();
        let invocations = Arc::clone(&invocations);
        runtime
            .register("two-step", move |ctx: StepContext, (): ()| {
                let invocations = Arc::clone(&invocations);
                async move {
                    let a: u64 = ctx
                        .run_step("step-a", || {
                            let invocations = Arc::clone(&invocations);
                            async move {
                                invocations.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(2)).await;
                                Ok::<_, std::convert::Infallible>(1)
                            }
                        })
                        .await?;
                    let b: u64 = ctx
                        .run_step("step-b", || {
                            let invocations = Arc::clone(&invocations);
                            async move {
                                invocations.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(2)).await;
                                Ok::<_, std::convert::Infallible>(2)
                            }
                        })
                        .await?;
                    Ok(a + b)
                }
            })
            .unwrap();
        runtime
    };

    let left = make_runtime("worker-left");
    let right = make_runtime("worker-right");

    // Both launches race the recovery of the seeded instance.
    let (a, b) = tokio::join!(left.launch(), right.launch());
    a.unwrap();
    b.unwrap();

    // One record per step, whoever wrote it.
    let steps = journal.list_steps("contended").await.unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].name, "step-a");
    assert_eq!(steps[1].name, "step-b");

    // Each step body ran at most once per runtime.
    assert!(invocations.load(Ordering::SeqCst) <= 4);

    let finished = journal.load_instance("contended").await.unwrap().unwrap();
    assert_eq!(finished.status, WorkflowStatus::Succeeded);
    assert_eq!(finished.output, Some(serde_json::json!(3)));

    left.shutdown().await;
    right.shutdown().await;
}

/// A runtime restart replays a finished instance id to the same result
/// without running any code again.
#[tokio::test]
async fn restart_preserves_finished_results() {
    let store = Arc::new(MemoryStore::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let build = |calls: Arc<AtomicUsize>| {
        let runtime = Runtime::with_store(config("billing"), store.clone()).unwrap();
        let handle = runtime
            .register("charge", move |ctx: StepContext, amount: u64| {
                let calls = Arc::clone(&calls);
                async move {
                    ctx.run_step("charge-card", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, std::convert::Infallible>(format!("charged {amount}"))
                    })
                    .await
                }
            })
            .unwrap();
        (runtime, handle)
    };

    let (first_runtime, first_handle) = build(Arc::clone(&calls));
    first_runtime.launch().await.unwrap();
    let first: String = first_handle.invoke_with_id("invoice-9", 250).await.unwrap();
    first_runtime.shutdown().await;

    let (second_runtime, second_handle) = build(Arc::clone(&calls));
    second_runtime.launch().await.unwrap();
    let second: String = second_handle.invoke_with_id("invoice-9", 250).await.unwrap();
    second_runtime.shutdown().await;

    assert_eq!(first, "charged 250");
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
