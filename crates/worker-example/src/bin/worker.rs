//! Worker Example - A minimal durable worker process.
//!
//! This example shows:
//! - Loading runtime configuration from the environment
//! - Registering a workflow with one durable step
//! - Launching the runtime (store connection + crash recovery)
//! - Optionally invoking a sample workflow instance
//! - Parking until ctrl-c, then shutting down gracefully
//!
//! Run with:
//!   STRAND_SERVICE_NAME=worker-example \
//!   STRAND_STORE_URL=sqlite:.data/strand.db \
//!   STRAND_RUN_SAMPLE_WORKFLOW=1 \
//!   cargo run -p worker-example --bin worker

use strand_sdk::{Runtime, RuntimeConfig, StepContext};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Fails fast when STRAND_SERVICE_NAME or STRAND_STORE_URL is unset.
    let config = RuntimeConfig::from_env()?;
    let runtime = Runtime::new(config)?;

    let sample = runtime.register(
        "sample-workflow",
        |ctx: StepContext, (): ()| async move {
            let result: String = ctx
                .run_step("step-one", || async {
                    info!("executing step-one");
                    Ok::<_, std::convert::Infallible>("ok".to_string())
                })
                .await?;
            info!(result = %result, "workflow body complete");
            Ok(result)
        },
    )?;

    // Connects the store and recovers any instance a previous run left
    // behind before accepting new invocations.
    runtime.launch().await?;
    info!("worker launched and accepting invocations");

    if std::env::var("STRAND_RUN_SAMPLE_WORKFLOW").as_deref() == Ok("1") {
        let output = sample.invoke(()).await?;
        info!(output = %serde_json::json!(output), "sample workflow finished");
    }

    info!("worker parked, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    info!("worker stopped");
    Ok(())
}
