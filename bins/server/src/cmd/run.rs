use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use meterflow_api::Diagnostics;
use pipeline::{PipelineRunner, StageChain, TracingDiagnostics, spawn_runner};

use crate::config::{Effective, RunArgs};
use crate::error::ServerError;

pub async fn run(args: RunArgs) -> Result<(), ServerError> {
    let eff = Effective::new(&args)?;
    tracing::info!(
        config = %args.config,
        input = %eff.input,
        output = %eff.output,
        concurrency = eff.runner.concurrency,
        ack = %eff.runner.ack,
        "meterflow starting"
    );

    // --- Adapters ---
    let source = transport_lines::open_source(&eff.input, &eff.transport).await?;
    let sink = transport_lines::open_sink(&eff.output).await?;

    // --- Runner ---
    let diagnostics: Arc<dyn Diagnostics> = Arc::new(TracingDiagnostics);
    let chain = StageChain::standard(diagnostics.clone());
    let runner = PipelineRunner::new(
        "meterflow",
        Arc::new(source),
        Arc::new(sink),
        chain,
        diagnostics,
        &eff.runner,
    )?;

    let token = CancellationToken::new();
    let mut handle = spawn_runner(runner, token.clone());

    // --- Wait: конец входа или Ctrl+C ---
    let joined = tokio::select! {
        joined = &mut handle => joined,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutdown signal received, draining in-flight records");
            token.cancel();
            handle.await
        }
    };

    let stats = joined??;
    tracing::info!(?stats, "meterflow stopped");
    Ok(())
}
