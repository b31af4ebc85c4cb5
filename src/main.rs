use anyhow::Context;
use battery_processor::cli::{Args, setup_logging};
use battery_processor::error::BatteryError;
use battery_processor::models::ProcessingStats;
use battery_processor::processor::BatchProcessor;
use clap::Parser;
use std::process;
use tokio_util::sync::CancellationToken;

fn main() {
    let args = Args::parse();

    match run(args) {
        // Some files could not be converted
        Ok(stats) if stats.files_failed > 0 => process::exit(2),
        Ok(_) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

fn run(args: Args) -> anyhow::Result<ProcessingStats> {
    setup_logging(&args)?;
    let config = args.build_config().context("Invalid configuration")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

    // Create cancellation token for coordinating graceful shutdown
    let cancellation_token = CancellationToken::new();
    let processor = BatchProcessor::new(args.input.clone(), args.output_dir.clone())?
        .with_config(config)
        .with_cancellation(cancellation_token.clone());

    let stats = runtime.block_on(async {
        let shutdown_signal = async {
            if tokio::signal::ctrl_c().await.is_err() {
                // No signal handler available; never resolve
                std::future::pending::<()>().await;
            }
            cancellation_token.cancel();
        };

        tokio::select! {
            result = processor.process() => result,
            _ = shutdown_signal => {
                eprintln!("\nReceived CTRL+C, shutting down gracefully...");
                Err(BatteryError::ProcessingInterrupted {
                    reason: "Processing interrupted by user".to_string(),
                })
            }
        }
    })?;

    Ok(stats)
}
