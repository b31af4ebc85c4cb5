//! Command-line interface components.

use crate::config::ProcessorConfig;
use crate::error::{BatteryError, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "battery-processor")]
#[command(about = "Convert NASA battery aging MAT-files to flat per-timestep CSV tables")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// A battery `.mat` file or a directory of them
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output directory for CSV files (default: `csv/` next to the input)
    #[arg(short, long, value_name = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Parse and report per-cycle outcomes without writing files
    #[arg(long)]
    pub inspect_only: bool,

    /// Add moving-average `*_smooth` columns for measured signals
    #[arg(long)]
    pub smooth: bool,

    /// Smoothing window in samples (odd); implies --smooth
    #[arg(long, value_name = "N")]
    pub smooth_window: Option<usize>,

    /// Maximum number of files parsed at the same time
    #[arg(long, value_name = "N")]
    pub max_concurrent_files: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Defaults, then the config file, then command-line flags
    pub fn build_config(&self) -> Result<ProcessorConfig> {
        let mut config = match &self.config {
            Some(path) => ProcessorConfig::from_file(path)?,
            None => ProcessorConfig::default(),
        };

        if let Some(max_files) = self.max_concurrent_files {
            config = config.with_max_concurrent_files(max_files);
        }
        if self.inspect_only {
            config = config.with_inspect_only();
        }
        if self.smooth || self.smooth_window.is_some() {
            let window = self.smooth_window.unwrap_or(config.smoothing.window);
            config = config.with_smoothing(window);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Set up structured logging on stderr
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("battery_processor={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| BatteryError::Configuration {
            message: format!("Failed to initialize logging: {}", e),
        })?;

    tracing::debug!("Logging initialized at level: {}", log_level);
    Ok(())
}
