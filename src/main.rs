//! Sobelgrid CLI - parallel Sobel edge detection.
//!
//! Reads an RGB portable pixmap, converts it to intensity, detects edges
//! across several workers and writes a binary graymap.
//!
//! # Usage
//!
//! ```text
//! sobelgrid [OPTIONS] [INPUT] [OUTPUT]
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::debug;
use sobelgrid::prelude::*;

/// Parallel Sobel edge detection over row-partitioned workers.
#[derive(Parser)]
#[command(name = "sobelgrid", version)]
struct Cli {
    /// Input pixmap (P6 or P3).
    #[arg(default_value = "flowers.ppm")]
    input: PathBuf,

    /// Output graymap (P5).
    #[arg(default_value = "sobelHybrid.pgm")]
    output: PathBuf,

    /// Number of workers; must divide the image height.
    #[arg(short, long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    workers: Option<usize>,

    /// Stencil threads per worker (0 = one per core).
    #[arg(short, long)]
    threads: Option<usize>,

    /// Binary threshold on the gradient magnitude.
    #[arg(long)]
    threshold: Option<u32>,

    /// Thresholding policy.
    #[arg(long, value_enum)]
    policy: Option<Policy>,

    /// Exchange halo rows so partition seams keep their gradients.
    #[arg(long)]
    halo: bool,

    /// TOML configuration file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the run report as JSON instead of the timing line.
    #[arg(long)]
    json: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

/// Thresholding policy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    /// 255 where gx² + gy² ≥ threshold², else 0.
    Binary,
    /// The gradient magnitude, rounded and clamped to 255.
    Magnitude,
}

impl From<Policy> for ThresholdPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Binary => ThresholdPolicy::Binary,
            Policy::Magnitude => ThresholdPolicy::Magnitude,
        }
    }
}

impl Cli {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        if let Some(threshold) = self.threshold {
            config = config.with_threshold(threshold);
        }
        if let Some(policy) = self.policy {
            config = config.with_policy(policy.into());
        }
        if self.halo {
            config = config.with_boundary(BoundaryPolicy::HaloExchange);
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.pipeline_config()?;
    debug!("Configuration: {:?}", config);

    let source = PortableImageFile::new(&cli.input);
    let mut sink = GraymapFile::new(&cli.output);
    let report = Orchestrator::new(config)
        .run(&source, &mut sink)
        .with_context(|| {
            format!(
                "edge detection from {} to {} failed",
                cli.input.display(),
                cli.output.display()
            )
        })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Execution Time: {:.6} seconds",
            report.slowest_kernel().as_secs_f64()
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
