use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use solar_pipeline::config::{load_config, PipelineConfig};
use solar_pipeline::file_processor::FileProcessor;
use solar_pipeline::parallel::BatchRunner;
use solar_pipeline::report::ReportStatus;

#[derive(Parser, Debug)]
#[command(name = "solar_pipeline")]
#[command(about = "Validate solar-panel telemetry CSV exports and write per-file JSON reports", long_about = None)]
struct Cli {
    /// JSON configuration file (bounds, column names, output settings)
    #[arg(long, global = true, env = "SOLAR_PIPELINE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory receiving one `<stem>.json` report per input file
    #[arg(long, global = true, env = "SOLAR_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Round avg, std and total_energy_kwh to this many decimals
    #[arg(long, global = true)]
    precision: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a single CSV file
    Process {
        /// Input CSV file
        input: PathBuf,
    },
    /// Process every CSV file in a directory
    Batch {
        /// Directory of incoming CSV files
        #[arg(long, env = "SOLAR_INPUT_DIR")]
        input_dir: Option<PathBuf>,

        /// Also descend into subdirectories
        #[arg(long)]
        recursive: bool,

        /// Worker threads (defaults to one per CPU)
        #[arg(long, env = "SOLAR_WORKERS")]
        workers: Option<usize>,
    },
}

fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if cli.precision.is_some() {
        config.precision = cli.precision;
    }
    if let Command::Batch {
        input_dir,
        recursive,
        workers,
    } = &cli.command
    {
        if let Some(dir) = input_dir {
            config.input_dir = dir.clone();
        }
        config.recursive |= *recursive;
        if workers.is_some() {
            config.workers = *workers;
        }
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let processor = FileProcessor::new(&config);

    match &cli.command {
        Command::Process { input } => {
            let report = processor.process(input);
            println!("{}", report.to_json().context("Failed to render report")?);
            if report.status == ReportStatus::Failed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Batch { .. } => {
            info!("Processing directory {}", config.input_dir.display());
            let mut runner = BatchRunner::new(processor).recursive(config.recursive);
            if let Some(workers) = config.workers {
                runner = runner.with_workers(workers);
            }

            let summary = runner
                .run_dir(&config.input_dir)
                .with_context(|| format!("Batch over {} aborted", config.input_dir.display()))?;
            summary.print_summary();

            if let Some(reason) = &summary.aborted {
                error!("Batch aborted: {}", reason);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
