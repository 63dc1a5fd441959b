//! hitflow command-line interface.
//!
//! Runs a configured process chain over a JSON-lines event file, describes
//! a pipeline configuration, or generates synthetic Gaussian hit clouds.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Parser, Subcommand};

use hitflow_core::{Event, Hit, HitCloud};
use hitflow_pipeline::{EventReader, EventWriter, PipelineConfig, PipelineRunner};
use hitflow_processes::random::gaussian;
use hitflow_processes::ProcessRegistry;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    Pipeline(#[from] hitflow_pipeline::Error),

    #[error("{0}")]
    Process(#[from] hitflow_processes::Error),

    #[error("invalid argument: {0}")]
    Argument(String),
}

/// Concurrent process chains for particle-detector hit clouds.
#[derive(Parser)]
#[command(name = "hitflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose (debug) logging; RUST_LOG takes precedence
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline over a JSON-lines event file
    Run {
        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Input events (JSON lines)
        #[arg(short, long)]
        input: PathBuf,

        /// Output events (JSON lines)
        #[arg(short, long)]
        output: PathBuf,

        /// Override the configured number of workers
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Validate a configuration and print the resolved chain
    Describe {
        /// Pipeline configuration (JSON); lists the known processes if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write synthetic Gaussian hit clouds as JSON lines
    Generate {
        /// Number of events
        #[arg(short, long, default_value = "100")]
        events: u64,

        /// Hits per event
        #[arg(long, default_value = "50")]
        hits: usize,

        /// Random seed
        #[arg(short, long, default_value = "1")]
        seed: u64,

        /// Cloud centre as x,y,z (mm)
        #[arg(long, default_value = "0,0,0", value_parser = parse_triplet)]
        center: [f64; 3],

        /// Cloud spread as sx,sy,sz (mm)
        #[arg(long, default_value = "5,5,5", value_parser = parse_triplet)]
        sigma: [f64; 3],

        /// Energy per hit (keV)
        #[arg(long, default_value = "1.0")]
        energy: f64,

        /// Output events (JSON lines)
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn parse_triplet(text: &str) -> std::result::Result<[f64; 3], String> {
    let values: Vec<f64> = text
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{v}': {e}")))
        .collect::<std::result::Result<_, _>>()?;
    match values[..] {
        [x, y, z] => Ok([x, y, z]),
        _ => Err(format!("expected three comma-separated numbers, got '{text}'")),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            input,
            output,
            workers,
        } => run(&config, &input, &output, workers),
        Commands::Describe { config } => describe(config.as_deref()),
        Commands::Generate {
            events,
            hits,
            seed,
            center,
            sigma,
            energy,
            output,
        } => generate(events, hits, seed, center, sigma, energy, &output),
    }
}

fn run(config_path: &Path, input: &Path, output: &Path, workers: Option<usize>) -> Result<()> {
    let config = PipelineConfig::load(config_path)?;
    let registry = ProcessRegistry::default();

    let mut runner_config = config.runner_config();
    if let Some(workers) = workers {
        runner_config = runner_config.with_workers(workers);
    }
    let mut runner = PipelineRunner::new(runner_config);
    if let Some(geometry) = config.geometry()? {
        runner = runner.with_geometry(geometry);
    }

    log::info!("reading {}", input.display());
    let reader = EventReader::open(input)?;
    let mut writer = EventWriter::create(output)?;
    let summary = runner.try_run(|_| config.build_chain(&registry), reader, &mut writer)?;
    writer.flush()?;

    println!(
        "Processed {} events in {:.2}s ({:.0} events/s)",
        summary.events_in,
        summary.elapsed.as_secs_f64(),
        summary.throughput()
    );
    println!("Written: {} -> {}", summary.events_out, output.display());
    println!("Dropped: {}", summary.dropped);
    for report in &summary.workers {
        println!(
            "  worker {}: {} in, {} out, {} dropped, {} flushes",
            report.worker, report.received, report.emitted, report.dropped, report.flushes
        );
    }
    Ok(())
}

fn describe(config_path: Option<&Path>) -> Result<()> {
    let registry = ProcessRegistry::default();
    let Some(path) = config_path else {
        println!("Available processes:");
        for name in registry.names() {
            println!("  {}", name);
        }
        return Ok(());
    };

    let config = PipelineConfig::load(path)?;
    config.validate(&registry)?;
    let runner = config.runner_config();
    println!("Workers: {}", runner.workers);
    println!("Queue capacity: {}", runner.queue_capacity);
    println!("Flush size: {}", runner.flush_size);
    println!("Seed: {}", runner.seed);

    if let Some(geometry) = config.geometry()? {
        println!(
            "Readout: {} planes, {} channels",
            geometry.len(),
            geometry.channel_count()
        );
    }

    let chain = config.build_chain(&registry)?;
    if let (Some(input), Some(output)) = (chain.input_kind(), chain.output_kind()) {
        println!("Chain: {} -> {}", input, output);
    }
    for (i, (name, metadata)) in chain.metadata().into_iter().enumerate() {
        println!("  {}. {}", i + 1, name);
        for (key, value) in metadata {
            println!("       {} = {}", key, value);
        }
    }
    Ok(())
}

fn generate(
    events: u64,
    hits: usize,
    seed: u64,
    center: [f64; 3],
    sigma: [f64; 3],
    energy: f64,
    output: &Path,
) -> Result<()> {
    if sigma.iter().any(|s| !(*s >= 0.0)) {
        return Err(CliError::Argument(format!("sigma must be non-negative, got {sigma:?}")));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut writer = EventWriter::create(output)?;

    for id in 0..events {
        let cloud: HitCloud = (0..hits)
            .map(|_| {
                Hit::new(
                    gaussian(&mut rng, center[0], sigma[0]),
                    gaussian(&mut rng, center[1], sigma[1]),
                    gaussian(&mut rng, center[2], sigma[2]),
                    energy,
                )
            })
            .collect();
        writer.write(&Event::hits(id, cloud))?;
    }
    writer.flush()?;

    println!(
        "Wrote {} events of {} hits to {}",
        writer.count(),
        hits,
        output.display()
    );
    Ok(())
}
