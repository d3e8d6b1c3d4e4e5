// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Trace Replay Tool

Runs a recorded impulse trace (or the simulated headband) through the full
command pipeline and logs every command event.

Usage:
  cargo run --bin replay_trace -- --trace session.json
  cargo run --bin replay_trace -- --seconds 30 --seed 7 --debug impulse-command
  cargo run --bin replay_trace -- --trace session.json --profile tuned.toml --events-out events.json
*/

use anyhow::{Context, Result};
use clap::Parser;
use impulse::command::{CommandSink, LoggingSink, SinkError};
use impulse::config::{load_config, load_profile, validate_config, ImpulseConfig};
use impulse::driver::{AcquisitionLoop, PumpStatus, SensorDriver, SimulatedNiaDriver, TraceDriver};
use impulse::observability::{debug_flags_help, init_logging, CrateDebugFlags, LoggingConfig};
use impulse::structures::CommandEvent;
use impulse::{CommandPipeline, ShutdownReport};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::info;

/// Replay an impulse trace through the command pipeline
#[derive(Parser, Debug)]
#[command(name = "replay_trace", version, long_about = None)]
struct Args {
    /// Recorded trace (JSON); defaults to `driver.trace_path`, else the simulated driver
    #[arg(short, long)]
    trace: Option<PathBuf>,

    /// Configuration file (defaults to the impulse.toml search path)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Calibration profile replacing the `[profile]` section
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Seconds of simulated signal when no trace is given
    #[arg(long, default_value_t = 10.0)]
    seconds: f64,

    /// Seed for the simulated driver
    #[arg(long)]
    seed: Option<u64>,

    /// Pace acquisition at the sampling rate on its own thread
    #[arg(long, default_value_t = false)]
    real_time: bool,

    /// Write delivered events to this JSON file
    #[arg(long)]
    events_out: Option<PathBuf>,

    /// Comma-separated crates to log at debug level, or `all`
    #[arg(long, value_name = "CRATES")]
    debug: Option<String>,

    /// Print the crates accepted by --debug and exit
    #[arg(long, default_value_t = false)]
    list_debug_targets: bool,

    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

/// LoggingSink that also keeps what it delivered
struct ReplaySink {
    logging: LoggingSink,
    events: Vec<CommandEvent>,
}

impl CommandSink for ReplaySink {
    fn publish(&mut self, event: &CommandEvent) -> Result<(), SinkError> {
        self.logging.publish(event)?;
        self.events.push(*event);
        Ok(())
    }

    fn hold_is_idempotent(&self) -> bool {
        self.logging.hold_is_idempotent()
    }

    fn name(&self) -> &str {
        "replay"
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_debug_targets {
        println!("{}", debug_flags_help());
        return Ok(());
    }

    let config = load_configuration(&args)?;

    let mut debug_flags = CrateDebugFlags::default();
    if let Some(list) = &args.debug {
        debug_flags.merge_list(list);
    }
    if let Ok(list) = std::env::var("IMPULSE_DEBUG") {
        debug_flags.merge_list(&list);
    }
    let mut logging = LoggingConfig::with_level(if args.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    });
    logging.file_dir = config.logging.file_dir.clone();
    let _logging_guard = init_logging(&logging, &debug_flags)?;

    let driver: Box<dyn SensorDriver> = match &config.driver.trace_path {
        Some(path) => Box::new(
            TraceDriver::from_path(path)
                .with_context(|| format!("Failed to open trace {}", path.display()))?,
        ),
        None => Box::new(SimulatedNiaDriver::from_config(&config.driver)),
    };
    if driver.sampling_rate() != config.profile.sampling_rate_hz {
        anyhow::bail!(
            "Driver samples at {} Hz but the profile expects {} Hz",
            driver.sampling_rate(),
            config.profile.sampling_rate_hz
        );
    }
    let sample_budget = match &config.driver.trace_path {
        Some(_) => None,
        None => Some((args.seconds * driver.sampling_rate()).round() as u64),
    };

    let sink = ReplaySink {
        logging: LoggingSink::new(),
        events: Vec::new(),
    };
    let mut pipeline = CommandPipeline::new(&config, sink)?;
    info!(
        "Replaying from {} driver at {} Hz",
        driver.name(),
        driver.sampling_rate()
    );

    if args.real_time {
        replay_threaded(&mut pipeline, driver, &config, sample_budget)?;
    } else {
        replay_synchronous(&mut pipeline, driver, &config, sample_budget)?;
    }

    let report = pipeline.shutdown()?;
    let sink = pipeline.into_sink();
    print_summary(&report, &sink.events);

    if let Some(path) = &args.events_out {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &sink.events)?;
        println!("Events written to {}", path.display());
    }

    Ok(())
}

fn load_configuration(args: &Args) -> Result<ImpulseConfig> {
    let mut overrides = HashMap::new();
    if let Some(seed) = args.seed {
        overrides.insert("seed".to_string(), seed.to_string());
    }
    if let Some(trace) = &args.trace {
        overrides.insert("trace_path".to_string(), trace.display().to_string());
    }

    let mut config = match load_config(args.config.as_deref(), Some(&overrides)) {
        Ok(config) => config,
        // No file anywhere: run on defaults plus the command line
        Err(impulse::config::ConfigError::FileNotFound(_)) if args.config.is_none() => {
            let mut config = ImpulseConfig::default();
            impulse::config::apply_environment_overrides(&mut config)?;
            impulse::config::apply_cli_overrides(&mut config, &overrides)?;
            config
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    if let Some(path) = &args.profile {
        config.profile = load_profile(path)
            .with_context(|| format!("Failed to load profile {}", path.display()))?;
    }
    if config.driver.trace_path.is_none() {
        config.driver.sampling_rate_hz = config.profile.sampling_rate_hz;
    }
    validate_config(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Pump and process in lockstep; deterministic and as fast as possible
fn replay_synchronous(
    pipeline: &mut CommandPipeline<ReplaySink>,
    driver: Box<dyn SensorDriver>,
    config: &ImpulseConfig,
    sample_budget: Option<u64>,
) -> Result<()> {
    let mut acquisition = AcquisitionLoop::new(driver, pipeline.producer(), config.driver.read_batch);
    loop {
        let status = acquisition.pump()?;
        pipeline.process_available()?;
        let done = sample_budget.is_some_and(|budget| acquisition.stats().samples_read >= budget);
        if status != PumpStatus::Continue || done {
            break;
        }
    }
    Ok(())
}

/// Acquisition on its own paced thread, pipeline on this one
fn replay_threaded(
    pipeline: &mut CommandPipeline<ReplaySink>,
    driver: Box<dyn SensorDriver>,
    config: &ImpulseConfig,
    sample_budget: Option<u64>,
) -> Result<()> {
    let rate = driver.sampling_rate();
    let handle = AcquisitionLoop::new(driver, pipeline.producer(), config.driver.read_batch)
        .real_time()
        .spawn();
    let stop = AtomicBool::new(false);
    let poll = Duration::from_millis(config.pipeline.poll_interval_ms);

    thread::scope(|scope| -> Result<()> {
        let watcher = scope.spawn(|| -> Result<()> {
            if let Some(budget) = sample_budget {
                thread::sleep(Duration::from_secs_f64(budget as f64 / rate));
                let run = handle.stop()?;
                info!("Acquisition stopped after {} samples", run.stats.samples_read);
            } else {
                let run = handle.join()?;
                run.outcome?;
            }
            stop.store(true, Ordering::Relaxed);
            Ok(())
        });
        let processed = pipeline.run(&stop, poll);
        watcher
            .join()
            .map_err(|_| anyhow::anyhow!("acquisition watcher panicked"))??;
        processed?;
        Ok(())
    })
}

fn print_summary(report: &ShutdownReport, events: &[CommandEvent]) {
    println!();
    println!("Replay summary");
    println!("--------------");
    println!("  Windows processed:   {}", report.windows_processed);
    println!("  Samples accepted:    {}", report.buffer.accepted);
    println!("  Samples overflowed:  {}", report.buffer.overflow_count);
    println!("  Samples discarded:   {}", report.discarded_samples);
    println!("  Events delivered:    {}", report.emitter.delivered);
    println!("  Events skipped:      {}", report.emitter.skipped);
    println!("  Events failed:       {}", report.emitter.failed);
    println!("  Health:              {:?}", report.health.status);
    for reason in &report.health.reasons {
        println!("    - {}", reason);
    }
    if let Some(event) = report.final_event {
        println!("  Forced on shutdown:  {}", event);
    }
    println!();
    for event in events {
        println!("  {}", event);
    }
}
