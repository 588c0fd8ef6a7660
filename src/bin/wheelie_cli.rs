use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use wheelie_meter::analysis::AngleZone;
use wheelie_meter::config::AppConfig;
use wheelie_meter::fixtures::{
    ExpectationDiff, RideSimulator, TraceCatalog, TraceProcessor, TraceRun,
};

#[derive(Parser, Debug)]
#[command(
    name = "wheelie_cli",
    about = "Deterministic trace harness for the wheelie meter"
)]
struct Cli {
    /// Override directory containing trace assets (defaults to ./fixtures)
    #[arg(long)]
    traces_dir: Option<PathBuf>,
    /// Configuration file (defaults to assets/wheelie_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a trace and optionally compare against expectations
    Replay {
        #[arg(long)]
        trace: String,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Generate a seeded ride, replay it and report the detected events
    Simulate {
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 3)]
        events: usize,
        #[arg(long, default_value_t = 0.0)]
        mount_offset: f64,
        /// Write the generated trace JSON instead of the report
        #[arg(long)]
        save_trace: Option<PathBuf>,
    },
    /// Classify a calibrated angle into its display zone
    Classify {
        #[arg(long, allow_hyphen_values = true)]
        angle: f64,
    },
    /// List available traces on disk
    DumpTraces,
}

fn main() -> ExitCode {
    wheelie_meter::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let catalog = cli
        .traces_dir
        .map(TraceCatalog::new)
        .unwrap_or_else(TraceCatalog::default);
    let config = cli
        .config
        .map(AppConfig::load_from_file)
        .unwrap_or_else(AppConfig::load);

    match cli.command {
        Commands::Replay {
            trace,
            expect,
            output,
        } => run_replay(&catalog, config, &trace, expect, output),
        Commands::Simulate {
            seed,
            events,
            mount_offset,
            save_trace,
        } => run_simulate(config, seed, events, mount_offset, save_trace),
        Commands::Classify { angle } => run_classify(&config, angle),
        Commands::DumpTraces => run_dump(&catalog),
    }
}

fn run_replay(
    catalog: &TraceCatalog,
    config: AppConfig,
    trace: &str,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let data = catalog.load(trace, override_expect)?;
    let run = TraceProcessor::new(config)
        .run(&data.trace)
        .with_context(|| format!("replaying trace {}", trace))?;

    emit_report(&data.metadata.name, &run, output_path)?;

    if let Some(expectations) = data.expectations {
        match expectations.verify(&run.records) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(diff) => {
                emit_diff(&diff)?;
                Ok(ExitCode::from(2))
            }
        }
    } else {
        Ok(ExitCode::from(0))
    }
}

fn run_simulate(
    config: AppConfig,
    seed: u64,
    events: usize,
    mount_offset: f64,
    save_trace: Option<PathBuf>,
) -> Result<ExitCode> {
    let detection = config.detection.clone();
    let ride = RideSimulator::new(seed, detection.clone())
        .with_mount_offset(mount_offset)
        .generate(events);
    let trace = ride.to_trace(&detection);

    if let Some(path) = save_trace {
        let json = serde_json::to_string_pretty(&trace)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("{}", path.display());
        return Ok(ExitCode::from(0));
    }

    let run = TraceProcessor::new(config).run(&trace)?;
    let report = SimulationReportPayload {
        seed,
        planned: ride.wheelies.len(),
        detected: run.records.len(),
        records: &run.records,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if run.records.len() == ride.wheelies.len() {
        Ok(ExitCode::from(0))
    } else {
        Ok(ExitCode::from(2))
    }
}

fn run_classify(config: &AppConfig, angle: f64) -> Result<ExitCode> {
    let zone = AngleZone::classify(
        angle,
        config.detection.wheelie_threshold,
        config.detection.danger_threshold,
    );
    let payload = serde_json::json!({
        "angle": angle,
        "zone": zone,
        "status": zone.status_text(),
        "gauge_percent": config.gauge.curve.fill_percent(angle),
    });
    println!("{}", serde_json::to_string(&payload)?);
    Ok(ExitCode::from(0))
}

fn run_dump(catalog: &TraceCatalog) -> Result<ExitCode> {
    let traces = catalog.discover()?;
    if traces.is_empty() {
        println!("No traces found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in traces {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn emit_report(trace: &str, run: &TraceRun, output_path: Option<PathBuf>) -> Result<()> {
    let report = TraceReportPayload {
        trace,
        event_count: run.records.len(),
        run,
    };
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct TraceReportPayload<'a> {
    trace: &'a str,
    event_count: usize,
    #[serde(flatten)]
    run: &'a TraceRun,
}

#[derive(Serialize)]
struct SimulationReportPayload<'a> {
    seed: u64,
    planned: usize,
    detected: usize,
    records: &'a [wheelie_meter::EventRecord],
}
