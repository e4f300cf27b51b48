//! labelbrush-bench: CLI tool for replaying label edit scripts.
//!
//! Loads a JSON edit script (see [`script`]), replays every stroke, undo
//! and redo through a [`MaskPainter`](labelbrush::MaskPainter) and prints
//! per-step timing and change counts. Useful for:
//!
//! - Measuring stroke latency on large volumes
//! - Checking that a sequence of edits lands on the expected labels
//! - Comparing `u8` and `u16` scratch buffers
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin labelbrush-bench -- [OPTIONS] <SCRIPT>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod replay;
mod script;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use labelbrush::{Label, PainterConfig};
use tracing_subscriber::EnvFilter;

use crate::replay::ReplayDiagnostics;
use crate::script::Script;

/// Edit script replay and diagnostics for labelbrush.
///
/// Replays a JSON edit script against a fresh label volume and prints
/// per-step timing and change counts.
#[derive(Parser)]
#[command(name = "labelbrush-bench", version)]
struct Cli {
    /// Path to the JSON edit script.
    script_path: PathBuf,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Painter config as a JSON string.
    ///
    /// When provided, the script's own `config` is ignored. The JSON must
    /// be a valid `PainterConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Write the final labels to file as raw little-endian `u16`, x fastest.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins when set.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Resolve the painter config: `--config-json` replaces the script's.
fn config_from_cli(cli: &Cli, script: &Script) -> Result<PainterConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }
    Ok(script.config.clone())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut script = match Script::load(&cli.script_path) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    script.config = match config_from_cli(&cli, &script) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Script: {} ({} steps)",
        cli.script_path.display(),
        script.steps.len(),
    );
    eprintln!("Config: {:#?}", script.config);
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let volume = match script.build_volume() {
            Ok(v) => v,
            Err(msg) => {
                eprintln!("Error building volume: {msg}");
                return ExitCode::FAILURE;
            }
        };

        match replay::replay(&script, volume) {
            Ok((painter, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write labels on the first run only.
                if run == 0
                    && let Some(ref path) = cli.output
                {
                    match write_labels(path, painter.volume().labels()) {
                        Ok(bytes) => {
                            eprintln!("Labels written to {} ({bytes} bytes)", path.display());
                        }
                        Err(e) => {
                            eprintln!("Error writing labels to {}: {e}", path.display());
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Replay error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

fn write_labels(path: &Path, labels: &[Label]) -> std::io::Result<usize> {
    let bytes: Vec<u8> = labels.iter().flat_map(|l| l.to_le_bytes()).collect();
    std::fs::write(path, &bytes)?;
    Ok(bytes.len())
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[ReplayDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-step means.
    println!();
    println!("{:<6} {:>12}", "Step", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let steps = all_diagnostics.iter().map(|d| d.steps.len()).min().unwrap_or(0);
    for n in 0..steps {
        let step_mean = all_diagnostics
            .iter()
            .map(|d| d.steps[n].duration.as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{n:<6} {step_mean:>10.3}ms");
    }
}
