//! compsweep CLI
//!
//! Runs composition sweeps from a TOML configuration and writes the
//! results, statistics and markdown summary to disk.

mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use compsweep_core::{
    generate_all_compositions, generate_markdown_summary, rank_compositions,
    render_baseline_comparison, CompositionStats, SummaryOptions, SweepReport,
};

use crate::config::FileConfig;

/// compsweep - Agent Composition Sweeps
#[derive(Parser)]
#[command(name = "compsweep")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate every agent-role composition and rank the results")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sweep and write results.json, stats.json and summary.md
    Run {
        /// Path to the sweep configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory (overrides [report].output_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Success rate below which a composition is flagged unreliable
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// List the compositions a configuration would generate
    Compositions {
        /// Path to the sweep configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Recompute statistics and summary from a saved results.json
    Summarize {
        /// Path to results.json
        #[arg(short, long)]
        results: PathBuf,

        /// Success rate below which a composition is flagged unreliable
        #[arg(long, default_value_t = 0.8)]
        threshold: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    compsweep_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            threshold,
        } => cmd_run(&config, output_dir.as_deref(), threshold).await,
        Commands::Compositions { config } => cmd_compositions(&config),
        Commands::Summarize { results, threshold } => cmd_summarize(&results, threshold),
    }
}

/// Run a full sweep
async fn cmd_run(
    config_path: &Path,
    output_dir: Option<&Path>,
    threshold: Option<f64>,
) -> Result<()> {
    let file = FileConfig::load(config_path)?;
    let output_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| file.report.output_dir.clone());
    let options = SummaryOptions {
        unreliable_threshold: threshold.unwrap_or(file.report.unreliable_threshold),
    };

    let runner = file.build_runner()?;
    let outcome = runner
        .run_sweep(file.sweep.clone())
        .await
        .context("Sweep failed to start")?;

    let report = SweepReport::from_outcome(file.sweep.clone(), outcome);
    write_outputs(&output_dir, &report, &options)?;

    println!("Sweep: {}", report.sweep_id);
    println!(
        "Trials: {} ({} failed)",
        report.trials.len(),
        report.metrics.trials_failed
    );
    if let Some(best) = rank_compositions(&report.stats).first() {
        println!("Best: {}", best.composition_id);
    }
    println!("Results written to {:?}", output_dir);
    Ok(())
}

/// Dry run: print generated composition ids
fn cmd_compositions(config_path: &Path) -> Result<()> {
    let file = FileConfig::load(config_path)?;
    let compositions =
        generate_all_compositions(&file.sweep).context("Invalid composition constraints")?;

    for composition in &compositions {
        println!("{}  {}", composition.fingerprint(), composition.id());
    }
    println!();
    println!(
        "{} compositions x {} tasks x {} repetitions = {} trials",
        compositions.len(),
        file.sweep.tasks.len(),
        file.sweep.repetitions,
        compositions.len() * file.sweep.tasks.len() * file.sweep.repetitions as usize
    );
    Ok(())
}

/// Recompute stats and summary next to a saved results.json
fn cmd_summarize(results_path: &Path, threshold: f64) -> Result<()> {
    let raw = std::fs::read_to_string(results_path)
        .with_context(|| format!("Failed to read results file: {:?}", results_path))?;
    let mut report = SweepReport::from_json(&raw)
        .with_context(|| format!("Invalid report in {:?}", results_path))?;
    report.refresh_stats();

    let options = SummaryOptions {
        unreliable_threshold: threshold,
    };
    let dir = results_path.parent().unwrap_or_else(|| Path::new("."));
    write_json(&dir.join("stats.json"), &report.stats)?;
    let summary = render_summary(&report.stats, &report, &options);
    write_text(&dir.join("summary.md"), &summary)?;

    println!("{}", summary);
    Ok(())
}

fn write_outputs(dir: &Path, report: &SweepReport, options: &SummaryOptions) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let results = report.to_json().context("Failed to serialize report")?;
    write_text(&dir.join("results.json"), &results)?;
    write_json(&dir.join("stats.json"), &report.stats)?;
    write_text(
        &dir.join("summary.md"),
        &render_summary(&report.stats, report, options),
    )?;
    info!(dir = %dir.display(), "reports written");
    Ok(())
}

fn render_summary(
    stats: &[CompositionStats],
    report: &SweepReport,
    options: &SummaryOptions,
) -> String {
    let mut summary = generate_markdown_summary(stats, options);
    if !report.baselines.is_empty() {
        summary.push('\n');
        summary.push_str(&render_baseline_comparison(stats, &report.baselines));
    }
    summary
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {:?}", path))?;
    write_text(path, &content)
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use compsweep_core::{
        calculate_statistics, AgentComposition, AgentRole, FailureKind, MetricsSnapshot,
        SweepConfig, Tier1Result, TrialFailure, TrialResult, TrialStatus, SCHEMA_VERSION,
    };

    fn trial(roles: &[AgentRole], score: Option<f64>) -> TrialResult {
        let composition = AgentComposition::new(roles.iter().copied()).unwrap();
        let mut t = TrialResult::failed(
            &composition,
            "default",
            0,
            TrialFailure::new(FailureKind::Timeout, "timed out"),
            1e-6,
        );
        if let Some(score) = score {
            t.status = TrialStatus::Succeeded;
            t.failure = None;
            t.tier1 = Some(Tier1Result {
                overall_score: score,
                ..Default::default()
            });
        }
        t
    }

    fn report(trials: Vec<TrialResult>) -> SweepReport {
        let now = chrono::Utc::now();
        SweepReport {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: now,
            sweep_id: Default::default(),
            started_at: now,
            finished_at: now,
            config: SweepConfig::default(),
            compositions: vec!["manager".into(), "analyst".into()],
            trials,
            // Deliberately stale; summarize must recompute.
            stats: vec![],
            baselines: vec![],
            metrics: MetricsSnapshot::default(),
        }
    }

    #[test]
    fn test_summarize_recomputes_from_saved_results() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results.json");
        let saved = report(vec![
            trial(&[AgentRole::Manager], Some(0.9)),
            trial(&[AgentRole::Analyst], Some(0.4)),
            trial(&[AgentRole::Analyst], None),
        ]);
        std::fs::write(&results, saved.to_json().unwrap()).unwrap();

        cmd_summarize(&results, 0.8).unwrap();

        let stats: Vec<CompositionStats> =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("stats.json")).unwrap())
                .unwrap();
        let expected = calculate_statistics(&saved.trials);
        let ids: Vec<&str> = stats.iter().map(|s| s.composition_id.as_str()).collect();
        assert_eq!(ids, vec!["manager", "analyst"]);
        assert_eq!(stats[1].trials, expected[1].trials);
        assert_eq!(stats[1].failed, 1);

        let summary = std::fs::read_to_string(dir.path().join("summary.md")).unwrap();
        assert!(summary.contains("**Best composition:** `manager`"));
        assert!(summary.contains("- `analyst`: 50.0%"));
    }

    #[test]
    fn test_write_outputs_creates_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        let mut saved = report(vec![trial(&[AgentRole::Manager], Some(0.7))]);
        saved.refresh_stats();

        write_outputs(&out, &saved, &SummaryOptions::default()).unwrap();

        for name in ["results.json", "stats.json", "summary.md"] {
            assert!(out.join(name).exists(), "{name} missing");
        }
        let raw = std::fs::read_to_string(out.join("results.json")).unwrap();
        let reloaded = SweepReport::from_json(&raw).unwrap();
        assert_eq!(reloaded.trials.len(), 1);
        assert_eq!(reloaded.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_summarize_missing_file_reports_path() {
        let err = cmd_summarize(Path::new("/nonexistent/results.json"), 0.8).unwrap_err();
        assert!(format!("{err:#}").contains("results.json"));
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "compsweep",
            "--json",
            "run",
            "--config",
            "sweep.toml",
            "--threshold",
            "0.9",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run {
                config, threshold, ..
            } => {
                assert_eq!(config, PathBuf::from("sweep.toml"));
                assert_eq!(threshold, Some(0.9));
            }
            _ => panic!("expected run"),
        }
    }
}
