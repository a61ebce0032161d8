//! `uav-localizer` CLI: scenario runs, replay of recorded logs, and a live
//! run of the timer-driven service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use localizer_core::{service::LocalizerService, LocalizerConfig};
use sim::camera_sim::CameraSimulator;
use sim::replay::{load_replay, save_replay};
use sim::runner::{run_offline, RunReport};
use sim::scenarios::{Scenario, ScenarioKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::info;

#[derive(Parser)]
#[command(name = "uav-localizer", about = "Kalman filter-bank target localizer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a named scenario in batch mode and output metrics.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// TOML configuration (defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the full replay log
        #[arg(long)]
        save_replay: Option<PathBuf>,
    },
    /// Load and replay a previously recorded scenario log.
    Replay {
        /// Path to replay JSON file
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the live service against a simulated camera in real time.
    Live {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Stop after this many seconds
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario {
            scenario,
            config,
            seed,
            output,
            save_replay: save_path,
        } => {
            let config = load_config(config.as_deref())?;
            run_scenario(scenario, &config, seed, output.as_deref(), save_path.as_deref())?;
        }
        Commands::Replay { input, config, output } => {
            let config = load_config(config.as_deref())?;
            run_replay(&input, &config, output.as_deref())?;
        }
        Commands::Live {
            scenario,
            config,
            seed,
            seconds,
        } => {
            let config = load_config(config.as_deref())?;
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(run_live(scenario, config, seed, seconds))?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<LocalizerConfig> {
    match path {
        Some(p) => LocalizerConfig::from_file(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(LocalizerConfig::default()),
    }
}

fn run_scenario(
    kind: ScenarioKind,
    config: &LocalizerConfig,
    seed: u64,
    output_path: Option<&Path>,
    replay_path: Option<&Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    println!(
        "Running scenario '{}' (seed={}, duration={:.0}s)...",
        scenario.name, seed, scenario.duration
    );
    let log = scenario.record();
    let report = run_offline(&log, config)?;
    print_report(&report);

    // Save replay if requested
    if let Some(rpath) = replay_path {
        save_replay(&log, rpath)?;
        println!("Replay saved to {}", rpath.display());
    }
    if let Some(opath) = output_path {
        write_report(&report, opath)?;
    }
    Ok(())
}

fn run_replay(input: &Path, config: &LocalizerConfig, output_path: Option<&Path>) -> Result<()> {
    let log = load_replay(input)?;
    println!("Replaying '{}' ({} frames)...", log.scenario_name, log.frames.len());
    let report = run_offline(&log, config)?;
    print_report(&report);
    if let Some(opath) = output_path {
        write_report(&report, opath)?;
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    let m = &report.metrics;
    println!(
        "Done: {} frames ({} dropped), {} predict ticks, {} tracks alive, elapsed={:.3}s",
        report.frames,
        report.dropped_frames,
        report.predict_ticks,
        report.final_tracks,
        report.elapsed_s,
    );
    println!(
        "Estimates: {}/{} cycles, RMSE {:.3} m (max {:.3} m), {} births, {} deletions, {} switches",
        m.cycles_with_estimate,
        m.cycles,
        m.rmse_position(),
        m.max_pos_err,
        m.births,
        m.deletions,
        m.estimate_switches,
    );
}

fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::json!({
        "report": report,
        "rmse_position": report.metrics.rmse_position(),
        "estimate_rate": report.metrics.estimate_rate(),
    });
    std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
    println!("Metrics saved to {}", path.display());
    Ok(())
}

async fn run_live(kind: ScenarioKind, config: LocalizerConfig, seed: u64, seconds: f64) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    let camera = scenario.camera.clone();
    let transforms = camera.transforms(&config.world_frame);
    let service = LocalizerService::new(&config, camera.intrinsics, Arc::new(transforms))?;

    let (det_tx, det_rx) = mpsc::channel(16);
    let (est_tx, mut est_rx) = mpsc::channel(64);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handles = service.spawn(det_rx, est_tx, stop_rx);
    info!(scenario = %scenario.name, seconds, "live run started");

    // Camera feed: step targets on wall-clock time, emit frames at the camera rate
    let mut targets = scenario.targets.clone();
    let mut camera_sim = CameraSimulator::new(camera.clone(), seed);
    let feeder = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs_f64(scenario.sim_dt));
        let start = tokio::time::Instant::now();
        let mut sim_time = 0.0;
        while sim_time < seconds {
            interval.tick().await;
            let now = start.elapsed().as_secs_f64();
            for target in &mut targets {
                target.step(now - sim_time);
            }
            sim_time = now;
            if let Some(batch) = camera_sim.generate(&targets, sim_time) {
                if det_tx.send(batch).await.is_err() {
                    break;
                }
            }
        }
    });

    let printer = tokio::spawn(async move {
        let mut published = 0u64;
        while let Some(est) = est_rx.recv().await {
            published += 1;
            println!(
                "t={:7.3} {} pos=({:6.3}, {:6.3}, {:6.3}) σ=({:.3}, {:.3}, {:.3})",
                est.timestamp,
                est.track_id,
                est.position[0],
                est.position[1],
                est.position[2],
                est.covariance[0].sqrt(),
                est.covariance[7].sqrt(),
                est.covariance[14].sqrt(),
            );
        }
        published
    });

    feeder.await?;
    let _ = stop_tx.send(true);
    handles.join().await;
    let published = printer.await?;
    info!(published, seconds, "live run done");
    Ok(())
}
