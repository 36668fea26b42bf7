//! Synheart Pose Agent CLI
//!
//! Heatmap post-processing for pose estimation output.

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use synheart_pose_agent::{
    config::Config,
    core::{
        describe_points, FrameReport, HeatmapDecoder, MeasurementReport, MonotonicClock,
        PredictedPoint, ReportBuilder,
    },
    pipeline::{HeatmapPipeline, JointPipeline},
    source::{load_frame, FrameSource, FrameSourceConfig},
    stats::create_shared_log_with_persistence,
    VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synheart-pose")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Heatmap post-processing for pose estimation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one tensor file into keypoints
    Decode {
        /// JSON file with `shape` and `data`
        file: PathBuf,

        /// Print the JSON report instead of the table
        #[arg(long)]
        json: bool,
    },

    /// Aggregate one tensor file into an intensity field
    Heatmap {
        /// JSON file with `shape` and `data`
        file: PathBuf,

        /// Write the field to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Replay a JSON Lines stream of tensors through the smoothing pipeline
    Stream {
        /// JSON Lines file, one tensor per line
        file: PathBuf,

        /// Smoothing window (frames); defaults to the configured value
        #[arg(long)]
        window: Option<usize>,

        /// Export frame reports when the stream ends
        #[arg(long)]
        export: bool,

        /// Export format (json or jsonl)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// List keypoint labels
    Labels,

    /// Show persisted pipeline statistics
    Stats {
        /// Zero the persisted counters
        #[arg(long)]
        reset: bool,
    },

    /// Show configuration
    Config {
        /// Write the current configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode { file, json } => {
            cmd_decode(&file, json);
        }
        Commands::Heatmap { file, output } => {
            cmd_heatmap(&file, output);
        }
        Commands::Stream {
            file,
            window,
            export,
            format,
        } => {
            cmd_stream(file, window, export, &format);
        }
        Commands::Labels => {
            cmd_labels();
        }
        Commands::Stats { reset } => {
            cmd_stats(reset);
        }
        Commands::Config { init } => {
            cmd_config(init);
        }
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_decode(file: &Path, json: bool) {
    let config = load_config();

    let tensor = match load_frame(file).map(|f| f.into_tensor()) {
        Ok(Ok(tensor)) => tensor,
        Ok(Err(e)) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error reading {file:?}: {e}");
            std::process::exit(1);
        }
    };

    let points = match HeatmapDecoder::new().decode(&tensor) {
        Ok(points) => points,
        Err(e) => {
            tracing::warn!("Rejected tensor: {e}");
            Vec::new()
        }
    };

    if json {
        let report = ReportBuilder::new(config.keypoint_labels.clone()).frame(0, &points, None);
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Error serializing report: {e}"),
        }
        return;
    }

    print_keypoints(&config, &points);
}

fn cmd_heatmap(file: &Path, output: Option<PathBuf>) {
    let config = load_config();

    let tensor = match load_frame(file).map(|f| f.into_tensor()) {
        Ok(Ok(tensor)) => tensor,
        Ok(Err(e)) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error reading {file:?}: {e}");
            std::process::exit(1);
        }
    };

    let mut pipeline = HeatmapPipeline::new();
    let frame = pipeline.run(&tensor);
    let report = ReportBuilder::new(config.keypoint_labels).heatmap(0, &frame.field, frame.measurement);

    let json = match serde_json::to_string_pretty(&report) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing heatmap: {e}");
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => match std::fs::write(&path, json) {
            Ok(_) => println!(
                "Wrote {}x{} field (peak {:.3}) to {:?}",
                frame.field.width,
                frame.field.height,
                frame.field.peak(),
                path
            ),
            Err(e) => eprintln!("Error writing {path:?}: {e}"),
        },
        None => println!("{json}"),
    }
}

fn cmd_stream(file: PathBuf, window: Option<usize>, export: bool, format: &str) {
    println!("Synheart Pose Agent v{VERSION}");
    println!();

    let mut config = load_config();
    if let Some(window) = window {
        config.smoothing_window = window;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Replaying {file:?}");
    println!("  Smoothing window: {} frames", config.smoothing_window);
    println!("  Keypoints: {}", config.keypoint_labels.len());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let log = create_shared_log_with_persistence(config.data_path.join("pipeline_stats.json"));
    let mut pipeline =
        JointPipeline::with_parts(config.smoothing_window, MonotonicClock::new(), log.clone());
    pipeline.set_observer(|report: &MeasurementReport| {
        println!("  {report}");
    });

    let builder = ReportBuilder::new(config.keypoint_labels.clone())
        .with_session_id(format!("SESS-{}", Utc::now().timestamp_millis()));
    let mut reports: Vec<FrameReport> = Vec::new();

    let mut source = FrameSource::new(FrameSourceConfig {
        path: file,
        channel_capacity: config.channel_capacity,
    });
    if let Err(e) = source.start() {
        eprintln!("Error starting frame source: {e}");
        std::process::exit(1);
    }

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let receiver = source.receiver().clone();
    let mut frame_index: u64 = 0;

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(Ok(frame)) => {
                let tensor = match frame.into_tensor() {
                    Ok(tensor) => tensor,
                    Err(e) => {
                        tracing::warn!("Skipping frame {frame_index}: {e}");
                        log.record_invalid_tensor();
                        frame_index += 1;
                        continue;
                    }
                };

                pipeline.begin_frame();
                let output = pipeline.process(&tensor);

                let report = builder.frame(frame_index, &output.points, output.measurement);
                println!(
                    "[frame {}] {}/{} keypoints detected",
                    frame_index,
                    report.detected_count(),
                    output.points.len()
                );
                reports.push(report);
                frame_index += 1;
            }
            Ok(Err(e)) => {
                eprintln!("Warning: {e}");
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    source.stop();

    if let Some(last) = reports.last() {
        let points: Vec<_> = last.keypoints.iter().map(|k| k.point).collect();
        println!();
        println!("Last frame:");
        print_keypoints(&config, &points);
    }

    if let Some(summary) = pipeline.summary() {
        println!();
        println!("Performance (last {} frames):", summary.cycles);
        println!(
            "  Inference: {:.1} ms (±{:.1})",
            summary.mean_inference_ms, summary.std_inference_ms
        );
        println!(
            "  Execution: {:.1} ms (±{:.1})",
            summary.mean_execution_ms, summary.std_execution_ms
        );
        if let Some(fps) = summary.mean_fps {
            println!("  FPS: {fps:.1}");
        }
    }

    if export && !reports.is_empty() {
        match export_reports(&config.export_path, &reports, format) {
            Ok(path) => {
                log.record_reports_exported(reports.len() as u64);
                println!("Exported {} reports to {:?}", reports.len(), path);
            }
            Err(e) => eprintln!("Error writing reports: {e}"),
        }
    }

    if let Err(e) = log.save() {
        eprintln!("Warning: Could not save pipeline stats: {e}");
    }

    println!();
    println!("{}", log.summary());
}

fn cmd_labels() {
    let config = load_config();
    for (channel, label) in config.keypoint_labels.iter().enumerate() {
        println!("{channel:>3}  {label}");
    }
}

fn cmd_stats(reset: bool) {
    let config = load_config();
    let log = create_shared_log_with_persistence(config.data_path.join("pipeline_stats.json"));

    if reset {
        log.reset();
        match log.save() {
            Ok(()) => println!("Pipeline statistics reset"),
            Err(e) => eprintln!("Error saving pipeline stats: {e}"),
        }
        return;
    }

    println!("{}", log.summary());
}

fn cmd_config(init: bool) {
    let config = load_config();

    if init {
        match config.save() {
            Ok(()) => println!("Wrote {:?}", Config::config_path()),
            Err(e) => {
                eprintln!("Error saving config: {e}");
                std::process::exit(1);
            }
        }
        println!();
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn print_keypoints(config: &Config, points: &[Option<PredictedPoint>]) {
    for row in describe_points(&config.keypoint_labels, points, config.precision) {
        println!("{:>3}  {:<12} {}", row.channel, row.label, row.description);
    }
}

/// Write reports as pretty JSON or JSON Lines and return the file path.
fn export_reports(
    export_dir: &Path,
    reports: &[FrameReport],
    format: &str,
) -> Result<PathBuf, std::io::Error> {
    std::fs::create_dir_all(export_dir)?;

    let jsonl = format == "jsonl";
    let path = export_dir.join(format!(
        "session_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        if jsonl { "jsonl" } else { "json" }
    ));

    let content = if jsonl {
        let lines: Vec<String> = reports
            .iter()
            .filter_map(|r| serde_json::to_string(r).ok())
            .collect();
        lines.join("\n")
    } else {
        serde_json::to_string_pretty(reports).map_err(std::io::Error::other)?
    };

    std::fs::write(&path, content)?;
    Ok(path)
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
