// vidstitch-cli/src/main.rs
//
// Command-line interface for the vidstitch merge pipeline. Parses arguments
// with clap, configures logging to both console and a per-run log file,
// invokes the core library, and reports a summary with an appropriate exit
// code.

use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use console::style;
use log::error;
use vidstitch_core::config::{
    MergeConfigBuilder, TargetProfile, DEFAULT_CRF, DEFAULT_MAX_WORKERS,
    DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_X264_PRESET,
};
use vidstitch_core::{merge_videos, resolve_tool, Prober};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Vidstitch: normalize and concatenate video files",
    long_about = "Probes every video in a directory, re-encodes the ones that do not match \
                  the target profile, and joins them into a single file with a timestamp \
                  manifest, using ffmpeg and ffprobe."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merges all video files in a directory into one output file
    Merge(MergeArgs),
    /// Probes a single file and prints its stream profile
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct MergeArgs {
    /// Directory containing the video files to merge
    #[arg(required = true, value_name = "INPUT_DIR")]
    input_dir: PathBuf,

    /// Path of the merged output file
    #[arg(required = true, value_name = "OUTPUT_FILE")]
    output: PathBuf,

    /// Number of concurrent normalization workers
    #[arg(short = 'j', long, value_name = "N", default_value_t = DEFAULT_MAX_WORKERS)]
    workers: usize,

    /// x264 preset used when re-encoding
    #[arg(long, value_name = "PRESET", default_value = DEFAULT_X264_PRESET)]
    preset: String,

    /// CRF quality used when re-encoding (0-51, lower is better)
    #[arg(long, value_name = "CRF", default_value_t = DEFAULT_CRF)]
    crf: u8,

    /// Target width in pixels
    #[arg(long, value_name = "PIXELS")]
    width: Option<u32>,

    /// Target height in pixels
    #[arg(long, value_name = "PIXELS")]
    height: Option<u32>,

    /// Target frame rate
    #[arg(long, value_name = "FPS")]
    fps: Option<f64>,

    /// Optional: directory for log files (defaults to the output directory)
    #[arg(short, long, value_name = "LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Optional: explicit path to the ffmpeg binary
    #[arg(long, value_name = "PATH")]
    ffmpeg: Option<PathBuf>,

    /// Optional: explicit path to the ffprobe binary
    #[arg(long, value_name = "PATH")]
    ffprobe: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Media file to probe
    #[arg(required = true, value_name = "FILE")]
    file: PathBuf,

    /// Optional: explicit path to the ffprobe binary
    #[arg(long, value_name = "PATH")]
    ffprobe: Option<PathBuf>,
}

fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Configures fern to log to stdout and, when given, a per-run log file.
fn setup_logging(log_file: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout());

    if let Some(path) = log_file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

fn run_merge(args: MergeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let log_dir = args
        .log_dir
        .clone()
        .or_else(|| args.output.parent().map(PathBuf::from))
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join(format!("vidstitch_merge_{}.log", get_timestamp()));
    setup_logging(Some(&log_file))?;

    let mut target = TargetProfile::default();
    if let Some(width) = args.width {
        target.width = width;
    }
    if let Some(height) = args.height {
        target.height = height;
    }
    if let Some(fps) = args.fps {
        target.frame_rate = fps;
    }

    let mut builder = MergeConfigBuilder::new()
        .input_dir(args.input_dir)
        .output_path(args.output)
        .max_workers(args.workers)
        .x264_preset(args.preset)
        .crf(args.crf)
        .target(target);
    if let Some(ffmpeg) = args.ffmpeg {
        builder = builder.ffmpeg_path(ffmpeg);
    }
    if let Some(ffprobe) = args.ffprobe {
        builder = builder.ffprobe_path(ffprobe);
    }
    let config = builder.build();

    match merge_videos(&config, None) {
        Ok(outcome) => {
            println!();
            println!(
                "{} {}",
                style("Merged:").green().bold(),
                outcome.output_path.display()
            );
            println!("  Segments:       {}", outcome.segment_count);
            println!("  Dropped inputs: {}", outcome.dropped_count);
            println!(
                "  Total duration: {}",
                vidstitch_core::format_hms_millis(outcome.total_duration_secs)
            );
            if let Some(manifest) = &outcome.manifest_path {
                println!("  Timestamps:     {}", manifest.display());
            }
            if outcome.dropped_count > 0 {
                println!(
                    "  {} {}",
                    style("Some inputs were dropped; see").yellow(),
                    outcome.ledger_path.display()
                );
            }
            println!("  Elapsed:        {:.1?}", start.elapsed());
            Ok(())
        }
        Err(e) => {
            error!("Merge failed: {e}");
            eprintln!("{} {e}", style("Merge failed:").red().bold());
            Err(e.into())
        }
    }
}

fn run_probe(args: ProbeArgs) -> Result<(), Box<dyn std::error::Error>> {
    setup_logging(None)?;

    let ffprobe = resolve_tool("ffprobe", args.ffprobe.as_deref())?;
    let prober = Prober::new(ffprobe, Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS));

    let profile = prober.probe(&args.file)?;
    let duration = prober.duration(&args.file)?;

    println!("{}", serde_json::to_string_pretty(&profile)?);
    println!(
        "duration: {} ({duration:.3}s)",
        vidstitch_core::format_hms_millis(duration)
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Merge(args) => run_merge(args),
        Commands::Probe(args) => run_probe(args),
    };

    if result.is_err() {
        process::exit(1);
    }
}
