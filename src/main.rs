//! live-segmenter
//!
//! Reads a live MPEG-TS feed (standard input by default) and writes it out
//! as numbered segment files, printing a notification for each one.
//!
//! ```text
//! live-segmenter <duration> <output-dir> <prefix> <payload>
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_segmenter::config::{parse_segment_duration, LogFormat, NotifyFormat, SegmenterConfig};
use live_segmenter::config_file::ConfigFile;
use live_segmenter::ffmpeg_utils::{self, FfmpegDemuxer, FfmpegMuxer};
use live_segmenter::notify::notifier_for;
use live_segmenter::{Pipeline, RunSummary};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "live-segmenter";

#[derive(Parser, Debug, Clone)]
#[command(name = "live-segmenter")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target segment duration in whole seconds
    #[arg(required_unless_present = "config")]
    segment_duration: Option<String>,

    /// Directory the segment files are written to
    #[arg(required_unless_present = "config")]
    output_dir: Option<PathBuf>,

    /// Segment file name prefix
    #[arg(required_unless_present = "config")]
    filename_prefix: Option<String>,

    /// Payload passed through to every notification
    #[arg(required_unless_present = "config")]
    profile_payload: Option<String>,

    /// TOML configuration file; positional arguments override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input URL (defaults to standard input)
    #[arg(short, long)]
    input: Option<String>,

    /// Force the input demuxer ("auto" lets FFmpeg probe)
    #[arg(long)]
    input_format: Option<String>,

    /// Output muxer
    #[arg(long)]
    output_format: Option<String>,

    /// Segment file extension
    #[arg(long)]
    extension: Option<String>,

    /// Force a rotation once a segment overruns the target by this many seconds
    #[arg(long)]
    max_overrun: Option<f64>,

    /// Notification transport
    #[arg(long, value_enum)]
    notify: Option<NotifyFormat>,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
        Err(e) => e.exit(),
    };

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config);
    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    tracing::debug!("Configuration: {:?}", config);

    match run(&config) {
        Ok(summary) if summary.end_reason.is_clean() => ExitCode::SUCCESS,
        Ok(summary) => {
            tracing::error!("Run ended early: {:?}", summary.end_reason);
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Merge defaults, the config file and the command line, then validate.
fn build_config(args: &Args) -> live_segmenter::Result<SegmenterConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigFile::from_file(path)?.into_segmenter_config(),
        None => SegmenterConfig::default(),
    };

    if let Some(duration) = &args.segment_duration {
        config.segment_duration_secs = parse_segment_duration(duration)?;
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(prefix) = &args.filename_prefix {
        config.filename_prefix = prefix.clone();
    }
    if let Some(payload) = &args.profile_payload {
        config.profile_payload = payload.clone();
    }
    if let Some(input) = &args.input {
        config.input.source = input.clone();
    }
    if let Some(format) = &args.input_format {
        config.input.format = (format != "auto").then(|| format.clone());
    }
    if let Some(format) = &args.output_format {
        config.output.format = format.clone();
    }
    if let Some(extension) = &args.extension {
        config.output.extension = extension.trim_start_matches('.').to_string();
    }
    if args.max_overrun.is_some() {
        config.max_overrun_secs = args.max_overrun;
    }
    if let Some(notify) = args.notify {
        config.notify = notify;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }

    config.validate()?;
    Ok(config)
}

/// Open the input and output, then segment until the input ends.
fn run(config: &SegmenterConfig) -> live_segmenter::Result<RunSummary> {
    ffmpeg_utils::init()?;
    ffmpeg_utils::install_log_filter();
    tracing::info!("FFmpeg version: {}", ffmpeg_utils::version_info());

    config.prepare_output_dir()?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = stop.clone();
    // SIGINT and SIGTERM; checked between reads, see `Pipeline::with_stop_flag`
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    }) {
        tracing::warn!("Could not install signal handler: {}", e);
    }

    let demuxer = FfmpegDemuxer::open(&config.input.source, config.input.format.as_deref())?;
    let muxer = FfmpegMuxer::new(&config.output.format, demuxer.codec_parameters())?;
    let notifier = notifier_for(config.notify);

    Pipeline::new(config, demuxer, muxer, notifier)?
        .with_stop_flag(stop)
        .run()
}

/// Initialize logging with tracing
fn init_logging(config: &SegmenterConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "live_segmenter={},ffmpeg=warn",
            config.logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
