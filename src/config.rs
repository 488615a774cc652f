//! Segmenter configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Input source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// FFmpeg URL of the live feed (`pipe:0` reads standard input)
    pub source: String,

    /// Demuxer to force; `None` lets FFmpeg probe
    pub format: Option<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source: "pipe:0".to_string(),
            format: Some("mpegts".to_string()),
        }
    }
}

/// Output container configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Muxer short name
    pub format: String,

    /// Segment file extension, without the dot
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "mpegts".to_string(),
            extension: "ts".to_string(),
        }
    }
}

/// How segment notifications reach the downstream transfer step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NotifyFormat {
    /// A structured `tracing` event
    #[default]
    Log,
    /// The `segmenter: first, last, end, payload` line on stderr
    Line,
    /// One JSON object per line on stdout
    Json,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Run configuration. Built once before the pipeline starts and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Target segment duration in whole seconds
    pub segment_duration_secs: u32,

    /// Directory the segment files are written to
    pub output_dir: PathBuf,

    /// Segment file name prefix
    pub filename_prefix: String,

    /// Opaque payload passed through to every notification
    pub profile_payload: String,

    /// Force a rotation once a segment overruns the target by this many
    /// seconds, even without a key frame. Disabled when `None`.
    pub max_overrun_secs: Option<f64>,

    pub input: InputConfig,

    pub output: OutputConfig,

    pub notify: NotifyFormat,

    pub logging: LoggingConfig,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            segment_duration_secs: 10,
            output_dir: PathBuf::from("."),
            filename_prefix: "segment".to_string(),
            profile_payload: String::new(),
            max_overrun_secs: None,
            input: InputConfig::default(),
            output: OutputConfig::default(),
            notify: NotifyFormat::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SegmenterConfig {
    /// Target segment duration in seconds
    pub fn target_duration(&self) -> f64 {
        f64::from(self.segment_duration_secs)
    }

    /// Check the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.segment_duration_secs == 0 {
            return Err(ConfigError::ZeroSegmentDuration);
        }
        if self.filename_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if let Some(cap) = self.max_overrun_secs {
            if !cap.is_finite() || cap < 0.0 {
                return Err(ConfigError::InvalidOverrun(cap));
            }
        }
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(ConfigError::OutputDir {
                path: self.output_dir.clone(),
                reason: "not a directory".to_string(),
            });
        }
        Ok(())
    }

    /// Create the output directory if it does not exist yet.
    pub fn prepare_output_dir(&self) -> Result<&Path, ConfigError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| ConfigError::OutputDir {
            path: self.output_dir.clone(),
            reason: e.to_string(),
        })?;
        Ok(&self.output_dir)
    }
}

/// Parse the positional segment duration argument.
pub fn parse_segment_duration(value: &str) -> Result<u32, ConfigError> {
    let secs: u32 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidSegmentDuration(value.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::ZeroSegmentDuration);
    }
    Ok(secs)
}
