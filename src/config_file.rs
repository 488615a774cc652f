//! Configuration file support
//!
//! Loads segmenter defaults from a TOML file. Every section is optional;
//! missing values fall back to [`SegmenterConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{
    InputConfig, LogFormat, LoggingConfig, NotifyFormat, OutputConfig, SegmenterConfig,
};
use crate::error::ConfigError;

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Segmentation settings
    pub segment: Option<SegmentSettings>,
    /// Input settings
    pub input: Option<InputSettings>,
    /// Output settings
    pub output: Option<OutputSettings>,
    /// Notification settings
    pub notify: Option<NotifySettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentSettings {
    /// Target segment duration in seconds
    pub duration_secs: Option<u32>,
    /// Overrun cap in seconds
    pub max_overrun_secs: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSettings {
    pub source: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    pub directory: Option<PathBuf>,
    pub prefix: Option<String>,
    pub format: Option<String>,
    pub extension: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifySettings {
    pub format: Option<NotifyFormat>,
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
    /// Output format (json, pretty)
    pub format: Option<LogFormat>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Convert to SegmenterConfig
    pub fn into_segmenter_config(self) -> SegmenterConfig {
        let defaults = SegmenterConfig::default();
        let segment = self.segment.unwrap_or_default();
        let input = self.input.unwrap_or_default();
        let output = self.output.unwrap_or_default();
        let notify = self.notify.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();

        SegmenterConfig {
            segment_duration_secs: segment
                .duration_secs
                .unwrap_or(defaults.segment_duration_secs),
            output_dir: output.directory.unwrap_or(defaults.output_dir),
            filename_prefix: output.prefix.unwrap_or(defaults.filename_prefix),
            profile_payload: notify.payload.unwrap_or(defaults.profile_payload),
            max_overrun_secs: segment.max_overrun_secs,
            input: InputConfig {
                source: input.source.unwrap_or(defaults.input.source),
                format: input.format.or(defaults.input.format),
            },
            output: OutputConfig {
                format: output.format.unwrap_or(defaults.output.format),
                extension: output.extension.unwrap_or(defaults.output.extension),
            },
            notify: notify.format.unwrap_or(defaults.notify),
            logging: LoggingConfig {
                level: logging.level.unwrap_or(defaults.logging.level),
                format: logging.format.unwrap_or(defaults.logging.format),
            },
        }
    }
}
