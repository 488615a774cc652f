//! Live MPEG-TS segmenter
//!
//! Cuts a continuous transport stream into `{prefix}-{index:05}.ts` files of
//! roughly fixed duration, starting each file on a key frame, and reports
//! every finished file to a downstream transfer step.

pub mod config;
pub mod config_file;
pub mod error;
pub mod ffmpeg_utils;
pub mod media;
pub mod notify;
pub mod pipeline;
pub mod segment;

#[cfg(test)]
pub(crate) mod tests;

pub use config::{NotifyFormat, SegmenterConfig};
pub use error::{ConfigError, FfmpegError, Result, SegmenterError};
pub use notify::{NotificationEmitter, SegmentNotification, SegmentNotifier};
pub use pipeline::{EndReason, Pipeline, RunSummary};
