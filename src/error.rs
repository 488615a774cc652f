use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the segmenter
#[derive(Error, Debug)]
pub enum SegmenterError {
    /// An error originating from the underlying FFmpeg library
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or inconsistent run configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The input carries neither a video nor an audio stream
    #[error("No video or audio stream found in input")]
    NoUsableStreams,

    /// The muxer could not allocate an output stream
    #[error("Could not allocate output stream for input stream {input_index}: {reason}")]
    StreamAlloc { input_index: usize, reason: String },

    /// A segment file could not be created
    #[error("Could not open segment {index} at {path:?}: {reason}")]
    OpenSegment {
        index: u32,
        path: PathBuf,
        reason: String,
    },

    /// The container header could not be written to a fresh segment
    #[error("Could not write header to segment {index}: {reason}")]
    WriteHeader { index: u32, reason: String },

    /// A single packet could not be written
    #[error("Could not write packet of stream {stream}: {reason}")]
    WritePacket { stream: usize, reason: String },

    /// The container trailer could not be written
    #[error("Could not write trailer to segment {index}: {reason}")]
    WriteTrailer { index: u32, reason: String },

    /// The demuxer failed to hand back the next packet
    #[error("Could not read packet: {0}")]
    ReadPacket(String),

    /// No decoder could be opened for the reference video stream
    #[error("Video decoder unavailable: {0}")]
    DecodeUnavailable(String),

    /// The muxer was used out of order
    #[error("Muxer state error: {0}")]
    MuxerState(String),
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    /// Failure during global FFmpeg initialization
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    /// The requested demuxer is not compiled into the linked FFmpeg
    #[error("Demuxer not found: {0}")]
    DemuxerNotFound(String),

    /// The requested muxer is not compiled into the linked FFmpeg
    #[error("Muxer not found: {0}")]
    MuxerNotFound(String),

    /// Failure opening the input source
    #[error("Failed to open input: {0}")]
    OpenInput(String),

    /// Failure locating stream information within the input
    #[error("Failed to find stream info: {0}")]
    FindStreamInfo(String),

    /// Failure creating an output format context
    #[error("Failed to create muxer: {0}")]
    MuxerCreate(String),
}

/// Configuration validation and loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("segment duration must be a positive number of seconds")]
    ZeroSegmentDuration,

    #[error("invalid segment duration {0:?}: expected a whole number of seconds")]
    InvalidSegmentDuration(String),

    #[error("filename prefix must not be empty")]
    EmptyPrefix,

    #[error("maximum segment overrun must be a non-negative number of seconds, got {0}")]
    InvalidOverrun(f64),

    #[error("output directory {path:?} is not usable: {reason}")]
    OutputDir { path: PathBuf, reason: String },

    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SegmenterError>;
