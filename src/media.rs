//! Stream and packet model shared by the segmentation engine and its
//! demux/mux collaborators.

use std::path::Path;

use bytes::Bytes;
use ffmpeg_next as ffmpeg;

use crate::error::Result;

/// Role a demuxed stream plays in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamRole {
    Video,
    Audio,
    Discard,
}

impl StreamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamRole::Video => "video",
            StreamRole::Audio => "audio",
            StreamRole::Discard => "discard",
        }
    }
}

/// Audio codec parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioParams {
    /// Native channel layout bitmask, 0 when unspecified
    pub channel_layout: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_size: u32,
    pub block_align: i32,
}

/// Video codec parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoParams {
    /// Raw `AVPixelFormat` value
    pub pixel_format: i32,
    pub width: u32,
    pub height: u32,
    /// Reorder delay; non-zero when the stream carries B-frames
    pub has_b_frames: i32,
}

/// Codec-specific parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaParams {
    Audio(AudioParams),
    Video(VideoParams),
    Other,
}

/// One elementary stream of the input, as reported by the demuxer
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub index: usize,
    pub medium: ffmpeg::media::Type,
    pub codec_id: ffmpeg::codec::Id,
    pub codec_tag: u32,
    pub bit_rate: i64,
    pub extradata: Bytes,
    /// Timebase of the timestamps carried by this stream's packets
    pub time_base: ffmpeg::Rational,
    /// Codec tick duration
    pub codec_time_base: ffmpeg::Rational,
    pub ticks_per_frame: i32,
    /// First timestamp of the stream in `time_base` units, if known
    pub start_time: Option<i64>,
    pub params: MediaParams,
}

/// A stream carried through to the output segments
#[derive(Debug, Clone, PartialEq)]
pub struct OutputStream {
    pub input_index: usize,
    pub output_index: usize,
    pub role: StreamRole,
    pub codec_id: ffmpeg::codec::Id,
    pub codec_tag: u32,
    pub bit_rate: i64,
    pub extradata: Bytes,
    /// Timebase of the packets arriving from the demuxer
    pub source_time_base: ffmpeg::Rational,
    /// Timebase requested for the output stream
    pub time_base: ffmpeg::Rational,
    pub params: MediaParams,
    /// Codec configuration must live in the container header
    pub global_header: bool,
}

/// Outcome of handing one packet to the muxer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    /// The muxer asked for the stream to end
    EndOfStream,
}

/// A demultiplexed access unit
pub trait MediaPacket {
    /// Index of the input stream this packet belongs to
    fn stream_index(&self) -> usize;

    /// Presentation timestamp in the owning stream's timebase
    fn pts(&self) -> Option<i64>;

    /// Decoding timestamp in the owning stream's timebase
    fn dts(&self) -> Option<i64>;

    fn is_key(&self) -> bool;
}

impl MediaPacket for ffmpeg::Packet {
    fn stream_index(&self) -> usize {
        self.stream()
    }

    fn pts(&self) -> Option<i64> {
        ffmpeg::Packet::pts(self)
    }

    fn dts(&self) -> Option<i64> {
        ffmpeg::Packet::dts(self)
    }

    fn is_key(&self) -> bool {
        ffmpeg::Packet::is_key(self)
    }
}

/// Source of demultiplexed packets
pub trait Demuxer {
    type Packet: MediaPacket;

    /// Streams found in the input, indexed by stream index
    fn streams(&self) -> &[StreamDescriptor];

    /// Pull the next packet. `Ok(None)` signals end of stream.
    fn read_packet(&mut self) -> Result<Option<Self::Packet>>;

    /// Try to open a decoder for a stream. Only used for diagnostics.
    fn open_decoder(&mut self, stream_index: usize) -> Result<()>;
}

/// Sink that serializes packets into segment files
///
/// Call order per segment: `open_output`, `write_header`, any number of
/// `write_packet`, `write_trailer`, `flush_and_close`. `create_container`
/// is called once before the first segment.
pub trait Muxer {
    type Packet: MediaPacket;

    /// Whether the output format keeps codec configuration in its header
    fn requires_global_header(&self) -> bool;

    fn create_container(&mut self, streams: &[OutputStream]) -> Result<()>;

    fn open_output(&mut self, path: &Path) -> Result<()>;

    fn write_header(&mut self) -> Result<()>;

    /// Consume a packet. Errors are per-packet and leave the segment open.
    fn write_packet(&mut self, packet: Self::Packet) -> Result<WriteStatus>;

    fn write_trailer(&mut self) -> Result<()>;

    fn flush_and_close(&mut self) -> Result<()>;
}

/// Length of one timebase tick in seconds
pub fn time_base_secs(time_base: ffmpeg::Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Convert a timestamp to seconds. Whole-second timestamps convert exactly.
pub fn pts_to_seconds(pts: i64, time_base: ffmpeg::Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}
