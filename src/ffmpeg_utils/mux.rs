//! Segment file muxer
//!
//! Every segment gets its own output context: `open_output` creates the file
//! and the output streams, `flush_and_close` drops the context and with it
//! the file handle.

use std::collections::HashMap;
use std::path::Path;

use ffmpeg_next as ffmpeg;

use super::helpers;
use crate::error::{FfmpegError, Result, SegmenterError};
use crate::media::{Muxer, OutputStream, WriteStatus};

/// Muxer writing MPEG-TS (or any file-based format) segments to disk
pub struct FfmpegMuxer {
    format_name: String,
    global_header: bool,
    /// Codec parameters of the input streams, by input index
    source_params: HashMap<usize, ffmpeg::codec::Parameters>,
    streams: Vec<OutputStream>,
    /// Map from input stream index to position in `streams`
    stream_map: HashMap<usize, usize>,
    /// Timebases chosen by the muxer in `write_header`, by output index
    out_time_bases: Vec<ffmpeg::Rational>,
    output: Option<ffmpeg::format::context::Output>,
}

impl FfmpegMuxer {
    /// Create a muxer for `format_name`. Fails when the linked FFmpeg has no
    /// such muxer.
    pub fn new(
        format_name: &str,
        source_params: HashMap<usize, ffmpeg::codec::Parameters>,
    ) -> Result<Self> {
        let global_header = helpers::output_format_requires_global_header(format_name)?;
        Ok(Self {
            format_name: format_name.to_string(),
            global_header,
            source_params,
            streams: Vec::new(),
            stream_map: HashMap::new(),
            out_time_bases: Vec::new(),
            output: None,
        })
    }

    fn output_mut(&mut self) -> Result<&mut ffmpeg::format::context::Output> {
        self.output
            .as_mut()
            .ok_or_else(|| SegmenterError::MuxerState("no segment open".to_string()))
    }
}

impl Muxer for FfmpegMuxer {
    type Packet = ffmpeg::Packet;

    fn requires_global_header(&self) -> bool {
        self.global_header
    }

    fn create_container(&mut self, streams: &[OutputStream]) -> Result<()> {
        for stream in streams {
            if !self.source_params.contains_key(&stream.input_index) {
                return Err(SegmenterError::StreamAlloc {
                    input_index: stream.input_index,
                    reason: "no codec parameters".to_string(),
                });
            }
            if stream.global_header && stream.extradata.is_empty() {
                tracing::warn!(
                    stream = stream.input_index,
                    codec = ?stream.codec_id,
                    "{} wants a global header but the stream has no extradata",
                    self.format_name
                );
            }
        }

        self.stream_map = streams
            .iter()
            .enumerate()
            .map(|(position, s)| (s.input_index, position))
            .collect();
        self.streams = streams.to_vec();
        Ok(())
    }

    fn open_output(&mut self, path: &Path) -> Result<()> {
        if self.output.is_some() {
            return Err(SegmenterError::MuxerState(
                "previous segment still open".to_string(),
            ));
        }

        let mut output = ffmpeg::format::output_as(path, &self.format_name)
            .map_err(|e| FfmpegError::MuxerCreate(format!("{:?}: {}", path, e)))?;

        for stream in &self.streams {
            let params = self
                .source_params
                .get(&stream.input_index)
                .ok_or_else(|| SegmenterError::StreamAlloc {
                    input_index: stream.input_index,
                    reason: "no codec parameters".to_string(),
                })?;

            let mut out_stream = output
                .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
                .map_err(|e| SegmenterError::StreamAlloc {
                    input_index: stream.input_index,
                    reason: e.to_string(),
                })?;
            out_stream.set_parameters(params.clone());
            helpers::stream_apply_output(&mut out_stream, stream);
            out_stream.set_time_base(stream.time_base);
        }

        self.output = Some(output);
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        let mut opts = ffmpeg::Dictionary::new();
        if self.format_name == "mpegts" {
            // Keep input timestamps so consecutive segments form one timeline
            opts.set("mpegts_copyts", "1");
        }

        let output = self.output_mut()?;
        output
            .write_header_with(opts)
            .map_err(|e| FfmpegError::MuxerCreate(format!("write_header: {}", e)))?;

        let time_bases: Vec<ffmpeg::Rational> =
            output.streams().map(|s| s.time_base()).collect();
        self.out_time_bases = time_bases;
        Ok(())
    }

    fn write_packet(&mut self, mut packet: ffmpeg::Packet) -> Result<WriteStatus> {
        let input_index = packet.stream();
        let position = *self.stream_map.get(&input_index).ok_or_else(|| {
            SegmenterError::WritePacket {
                stream: input_index,
                reason: "stream not mapped".to_string(),
            }
        })?;
        let stream = &self.streams[position];
        let out_tb = self
            .out_time_bases
            .get(stream.output_index)
            .copied()
            .unwrap_or(stream.time_base);

        packet.rescale_ts(stream.source_time_base, out_tb);
        packet.set_stream(stream.output_index);
        packet.set_position(-1);

        let output = self.output_mut()?;
        match packet.write_interleaved(output) {
            Ok(()) => Ok(WriteStatus::Written),
            Err(ffmpeg::Error::Eof) => Ok(WriteStatus::EndOfStream),
            Err(e) => Err(SegmenterError::WritePacket {
                stream: input_index,
                reason: e.to_string(),
            }),
        }
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.output_mut()?
            .write_trailer()
            .map_err(|e| SegmenterError::MuxerState(format!("write_trailer: {}", e)))
    }

    fn flush_and_close(&mut self) -> Result<()> {
        let mut output = self
            .output
            .take()
            .ok_or_else(|| SegmenterError::MuxerState("no segment open".to_string()))?;
        helpers::flush_avio(&mut output);
        drop(output);
        self.out_time_bases.clear();
        Ok(())
    }
}
