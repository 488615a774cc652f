//! Live input demuxer

use std::collections::HashMap;

use ffmpeg_next as ffmpeg;

use super::helpers;
use crate::error::{Result, SegmenterError};
use crate::media::{AudioParams, Demuxer, MediaParams, StreamDescriptor, VideoParams};

/// Wrapper for the FFmpeg input context of the live feed
pub struct FfmpegDemuxer {
    input: ffmpeg::format::context::Input,
    streams: Vec<StreamDescriptor>,
}

impl FfmpegDemuxer {
    /// Open `source` (a URL, a path, or `pipe:0`), optionally forcing the
    /// demuxer, and probe its streams.
    pub fn open(source: &str, format: Option<&str>) -> Result<Self> {
        let input = helpers::open_input_as(source, format)?;
        let streams: Vec<StreamDescriptor> = input.streams().map(|s| describe_stream(&s)).collect();

        tracing::info!(
            source,
            format = input.format().name(),
            streams = streams.len(),
            "Opened input"
        );
        for s in &streams {
            tracing::debug!(
                index = s.index,
                medium = ?s.medium,
                codec = ?s.codec_id,
                time_base = %s.time_base,
                start_time = ?s.start_time,
                "Input stream"
            );
        }

        Ok(Self { input, streams })
    }

    /// Codec parameters of every input stream, keyed by stream index
    pub fn codec_parameters(&self) -> HashMap<usize, ffmpeg::codec::Parameters> {
        self.input
            .streams()
            .map(|s| (s.index(), s.parameters()))
            .collect()
    }
}

impl Demuxer for FfmpegDemuxer {
    type Packet = ffmpeg::Packet;

    fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Option<ffmpeg::Packet>> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(SegmenterError::ReadPacket(e.to_string())),
        }
    }

    fn open_decoder(&mut self, stream_index: usize) -> Result<()> {
        let stream = self.input.stream(stream_index).ok_or_else(|| {
            SegmenterError::DecodeUnavailable(format!("no input stream {}", stream_index))
        })?;
        let params = stream.parameters();
        let codec_id = params.id();

        if !helpers::decoder_exists(codec_id) {
            return Err(SegmenterError::DecodeUnavailable(format!(
                "no decoder for {:?}",
                codec_id
            )));
        }

        let decoder = ffmpeg::codec::context::Context::from_parameters(params)
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| {
                SegmenterError::DecodeUnavailable(format!("{:?} decoder: {}", codec_id, e))
            })?;

        // Only the availability matters; packets are never decoded
        tracing::debug!(
            stream = stream_index,
            codec = ?codec_id,
            width = decoder.width(),
            height = decoder.height(),
            "Video decoder available"
        );
        Ok(())
    }
}

/// Build the engine's view of one input stream
fn describe_stream(stream: &ffmpeg::Stream) -> StreamDescriptor {
    let params = stream.parameters();
    let medium = params.medium();
    let time_base = stream.time_base();

    let start_time = match stream.start_time() {
        i64::MIN => None,
        t => Some(t),
    };

    let (media_params, codec_time_base) = match medium {
        ffmpeg::media::Type::Video => {
            let video = VideoParams {
                pixel_format: helpers::codec_params_format(&params),
                width: helpers::codec_params_width(&params),
                height: helpers::codec_params_height(&params),
                has_b_frames: helpers::codec_params_video_delay(&params),
            };
            (MediaParams::Video(video), frame_duration(stream).unwrap_or(time_base))
        }
        ffmpeg::media::Type::Audio => {
            let audio = AudioParams {
                channel_layout: helpers::codec_params_channel_layout(&params),
                sample_rate: helpers::codec_params_sample_rate(&params),
                channels: helpers::codec_params_channels(&params),
                frame_size: helpers::codec_params_frame_size(&params),
                block_align: helpers::codec_params_block_align(&params),
            };
            let codec_time_base = if audio.sample_rate > 0 {
                ffmpeg::Rational::new(1, audio.sample_rate as i32)
            } else {
                time_base
            };
            (MediaParams::Audio(audio), codec_time_base)
        }
        _ => (MediaParams::Other, time_base),
    };

    StreamDescriptor {
        index: stream.index(),
        medium,
        codec_id: params.id(),
        codec_tag: helpers::codec_params_codec_tag(&params),
        bit_rate: helpers::codec_params_bit_rate(&params),
        extradata: helpers::codec_params_extradata(&params),
        time_base,
        codec_time_base,
        ticks_per_frame: 1,
        start_time,
        params: media_params,
    }
}

/// One frame period from the average frame rate, falling back to the
/// real base frame rate
fn frame_duration(stream: &ffmpeg::Stream) -> Option<ffmpeg::Rational> {
    [stream.avg_frame_rate(), stream.rate()]
        .into_iter()
        .find(|r| r.numerator() > 0 && r.denominator() > 0)
        .map(|r| ffmpeg::Rational::new(r.denominator(), r.numerator()))
}
