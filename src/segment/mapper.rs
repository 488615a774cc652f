//! Input → output stream mapping
//!
//! Picks the first video and the first audio stream of the input and
//! derives the output stream parameters for each. Everything else is
//! discarded.

use ffmpeg_next as ffmpeg;

use crate::error::{Result, SegmenterError};
use crate::media::{
    time_base_secs, AudioParams, MediaParams, OutputStream, StreamDescriptor, StreamRole,
};

/// Streams below this tick length keep the coarser codec timebase
const FINE_TIME_BASE_SECS: f64 = 1.0 / 1000.0;

/// Result of stream mapping
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMap {
    roles: Vec<StreamRole>,
    outputs: Vec<OutputStream>,
    video: Option<usize>,
    audio: Option<usize>,
}

impl StreamMap {
    /// Role of an input stream; unknown indices are discarded
    pub fn role(&self, input_index: usize) -> StreamRole {
        self.roles
            .get(input_index)
            .copied()
            .unwrap_or(StreamRole::Discard)
    }

    pub fn outputs(&self) -> &[OutputStream] {
        &self.outputs
    }

    /// Input index of the video stream
    pub fn video(&self) -> Option<usize> {
        self.video
    }

    /// Input index of the audio stream
    pub fn audio(&self) -> Option<usize> {
        self.audio
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }
}

/// Build the output stream set for the given input streams.
///
/// Fails with [`SegmenterError::NoUsableStreams`] when the input has neither
/// video nor audio.
pub fn map_streams(inputs: &[StreamDescriptor], global_header: bool) -> Result<StreamMap> {
    let mut roles = vec![StreamRole::Discard; inputs.iter().map(|s| s.index + 1).max().unwrap_or(0)];
    let mut outputs = Vec::new();
    let mut video = None;
    let mut audio = None;

    for stream in inputs {
        let role = match stream.medium {
            ffmpeg::media::Type::Video if video.is_none() => StreamRole::Video,
            ffmpeg::media::Type::Audio if audio.is_none() => StreamRole::Audio,
            _ => StreamRole::Discard,
        };
        roles[stream.index] = role;

        match role {
            StreamRole::Video => video = Some(stream.index),
            StreamRole::Audio => audio = Some(stream.index),
            StreamRole::Discard => {
                tracing::debug!(
                    "Discarding input stream {} ({:?}, codec={})",
                    stream.index,
                    stream.medium,
                    stream.codec_id.name()
                );
                continue;
            }
        }

        let output = output_stream(stream, role, outputs.len(), global_header);
        tracing::debug!(
            "Mapped {} stream: input {} -> output {}, codec={}, time_base={}/{}",
            role.as_str(),
            output.input_index,
            output.output_index,
            output.codec_id.name(),
            output.time_base.numerator(),
            output.time_base.denominator()
        );
        outputs.push(output);
    }

    if outputs.is_empty() {
        return Err(SegmenterError::NoUsableStreams);
    }

    Ok(StreamMap {
        roles,
        outputs,
        video,
        audio,
    })
}

fn output_stream(
    stream: &StreamDescriptor,
    role: StreamRole,
    output_index: usize,
    global_header: bool,
) -> OutputStream {
    let params = match stream.params {
        MediaParams::Audio(audio) => MediaParams::Audio(AudioParams {
            block_align: output_block_align(stream.codec_id, audio.block_align),
            ..audio
        }),
        other => other,
    };

    OutputStream {
        input_index: stream.index,
        output_index,
        role,
        codec_id: stream.codec_id,
        codec_tag: stream.codec_tag,
        bit_rate: stream.bit_rate,
        extradata: stream.extradata.clone(),
        source_time_base: stream.time_base,
        time_base: output_time_base(stream),
        params,
        global_header: role == StreamRole::Video && global_header,
    }
}

/// Pick the output timebase for a stream.
///
/// A codec whose frame duration is coarser than a sub-millisecond container
/// timebase keeps the frame duration; otherwise the container timebase
/// stands.
pub fn output_time_base(stream: &StreamDescriptor) -> ffmpeg::Rational {
    let frame = ffmpeg::Rational::new(
        stream.codec_time_base.numerator() * stream.ticks_per_frame,
        stream.codec_time_base.denominator(),
    );
    let container_secs = time_base_secs(stream.time_base);

    if time_base_secs(frame) > container_secs && container_secs < FINE_TIME_BASE_SECS {
        frame
    } else {
        stream.time_base
    }
}

/// Block alignment for the output stream. MP3 with an alignment of 1 and
/// AC-3 are written with 0.
pub fn output_block_align(codec_id: ffmpeg::codec::Id, block_align: i32) -> i32 {
    match codec_id {
        ffmpeg::codec::Id::MP3 if block_align == 1 => 0,
        ffmpeg::codec::Id::AC3 => 0,
        _ => block_align,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::{audio_stream, data_stream, video_stream};

    #[test]
    fn test_first_stream_of_each_kind_wins() {
        let inputs = vec![
            data_stream(0),
            video_stream(1),
            audio_stream(2),
            video_stream(3),
            audio_stream(4),
        ];
        let map = map_streams(&inputs, false).unwrap();

        assert_eq!(map.video(), Some(1));
        assert_eq!(map.audio(), Some(2));
        assert_eq!(map.role(0), StreamRole::Discard);
        assert_eq!(map.role(1), StreamRole::Video);
        assert_eq!(map.role(2), StreamRole::Audio);
        assert_eq!(map.role(3), StreamRole::Discard);
        assert_eq!(map.role(4), StreamRole::Discard);
        assert_eq!(map.role(99), StreamRole::Discard);

        let outputs = map.outputs();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].input_index, 1);
        assert_eq!(outputs[0].output_index, 0);
        assert_eq!(outputs[1].input_index, 2);
        assert_eq!(outputs[1].output_index, 1);
    }

    #[test]
    fn test_no_usable_streams() {
        let inputs = vec![data_stream(0), data_stream(1)];
        assert!(matches!(
            map_streams(&inputs, false),
            Err(SegmenterError::NoUsableStreams)
        ));
        assert!(matches!(
            map_streams(&[], false),
            Err(SegmenterError::NoUsableStreams)
        ));
    }

    #[test]
    fn test_codec_identity_copied() {
        let mut video = video_stream(0);
        video.codec_tag = 0x3124_3561;
        video.bit_rate = 2_500_000;
        video.extradata = bytes::Bytes::from_static(&[0x01, 0x64, 0x00, 0x1f]);
        let map = map_streams(&[video.clone()], false).unwrap();
        let out = &map.outputs()[0];

        assert_eq!(out.codec_id, video.codec_id);
        assert_eq!(out.codec_tag, video.codec_tag);
        assert_eq!(out.bit_rate, video.bit_rate);
        assert_eq!(out.extradata, video.extradata);
        assert_eq!(out.params, video.params);
        assert_eq!(out.source_time_base, video.time_base);
    }

    #[test]
    fn test_coarse_codec_time_base_kept() {
        // 25 fps against a 90 kHz container
        let mut video = video_stream(0);
        video.codec_time_base = ffmpeg::Rational::new(1, 50);
        video.ticks_per_frame = 2;
        assert_eq!(output_time_base(&video), ffmpeg::Rational::new(2, 50));
    }

    #[test]
    fn test_millisecond_container_time_base_kept() {
        let mut video = video_stream(0);
        video.time_base = ffmpeg::Rational::new(1, 1000);
        video.codec_time_base = ffmpeg::Rational::new(1, 25);
        assert_eq!(output_time_base(&video), ffmpeg::Rational::new(1, 1000));
    }

    #[test]
    fn test_finer_codec_time_base_uses_container() {
        let mut video = video_stream(0);
        video.codec_time_base = ffmpeg::Rational::new(1, 180000);
        assert_eq!(output_time_base(&video), ffmpeg::Rational::new(1, 90000));
    }

    #[test]
    fn test_block_align() {
        assert_eq!(output_block_align(ffmpeg::codec::Id::MP3, 1), 0);
        assert_eq!(output_block_align(ffmpeg::codec::Id::MP3, 4), 4);
        assert_eq!(output_block_align(ffmpeg::codec::Id::AC3, 1536), 0);
        assert_eq!(output_block_align(ffmpeg::codec::Id::AAC, 1), 1);
    }

    #[test]
    fn test_audio_block_align_applied() {
        let mut ac3 = audio_stream(0);
        ac3.codec_id = ffmpeg::codec::Id::AC3;
        if let MediaParams::Audio(ref mut audio) = ac3.params {
            audio.block_align = 1536;
        }
        let map = map_streams(&[ac3], false).unwrap();
        match map.outputs()[0].params {
            MediaParams::Audio(audio) => {
                assert_eq!(audio.block_align, 0);
                assert_eq!(audio.sample_rate, 48000);
                assert_eq!(audio.channels, 2);
            }
            other => panic!("expected audio params, got {:?}", other),
        }
    }

    #[test]
    fn test_global_header_only_on_video() {
        let inputs = vec![video_stream(0), audio_stream(1)];
        let map = map_streams(&inputs, true).unwrap();
        assert!(map.outputs()[0].global_header);
        assert!(!map.outputs()[1].global_header);

        let map = map_streams(&inputs, false).unwrap();
        assert!(!map.outputs()[0].global_header);
    }

    #[test]
    fn test_mapping_is_idempotent() {
        let inputs = vec![audio_stream(0), data_stream(1), video_stream(2)];
        let first = map_streams(&inputs, false).unwrap();
        let second = map_streams(&inputs, false).unwrap();
        assert_eq!(first, second);
    }
}
