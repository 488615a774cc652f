//! Test fixtures
//!
//! Stream descriptors, scripted packets and recording collaborators for
//! running the segmentation engine without FFmpeg I/O.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bytes::Bytes;
use ffmpeg_next as ffmpeg;

use crate::error::{Result, SegmenterError};
use crate::media::{
    AudioParams, Demuxer, MediaPacket, MediaParams, Muxer, OutputStream, StreamDescriptor,
    VideoParams, WriteStatus,
};
use crate::notify::{SegmentNotification, SegmentNotifier};

/// 90 kHz clock used by MPEG-TS
pub const TS_CLOCK: i64 = 90_000;

/// H.264 1080p25 stream on the MPEG-TS clock
pub fn video_stream(index: usize) -> StreamDescriptor {
    StreamDescriptor {
        index,
        medium: ffmpeg::media::Type::Video,
        codec_id: ffmpeg::codec::Id::H264,
        codec_tag: 0,
        bit_rate: 0,
        extradata: Bytes::new(),
        time_base: ffmpeg::Rational::new(1, 90000),
        codec_time_base: ffmpeg::Rational::new(1, 25),
        ticks_per_frame: 1,
        start_time: Some(0),
        params: MediaParams::Video(VideoParams {
            pixel_format: 0,
            width: 1920,
            height: 1080,
            has_b_frames: 0,
        }),
    }
}

/// AAC stereo 48 kHz stream on the MPEG-TS clock
pub fn audio_stream(index: usize) -> StreamDescriptor {
    StreamDescriptor {
        index,
        medium: ffmpeg::media::Type::Audio,
        codec_id: ffmpeg::codec::Id::AAC,
        codec_tag: 0,
        bit_rate: 128_000,
        extradata: Bytes::new(),
        time_base: ffmpeg::Rational::new(1, 90000),
        codec_time_base: ffmpeg::Rational::new(1, 48000),
        ticks_per_frame: 1,
        start_time: Some(0),
        params: MediaParams::Audio(AudioParams {
            channel_layout: 0x3,
            sample_rate: 48000,
            channels: 2,
            frame_size: 1024,
            block_align: 0,
        }),
    }
}

/// Data stream (e.g. SCTE-35 cues) that is never carried through
pub fn data_stream(index: usize) -> StreamDescriptor {
    StreamDescriptor {
        index,
        medium: ffmpeg::media::Type::Data,
        codec_id: ffmpeg::codec::Id::None,
        codec_tag: 0,
        bit_rate: 0,
        extradata: Bytes::new(),
        time_base: ffmpeg::Rational::new(1, 90000),
        codec_time_base: ffmpeg::Rational::new(1, 90000),
        ticks_per_frame: 1,
        start_time: Some(0),
        params: MediaParams::Other,
    }
}

/// Packet with explicit timestamps, in 90 kHz ticks for the fixtures above
#[derive(Debug, Clone, PartialEq)]
pub struct TestPacket {
    pub stream: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub key: bool,
}

impl TestPacket {
    pub fn key(stream: usize, pts: i64) -> Self {
        Self {
            stream,
            pts: Some(pts),
            dts: Some(pts),
            key: true,
        }
    }

    pub fn delta(stream: usize, pts: i64) -> Self {
        Self {
            key: false,
            ..Self::key(stream, pts)
        }
    }

    pub fn untimed(stream: usize, key: bool) -> Self {
        Self {
            pts: None,
            dts: None,
            key,
            ..Self::key(stream, 0)
        }
    }
}

impl MediaPacket for TestPacket {
    fn stream_index(&self) -> usize {
        self.stream
    }

    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn dts(&self) -> Option<i64> {
        self.dts
    }

    fn is_key(&self) -> bool {
        self.key
    }
}

/// 25 fps video with a key frame every `gop` frames, interleaved with one
/// audio packet per video frame. Runs for `secs` seconds.
pub fn av_feed(video: usize, audio: usize, gop: u32, secs: u32) -> Vec<TestPacket> {
    let frame = TS_CLOCK / 25;
    let frames = i64::from(secs) * 25;
    (0..frames)
        .flat_map(|n| {
            let pts = n * frame;
            let v = if n % i64::from(gop) == 0 {
                TestPacket::key(video, pts)
            } else {
                TestPacket::delta(video, pts)
            };
            [v, TestPacket::delta(audio, pts)]
        })
        .collect()
}

/// Demuxer replaying a fixed packet list
pub struct ScriptedDemuxer {
    streams: Vec<StreamDescriptor>,
    packets: VecDeque<TestPacket>,
    fail_after: Option<usize>,
    reads: usize,
    decoder_available: bool,
}

impl ScriptedDemuxer {
    pub fn new(streams: Vec<StreamDescriptor>, packets: Vec<TestPacket>) -> Self {
        Self {
            streams,
            packets: packets.into(),
            fail_after: None,
            reads: 0,
            decoder_available: true,
        }
    }

    /// Fail the read following the first `n` packets
    pub fn fail_read_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn without_decoder(mut self) -> Self {
        self.decoder_available = false;
        self
    }
}

impl Demuxer for ScriptedDemuxer {
    type Packet = TestPacket;

    fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Option<TestPacket>> {
        if self.fail_after == Some(self.reads) {
            return Err(SegmenterError::ReadPacket("connection reset".to_string()));
        }
        self.reads += 1;
        Ok(self.packets.pop_front())
    }

    fn open_decoder(&mut self, stream_index: usize) -> Result<()> {
        if self.decoder_available {
            Ok(())
        } else {
            Err(SegmenterError::DecodeUnavailable(format!(
                "no decoder for stream {}",
                stream_index
            )))
        }
    }
}

/// One call observed by the recording muxer
#[derive(Debug, Clone, PartialEq)]
pub enum MuxEvent {
    CreateContainer(usize),
    Open(PathBuf),
    Header,
    Packet { stream: usize, pts: Option<i64> },
    Trailer,
    Close,
}

/// Calls seen by a `RecordingMuxer`, shared with the test body
#[derive(Debug, Default)]
pub struct MuxLog {
    pub events: Vec<MuxEvent>,
    /// Input indices of the registered streams flagged for a global header
    pub global_header_streams: Vec<usize>,
}

impl MuxLog {
    pub fn opened_paths(&self) -> Vec<PathBuf> {
        self.events
            .iter()
            .filter_map(|e| match e {
                MuxEvent::Open(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Packet timestamps grouped by the segment they were written to
    pub fn packets_per_segment(&self) -> Vec<Vec<i64>> {
        let mut segments: Vec<Vec<i64>> = Vec::new();
        for event in &self.events {
            match event {
                MuxEvent::Open(_) => segments.push(Vec::new()),
                MuxEvent::Packet { pts, .. } => {
                    if let Some(segment) = segments.last_mut() {
                        segment.extend(*pts);
                    }
                }
                _ => {}
            }
        }
        segments
    }

    pub fn count(&self, event: &MuxEvent) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }
}

/// Muxer that records calls instead of writing files
pub struct RecordingMuxer {
    log: Rc<RefCell<MuxLog>>,
    global_header: bool,
    open: bool,
    opens: usize,
    headers: usize,
    fail_open_on: Option<usize>,
    fail_header_on: Option<usize>,
    fail_write_at: Option<i64>,
    end_of_stream_at: Option<i64>,
}

impl RecordingMuxer {
    pub fn new() -> (Self, Rc<RefCell<MuxLog>>) {
        let log = Rc::new(RefCell::new(MuxLog::default()));
        let muxer = Self {
            log: log.clone(),
            global_header: false,
            open: false,
            opens: 0,
            headers: 0,
            fail_open_on: None,
            fail_header_on: None,
            fail_write_at: None,
            end_of_stream_at: None,
        };
        (muxer, log)
    }

    /// Fail the `n`th call to `open_output`, counting from 1
    pub fn fail_open_on(mut self, n: usize) -> Self {
        self.fail_open_on = Some(n);
        self
    }

    /// Fail the `n`th call to `write_header`, counting from 1
    pub fn fail_header_on(mut self, n: usize) -> Self {
        self.fail_header_on = Some(n);
        self
    }

    /// Reject the packet with this pts
    pub fn fail_write_at(mut self, pts: i64) -> Self {
        self.fail_write_at = Some(pts);
        self
    }

    /// Report end of stream after writing the packet with this pts
    pub fn end_of_stream_at(mut self, pts: i64) -> Self {
        self.end_of_stream_at = Some(pts);
        self
    }

    /// Act like a container that stores codec configuration in its header
    pub fn with_global_header(mut self) -> Self {
        self.global_header = true;
        self
    }

    fn record(&self, event: MuxEvent) {
        self.log.borrow_mut().events.push(event);
    }
}

impl Muxer for RecordingMuxer {
    type Packet = TestPacket;

    fn requires_global_header(&self) -> bool {
        self.global_header
    }

    fn create_container(&mut self, streams: &[OutputStream]) -> Result<()> {
        self.record(MuxEvent::CreateContainer(streams.len()));
        self.log.borrow_mut().global_header_streams = streams
            .iter()
            .filter(|s| s.global_header)
            .map(|s| s.input_index)
            .collect();
        Ok(())
    }

    fn open_output(&mut self, path: &Path) -> Result<()> {
        if self.open {
            return Err(SegmenterError::MuxerState("already open".to_string()));
        }
        self.opens += 1;
        if self.fail_open_on == Some(self.opens) {
            return Err(SegmenterError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )));
        }
        self.open = true;
        self.record(MuxEvent::Open(path.to_path_buf()));
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        self.headers += 1;
        self.record(MuxEvent::Header);
        if self.fail_header_on == Some(self.headers) {
            return Err(SegmenterError::MuxerState("header rejected".to_string()));
        }
        Ok(())
    }

    fn write_packet(&mut self, packet: TestPacket) -> Result<WriteStatus> {
        if !self.open {
            return Err(SegmenterError::MuxerState("not open".to_string()));
        }
        if packet.pts.is_some() && packet.pts == self.fail_write_at {
            return Err(SegmenterError::WritePacket {
                stream: packet.stream,
                reason: "invalid argument".to_string(),
            });
        }
        self.record(MuxEvent::Packet {
            stream: packet.stream,
            pts: packet.pts,
        });
        if packet.pts.is_some() && packet.pts == self.end_of_stream_at {
            return Ok(WriteStatus::EndOfStream);
        }
        Ok(WriteStatus::Written)
    }

    fn write_trailer(&mut self) -> Result<()> {
        if !self.open {
            return Err(SegmenterError::MuxerState("not open".to_string()));
        }
        self.record(MuxEvent::Trailer);
        Ok(())
    }

    fn flush_and_close(&mut self) -> Result<()> {
        if !self.open {
            return Err(SegmenterError::MuxerState("not open".to_string()));
        }
        self.open = false;
        self.record(MuxEvent::Close);
        Ok(())
    }
}

/// Notifier that keeps every notification it receives
pub struct RecordingNotifier {
    seen: Rc<RefCell<Vec<SegmentNotification>>>,
}

impl RecordingNotifier {
    pub fn new() -> (Self, Rc<RefCell<Vec<SegmentNotification>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        (Self { seen: seen.clone() }, seen)
    }
}

impl SegmentNotifier for RecordingNotifier {
    fn notify(&mut self, notification: &SegmentNotification) {
        self.seen.borrow_mut().push(notification.clone());
    }
}
