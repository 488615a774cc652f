//! Packet routing and segmentation clock
//!
//! Only video key frames advance the segmentation clock. When the input has
//! no video, audio timestamps drive it instead.

use ffmpeg_next as ffmpeg;

use super::mapper::StreamMap;
use crate::media::{pts_to_seconds, MediaPacket, StreamDescriptor, StreamRole};

/// A packet that survived routing, with its clock readings
#[derive(Debug)]
pub struct RoutedPacket<P> {
    pub packet: P,
    pub role: StreamRole,
    /// Segmentation clock value for this packet, in seconds
    pub segmentation_time: f64,
    /// Position of this packet on the reference clock, for packets of the
    /// clock stream that carry a timestamp
    pub presentation_time: Option<f64>,
}

/// Timestamp origin and timebase of the stream driving the clock
#[derive(Debug, Clone, Copy, PartialEq)]
struct Clock {
    stream_index: usize,
    time_base: ffmpeg::Rational,
    start_time: i64,
}

impl Clock {
    fn from_descriptor(stream: &StreamDescriptor) -> Self {
        Self {
            stream_index: stream.index,
            time_base: stream.time_base,
            start_time: stream.start_time.unwrap_or(0),
        }
    }

    fn seconds<P: MediaPacket>(&self, packet: &P) -> Option<f64> {
        let ts = packet.pts().or_else(|| packet.dts())?;
        Some(pts_to_seconds(ts - self.start_time, self.time_base))
    }
}

/// Classifies packets by stream role and computes segmentation times
#[derive(Debug, Clone)]
pub struct PacketRouter {
    map: StreamMap,
    reference: Option<Clock>,
    has_video: bool,
}

impl PacketRouter {
    pub fn new(map: StreamMap, inputs: &[StreamDescriptor]) -> Self {
        let has_video = map.has_video();
        let reference_index = map.video().or(map.audio());
        let reference = reference_index
            .and_then(|index| inputs.iter().find(|s| s.index == index))
            .map(Clock::from_descriptor);

        Self {
            map,
            reference,
            has_video,
        }
    }

    /// Route one packet. Packets of discarded streams are dropped here and
    /// `None` is returned.
    pub fn route<P: MediaPacket>(
        &self,
        packet: P,
        previous_boundary_time: f64,
    ) -> Option<RoutedPacket<P>> {
        let role = self.map.role(packet.stream_index());
        if role == StreamRole::Discard {
            return None;
        }

        let presentation_time = self
            .reference
            .filter(|clock| clock.stream_index == packet.stream_index())
            .and_then(|clock| clock.seconds(&packet));

        let advances_clock = match role {
            StreamRole::Video => packet.is_key(),
            StreamRole::Audio => !self.has_video,
            StreamRole::Discard => false,
        };

        let segmentation_time = if advances_clock {
            presentation_time.unwrap_or(previous_boundary_time)
        } else {
            previous_boundary_time
        };

        Some(RoutedPacket {
            packet,
            role,
            segmentation_time,
            presentation_time,
        })
    }
}
