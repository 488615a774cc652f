//! Pipeline driver
//!
//! Single-threaded loop: read a packet, route it, rotate the segment when a
//! boundary is reached, write the packet, repeat. At the end of the input
//! the last segment is closed and the terminal notification sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::SegmenterConfig;
use crate::error::Result;
use crate::media::{Demuxer, Muxer};
use crate::notify::{NotificationEmitter, SegmentNotifier};
use crate::segment::{
    map_streams, Boundary, BoundaryDetector, PacketOutcome, PacketRouter, Rotation,
    SegmentLayout, SegmentWriter, SegmentationState,
};

/// Why the processing loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The demuxer reached end of stream
    EndOfInput,
    /// The muxer asked for the stream to end
    MuxerEndOfStream,
    /// Reading from the input failed; treated as end of stream
    ReadError(String),
    /// The stop flag was raised
    Stopped,
    /// The next segment file could not be opened
    RotationFailed(String),
}

impl EndReason {
    /// The run ended the way live runs are expected to end
    pub fn is_clean(&self) -> bool {
        !matches!(self, EndReason::RotationFailed(_))
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of segments closed, equal to the terminal notification index
    pub segments: u32,
    pub packets_written: u64,
    /// Packets of discarded streams
    pub packets_discarded: u64,
    /// Packets dropped after a write failure
    pub write_failures: u64,
    pub end_reason: EndReason,
}

pub struct Pipeline<D, M, N>
where
    D: Demuxer,
    M: Muxer<Packet = D::Packet>,
    N: SegmentNotifier,
{
    demuxer: D,
    writer: SegmentWriter<M>,
    router: PacketRouter,
    detector: BoundaryDetector,
    emitter: NotificationEmitter<N>,
    state: SegmentationState,
    stop: Option<Arc<AtomicBool>>,
}

impl<D, M, N> Pipeline<D, M, N>
where
    D: Demuxer,
    M: Muxer<Packet = D::Packet>,
    N: SegmentNotifier,
{
    /// Map the input streams and register them with the muxer. Fails when
    /// the input carries nothing to segment or the muxer rejects a stream.
    pub fn new(config: &SegmenterConfig, mut demuxer: D, muxer: M, notifier: N) -> Result<Self> {
        let inputs = demuxer.streams().to_vec();
        let map = map_streams(&inputs, muxer.requires_global_header())?;

        let mut has_reference_video_stream = false;
        if let Some(video) = map.video() {
            match demuxer.open_decoder(video) {
                Ok(()) => has_reference_video_stream = true,
                Err(e) => tracing::warn!(
                    stream = video,
                    "{}; segmenting on demuxer key frame flags only",
                    e
                ),
            }
        }

        tracing::info!(
            video = ?map.video(),
            audio = ?map.audio(),
            discarded = inputs.len() - map.outputs().len(),
            "Stream mapping complete"
        );

        let writer = SegmentWriter::new(muxer, SegmentLayout::from_config(config), map.outputs())?;
        let state = SegmentationState::new(has_reference_video_stream);
        let emitter = NotificationEmitter::new(
            notifier,
            state.first_segment_index(),
            config.profile_payload.clone(),
        );

        Ok(Self {
            demuxer,
            writer,
            router: PacketRouter::new(map, &inputs),
            detector: BoundaryDetector::new(config.target_duration(), config.max_overrun_secs),
            emitter,
            state,
            stop: None,
        })
    }

    /// Stop cleanly at the next packet once `flag` is set.
    ///
    /// The flag is checked between reads. A read blocked on a stalled source
    /// is not interrupted, so the stop only takes effect once the source
    /// delivers another packet or closes.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn state(&self) -> &SegmentationState {
        &self.state
    }

    /// Run until the input ends. Only failing to open the first segment is
    /// returned as an error; everything after that ends in a summary.
    pub fn run(mut self) -> Result<RunSummary> {
        let first = self.writer.open_first(&self.state)?;
        tracing::info!(
            "Segmenting into {:?} every {}s",
            first,
            self.detector.target()
        );

        let mut packets_discarded = 0u64;
        let end_reason = loop {
            if self.stop_requested() {
                tracing::info!("Stop requested");
                break EndReason::Stopped;
            }

            let packet = match self.demuxer.read_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => {
                    tracing::info!("End of input");
                    break EndReason::EndOfInput;
                }
                Err(e) => {
                    tracing::error!("{}; ending run", e);
                    break EndReason::ReadError(e.to_string());
                }
            };

            let Some(routed) = self
                .router
                .route(packet, self.state.previous_boundary_time())
            else {
                packets_discarded += 1;
                continue;
            };

            if let Boundary::Rotate { at, forced } =
                self.detector.evaluate(&routed, self.state.previous_boundary_time())
            {
                if forced {
                    tracing::warn!(
                        segment = self.state.current_segment_index(),
                        at,
                        "No key frame within overrun cap, forcing rotation"
                    );
                }
                if let Some(end) = self.rotate_at(at) {
                    break end;
                }
            }

            if self.writer.write(routed.packet) == PacketOutcome::EndOfStream {
                break EndReason::MuxerEndOfStream;
            }
        };

        if let Some(closed) = self.writer.finish() {
            self.emitter.segment_closed(closed, true);
        }

        let summary = RunSummary {
            segments: self.emitter.last_emitted().unwrap_or(0),
            packets_written: self.writer.packets_written(),
            packets_discarded,
            write_failures: self.writer.write_failures(),
            end_reason,
        };

        tracing::info!(
            segments = summary.segments,
            packets_written = summary.packets_written,
            packets_discarded = summary.packets_discarded,
            write_failures = summary.write_failures,
            end_reason = ?summary.end_reason,
            "Run complete"
        );

        Ok(summary)
    }

    /// Close the current segment and open the next. Returns the end reason
    /// when the run cannot continue; the terminal notification has then
    /// been sent.
    fn rotate_at(&mut self, at: f64) -> Option<EndReason> {
        match self.writer.rotate(&mut self.state, at) {
            Ok(Rotation::Rotated { closed, opened }) => {
                tracing::debug!(closed, opened, at, "Rotated segment");
                self.emitter.segment_closed(closed, false);
                None
            }
            Ok(Rotation::OpenFailed { closed, error }) => {
                tracing::error!(segment = closed + 1, "{}; ending run", error);
                self.emitter.segment_closed(closed, true);
                Some(EndReason::RotationFailed(error.to_string()))
            }
            Err(e) => {
                // Nothing was open, so the last opened segment is the last one
                tracing::error!("{}; ending run", e);
                self.emitter
                    .segment_closed(self.state.current_segment_index(), true);
                Some(EndReason::RotationFailed(e.to_string()))
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::{video_stream, RecordingMuxer, RecordingNotifier, ScriptedDemuxer};

    #[test]
    fn test_rotation_without_open_segment_sends_terminal() {
        let demuxer = ScriptedDemuxer::new(vec![video_stream(0)], Vec::new());
        let (muxer, _log) = RecordingMuxer::new();
        let (notifier, seen) = RecordingNotifier::new();
        let mut pipeline =
            Pipeline::new(&SegmenterConfig::default(), demuxer, muxer, notifier).unwrap();

        let end = pipeline.rotate_at(10.0);
        assert!(matches!(end, Some(EndReason::RotationFailed(_))));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].last_segment_index, 1);
        assert!(seen[0].is_terminal);
        assert!(pipeline.emitter.terminal_sent());
    }

    #[test]
    fn test_rotation_notifies_closed_segment() {
        let demuxer = ScriptedDemuxer::new(vec![video_stream(0)], Vec::new());
        let (muxer, _log) = RecordingMuxer::new();
        let (notifier, seen) = RecordingNotifier::new();
        let mut pipeline =
            Pipeline::new(&SegmenterConfig::default(), demuxer, muxer, notifier).unwrap();
        pipeline.writer.open_first(&pipeline.state).unwrap();

        assert_eq!(pipeline.rotate_at(10.0), None);
        assert_eq!(pipeline.state().current_segment_index(), 2);
        assert_eq!(seen.borrow()[0].last_segment_index, 1);
        assert!(!seen.borrow()[0].is_terminal);
    }
}
