//! Segment file writer
//!
//! Owns the muxer and the currently open segment. Rotation closes the
//! current file before the next one is opened, so a packet is always written
//! to exactly one segment.

use std::path::{Path, PathBuf};

use crate::config::SegmenterConfig;
use crate::error::{Result, SegmenterError};
use crate::media::{MediaPacket, Muxer, OutputStream, WriteStatus};

use super::state::SegmentationState;

/// Naming scheme of segment files: `{dir}/{prefix}-{index:05}.{ext}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLayout {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl SegmentLayout {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &SegmenterConfig) -> Self {
        Self::new(
            &config.output_dir,
            &config.filename_prefix,
            &config.output.extension,
        )
    }

    pub fn path_for(&self, index: u32) -> PathBuf {
        self.dir
            .join(format!("{}-{:05}.{}", self.prefix, index, self.extension))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum WriterState {
    NoSegmentOpen,
    Open { index: u32, path: PathBuf },
    Closed,
}

/// What happened to a packet handed to the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    Written,
    /// The packet was released without being written
    Dropped,
    /// Written, and the muxer asked for the stream to end
    EndOfStream,
}

/// Result of a rotation attempt
#[derive(Debug)]
pub enum Rotation {
    Rotated { closed: u32, opened: u32 },
    /// The current segment was closed but the next one could not be opened
    OpenFailed { closed: u32, error: SegmenterError },
}

pub struct SegmentWriter<M: Muxer> {
    muxer: M,
    layout: SegmentLayout,
    state: WriterState,
    packets_written: u64,
    write_failures: u64,
}

impl<M: Muxer> SegmentWriter<M> {
    /// Register the output streams with the muxer. Allocation failures are
    /// fatal.
    pub fn new(mut muxer: M, layout: SegmentLayout, streams: &[OutputStream]) -> Result<Self> {
        muxer.create_container(streams)?;
        Ok(Self {
            muxer,
            layout,
            state: WriterState::NoSegmentOpen,
            packets_written: 0,
            write_failures: 0,
        })
    }

    /// Open the run's first segment
    pub fn open_first(&mut self, state: &SegmentationState) -> Result<&Path> {
        if self.state != WriterState::NoSegmentOpen {
            return Err(SegmenterError::MuxerState(
                "first segment already opened".to_string(),
            ));
        }
        self.open(state.current_segment_index())?;
        self.current_path()
            .ok_or_else(|| SegmenterError::MuxerState("segment not open".to_string()))
    }

    fn open(&mut self, index: u32) -> Result<()> {
        let path = self.layout.path_for(index);

        self.muxer
            .open_output(&path)
            .map_err(|e| SegmenterError::OpenSegment {
                index,
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if let Err(e) = self.muxer.write_header() {
            if let Err(close_err) = self.muxer.flush_and_close() {
                tracing::warn!(segment = index, "Failed to close {:?}: {}", path, close_err);
            }
            return Err(SegmenterError::WriteHeader {
                index,
                reason: e.to_string(),
            });
        }

        tracing::debug!(segment = index, "Opened segment {:?}", path);
        self.state = WriterState::Open { index, path };
        Ok(())
    }

    /// Append a packet to the open segment. Write failures drop the packet
    /// and leave the segment open.
    pub fn write(&mut self, packet: M::Packet) -> PacketOutcome {
        let index = match &self.state {
            WriterState::Open { index, .. } => *index,
            _ => {
                tracing::debug!(
                    stream = packet.stream_index(),
                    "No segment open, dropping packet"
                );
                return PacketOutcome::Dropped;
            }
        };

        let stream = packet.stream_index();
        let pts = packet.pts();
        match self.muxer.write_packet(packet) {
            Ok(WriteStatus::Written) => {
                self.packets_written += 1;
                PacketOutcome::Written
            }
            Ok(WriteStatus::EndOfStream) => {
                self.packets_written += 1;
                tracing::info!(segment = index, "End of stream requested by muxer");
                PacketOutcome::EndOfStream
            }
            Err(e) => {
                self.write_failures += 1;
                tracing::warn!(
                    segment = index,
                    stream,
                    pts = ?pts,
                    "Dropping packet: {}",
                    e
                );
                PacketOutcome::Dropped
            }
        }
    }

    /// Close the current segment and open the next one. The boundary time in
    /// `state` only moves when the next segment opened.
    pub fn rotate(&mut self, state: &mut SegmentationState, at: f64) -> Result<Rotation> {
        let closed = self
            .close_current()
            .ok_or_else(|| SegmenterError::MuxerState("rotation without open segment".to_string()))?;

        let next = state.next_segment_index();
        match self.open(next) {
            Ok(()) => {
                let opened = state.commit_rotation(at);
                Ok(Rotation::Rotated { closed, opened })
            }
            Err(error) => Ok(Rotation::OpenFailed { closed, error }),
        }
    }

    /// Write the trailer and close the open segment, if any. Returns the
    /// index of the segment closed.
    pub fn finish(&mut self) -> Option<u32> {
        let closed = self.close_current();
        self.state = WriterState::Closed;
        closed
    }

    fn close_current(&mut self) -> Option<u32> {
        let (index, path) = match std::mem::replace(&mut self.state, WriterState::NoSegmentOpen) {
            WriterState::Open { index, path } => (index, path),
            other => {
                self.state = other;
                return None;
            }
        };

        // A segment whose trailer failed still holds every packet written
        // before it, so it counts as closed.
        if let Err(e) = self.muxer.write_trailer() {
            tracing::error!(
                segment = index,
                "{}",
                SegmenterError::WriteTrailer {
                    index,
                    reason: e.to_string()
                }
            );
        }
        if let Err(e) = self.muxer.flush_and_close() {
            tracing::error!(segment = index, "Failed to close {:?}: {}", path, e);
        }

        tracing::debug!(segment = index, "Closed segment {:?}", path);
        Some(index)
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, WriterState::Open { .. })
    }

    pub fn current_path(&self) -> Option<&Path> {
        match &self.state {
            WriterState::Open { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }
}
