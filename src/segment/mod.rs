//! Segmentation engine
//!
//! Stream mapping, packet routing, boundary detection and segment file
//! rotation.

pub mod boundary;
pub mod mapper;
pub mod router;
pub mod state;
pub mod writer;

pub use boundary::{should_rotate, Boundary, BoundaryDetector};
pub use mapper::{map_streams, StreamMap};
pub use router::{PacketRouter, RoutedPacket};
pub use state::{SegmentationState, FIRST_SEGMENT_INDEX};
pub use writer::{PacketOutcome, Rotation, SegmentLayout, SegmentWriter};
