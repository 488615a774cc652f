//! Segment boundary decisions

use super::router::RoutedPacket;

/// Whether a new segment must start before the current packet.
///
/// Greedy and backward-looking: a segment closes at the first clock value at
/// least `target` seconds past the previous boundary, so segments can run
/// long when key frames are sparse but never end early.
pub fn should_rotate(segmentation_time: f64, previous_boundary_time: f64, target: f64) -> bool {
    segmentation_time - previous_boundary_time >= target
}

/// Decision for one packet
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boundary {
    Continue,
    Rotate {
        /// New boundary time
        at: f64,
        /// Rotation forced by the overrun cap rather than a clock boundary
        forced: bool,
    },
}

/// Boundary detector with an optional overrun cap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryDetector {
    target: f64,
    max_overrun: Option<f64>,
}

impl BoundaryDetector {
    pub fn new(target: f64, max_overrun: Option<f64>) -> Self {
        Self {
            target,
            max_overrun,
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn evaluate<P>(&self, routed: &RoutedPacket<P>, previous_boundary_time: f64) -> Boundary {
        if should_rotate(routed.segmentation_time, previous_boundary_time, self.target) {
            return Boundary::Rotate {
                at: routed.segmentation_time,
                forced: false,
            };
        }

        match (self.max_overrun, routed.presentation_time) {
            (Some(cap), Some(now)) if now - previous_boundary_time >= self.target + cap => {
                Boundary::Rotate {
                    at: now,
                    forced: true,
                }
            }
            _ => Boundary::Continue,
        }
    }
}
