//! Mutable segmentation state, owned by the pipeline loop

/// Index of the first segment of every run
pub const FIRST_SEGMENT_INDEX: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationState {
    previous_boundary_time: f64,
    current_segment_index: u32,
    first_segment_index: u32,
    has_reference_video_stream: bool,
}

impl SegmentationState {
    pub fn new(has_reference_video_stream: bool) -> Self {
        Self {
            previous_boundary_time: 0.0,
            current_segment_index: FIRST_SEGMENT_INDEX,
            first_segment_index: FIRST_SEGMENT_INDEX,
            has_reference_video_stream,
        }
    }

    /// Segmentation clock value at the most recent rotation
    pub fn previous_boundary_time(&self) -> f64 {
        self.previous_boundary_time
    }

    /// Index of the segment currently (or last) open
    pub fn current_segment_index(&self) -> u32 {
        self.current_segment_index
    }

    pub fn first_segment_index(&self) -> u32 {
        self.first_segment_index
    }

    /// A video stream is present and its decoder opened
    pub fn has_reference_video_stream(&self) -> bool {
        self.has_reference_video_stream
    }

    /// Index the next rotation will open
    pub fn next_segment_index(&self) -> u32 {
        self.current_segment_index + 1
    }

    /// Record a completed rotation: the next segment is open and the
    /// boundary moves to `at`. Returns the new segment index.
    pub fn commit_rotation(&mut self, at: f64) -> u32 {
        debug_assert!(
            at >= self.previous_boundary_time,
            "boundary time moved backwards: {} -> {}",
            self.previous_boundary_time,
            at
        );
        self.current_segment_index += 1;
        self.previous_boundary_time = self.previous_boundary_time.max(at);
        self.current_segment_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SegmentationState::new(true);
        assert_eq!(state.current_segment_index(), 1);
        assert_eq!(state.first_segment_index(), 1);
        assert_eq!(state.next_segment_index(), 2);
        assert_eq!(state.previous_boundary_time(), 0.0);
        assert!(state.has_reference_video_stream());
    }

    #[test]
    fn test_commit_rotation() {
        let mut state = SegmentationState::new(false);
        assert_eq!(state.commit_rotation(10.1), 2);
        assert_eq!(state.commit_rotation(20.5), 3);
        assert_eq!(state.current_segment_index(), 3);
        assert_eq!(state.first_segment_index(), 1);
        assert_eq!(state.previous_boundary_time(), 20.5);
    }
}
