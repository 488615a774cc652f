//! Pipeline testing module
//!
//! Whole-run tests of the segmentation engine against scripted inputs:
//! - Key frame and audio-clock boundaries
//! - Segment numbering and notification order
//! - Failure handling during rotation and writes
//! - Run endings (end of input, read errors, stop flag, muxer end of stream)

pub mod fixtures;
