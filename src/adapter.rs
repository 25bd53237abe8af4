//! Adapter for reading landmark_frame.v1 input
//!
//! Frames arrive either as NDJSON (one frame per line, the streaming form
//! produced by a capture process) or as a single JSON array. Parsing only
//! checks syntax; [`FrameAdapter::validate_frames`] reports semantic problems
//! without rejecting the batch, since the pipeline skips bad frames anyway.

use crate::error::GestureError;
use crate::types::LandmarkFrame;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Schema identifier for landmark frame input
pub const FRAME_SCHEMA: &str = "landmark_frame.v1";

/// Adapter for parsing landmark frames
pub struct FrameAdapter;

impl FrameAdapter {
    /// Parse a JSON string containing an array of frames
    pub fn parse_array(json: &str) -> Result<Vec<LandmarkFrame>, GestureError> {
        let frames: Vec<LandmarkFrame> = serde_json::from_str(json)?;
        Ok(frames)
    }

    /// Parse a single NDJSON line; blank lines yield `None`
    pub fn parse_line(line: &str) -> Result<Option<LandmarkFrame>, GestureError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let frame = serde_json::from_str(trimmed)?;
        Ok(Some(frame))
    }

    /// Parse NDJSON (newline-delimited JSON) containing frames
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<LandmarkFrame>, GestureError> {
        let mut frames = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            match Self::parse_line(line) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => {}
                Err(e) => {
                    return Err(GestureError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(frames)
    }

    /// Validate a batch of frames.
    ///
    /// Checks every hand and the monotonicity of timestamps; only problems
    /// are returned.
    pub fn validate_frames(frames: &[LandmarkFrame]) -> Vec<FrameValidation> {
        let mut problems = Vec::new();
        let mut previous: Option<DateTime<Utc>> = None;

        for (index, frame) in frames.iter().enumerate() {
            for (hand_idx, hand) in frame.hands.iter().enumerate() {
                if let Err(e) = hand.validate() {
                    problems.push(FrameValidation {
                        index,
                        timestamp: frame.timestamp,
                        error: format!("hand {hand_idx}: {e}"),
                    });
                }
            }

            match previous {
                Some(prev) if frame.timestamp < prev => problems.push(FrameValidation {
                    index,
                    timestamp: frame.timestamp,
                    error: format!("timestamp precedes previous frame {}", prev.to_rfc3339()),
                }),
                _ => previous = Some(frame.timestamp),
            }
        }

        problems
    }
}

/// A problem found in one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameValidation {
    /// Position of the frame in the batch
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub error: String,
}
