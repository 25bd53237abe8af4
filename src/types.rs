//! Core types for the Gesture Pointer pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: landmark frames, classified gesture samples, and stable pointer events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of landmarks the hand model produces per detected hand
pub const LANDMARKS_PER_HAND: usize = 21;

/// Named points of the 21-point hand topology, in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandLandmark {
    /// Position of this landmark in a hand's landmark list
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A normalized landmark point in image space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal position (0 = left edge, 1 = right edge)
    pub x: f64,
    /// Vertical position (0 = top edge, 1 = bottom edge)
    pub y: f64,
    /// Relative depth, wrist-anchored (optional in input)
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Planar distance to another landmark
    pub fn distance(&self, other: &Landmark) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Which hand the detector believes it saw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
}

fn default_score() -> f64 {
    1.0
}

/// One detected hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hand {
    /// Handedness label, when the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handedness: Option<Handedness>,
    /// Detection confidence (0-1)
    #[serde(default = "default_score")]
    pub score: f64,
    /// Landmarks in [`HandLandmark`] order
    pub landmarks: Vec<Landmark>,
}

impl Hand {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self {
            handedness: None,
            score: 1.0,
            landmarks,
        }
    }

    /// Look up a named landmark, if present
    pub fn point(&self, which: HandLandmark) -> Option<&Landmark> {
        self.landmarks.get(which.index())
    }

    /// Check landmark count, coordinate finiteness, and score range
    pub fn validate(&self) -> Result<(), String> {
        if self.landmarks.len() != LANDMARKS_PER_HAND {
            return Err(format!(
                "{} landmarks, expected {LANDMARKS_PER_HAND}",
                self.landmarks.len()
            ));
        }
        if let Some(pos) = self.landmarks.iter().position(|l| !l.is_finite()) {
            return Err(format!("landmark {pos} is not finite"));
        }
        if !(0.0..=1.0).contains(&self.score) {
            return Err(format!("score {} outside [0, 1]", self.score));
        }
        Ok(())
    }
}

/// Landmarks for all hands detected in one camera frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Capture time; increases monotonically within a session
    pub timestamp: DateTime<Utc>,
    /// Detected hands (possibly none)
    #[serde(default)]
    pub hands: Vec<Hand>,
}

impl LandmarkFrame {
    pub fn new(timestamp: DateTime<Utc>, hands: Vec<Hand>) -> Self {
        Self { timestamp, hands }
    }

    /// A frame in which the detector found nothing
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            hands: Vec::new(),
        }
    }
}

/// Discrete classification of hand pose intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    Idle,
    Move,
    ClickLeft,
    ClickRight,
    DragStart,
    DragEnd,
    ScrollUp,
    ScrollDown,
    ScrollLeft,
    ScrollRight,
    ZoomIn,
    ZoomOut,
}

impl Gesture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::Idle => "idle",
            Gesture::Move => "move",
            Gesture::ClickLeft => "click_left",
            Gesture::ClickRight => "click_right",
            Gesture::DragStart => "drag_start",
            Gesture::DragEnd => "drag_end",
            Gesture::ScrollUp => "scroll_up",
            Gesture::ScrollDown => "scroll_down",
            Gesture::ScrollLeft => "scroll_left",
            Gesture::ScrollRight => "scroll_right",
            Gesture::ZoomIn => "zoom_in",
            Gesture::ZoomOut => "zoom_out",
        }
    }
}

/// Classifier output for a single frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureSample {
    /// Timestamp of the source frame
    pub timestamp: DateTime<Utc>,
    /// Classified gesture symbol
    pub gesture: Gesture,
    /// Pointer position hint, normalized (0-1)
    pub x: f64,
    /// Pointer position hint, normalized (0-1)
    pub y: f64,
    /// Classification confidence (0-1)
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomDirection {
    In,
    Out,
}

/// Debounced decision handed to the pointer emitter
///
/// Positions are normalized (0-1); screen mapping happens in the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StableEvent {
    MoveTo {
        timestamp: DateTime<Utc>,
        x: f64,
        y: f64,
    },
    Click {
        timestamp: DateTime<Utc>,
        button: MouseButton,
    },
    DragBegin {
        timestamp: DateTime<Utc>,
        x: f64,
        y: f64,
    },
    DragEnd {
        timestamp: DateTime<Utc>,
        x: f64,
        y: f64,
    },
    Scroll {
        timestamp: DateTime<Utc>,
        direction: ScrollDirection,
    },
    Zoom {
        timestamp: DateTime<Utc>,
        direction: ZoomDirection,
    },
}

impl StableEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StableEvent::MoveTo { .. } => EventKind::Move,
            StableEvent::Click { .. } => EventKind::Click,
            StableEvent::DragBegin { .. } => EventKind::DragBegin,
            StableEvent::DragEnd { .. } => EventKind::DragEnd,
            StableEvent::Scroll { .. } => EventKind::Scroll,
            StableEvent::Zoom { .. } => EventKind::Zoom,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match *self {
            StableEvent::MoveTo { timestamp, .. }
            | StableEvent::Click { timestamp, .. }
            | StableEvent::DragBegin { timestamp, .. }
            | StableEvent::DragEnd { timestamp, .. }
            | StableEvent::Scroll { timestamp, .. }
            | StableEvent::Zoom { timestamp, .. } => timestamp,
        }
    }
}

/// Event categories that share a cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Move,
    Click,
    DragBegin,
    DragEnd,
    Scroll,
    Zoom,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Move => "move",
            EventKind::Click => "click",
            EventKind::DragBegin => "drag_begin",
            EventKind::DragEnd => "drag_end",
            EventKind::Scroll => "scroll",
            EventKind::Zoom => "zoom",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_indices_cover_hand_model() {
        assert_eq!(HandLandmark::Wrist.index(), 0);
        assert_eq!(HandLandmark::ThumbTip.index(), 4);
        assert_eq!(HandLandmark::IndexTip.index(), 8);
        assert_eq!(HandLandmark::MiddleMcp.index(), 9);
        assert_eq!(HandLandmark::PinkyTip.index(), LANDMARKS_PER_HAND - 1);
    }

    #[test]
    fn test_deserialize_frame_defaults() {
        let json = r#"{
            "timestamp": "2024-01-15T14:00:00Z",
            "hands": [{ "landmarks": [{ "x": 0.25, "y": 0.5 }] }]
        }"#;

        let frame: LandmarkFrame = serde_json::from_str(json).unwrap();
        let hand = &frame.hands[0];
        assert_eq!(hand.score, 1.0);
        assert!(hand.handedness.is_none());
        assert_eq!(hand.landmarks[0].z, 0.0);
        assert_eq!(hand.point(HandLandmark::Wrist), Some(&Landmark::new(0.25, 0.5)));
        assert!(hand.point(HandLandmark::IndexTip).is_none());
    }

    #[test]
    fn test_hand_validation() {
        let mut hand = Hand::new(vec![Landmark::new(0.5, 0.5); LANDMARKS_PER_HAND]);
        assert!(hand.validate().is_ok());

        hand.landmarks[3].y = f64::INFINITY;
        assert_eq!(hand.validate(), Err("landmark 3 is not finite".to_string()));

        hand.landmarks.pop();
        assert!(hand.validate().unwrap_err().contains("20 landmarks"));
    }

    #[test]
    fn test_frame_without_hands_field() {
        let frame: LandmarkFrame =
            serde_json::from_str(r#"{ "timestamp": "2024-01-15T14:00:00Z" }"#).unwrap();
        assert!(frame.hands.is_empty());
    }

    #[test]
    fn test_stable_event_tagging() {
        let timestamp = "2024-01-15T14:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let event = StableEvent::Click {
            timestamp,
            button: MouseButton::Right,
        };

        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value["event"], "click");
        assert_eq!(value["button"], "right");
        assert_eq!(event.kind(), EventKind::Click);
        assert_eq!(event.timestamp(), timestamp);
    }
}
