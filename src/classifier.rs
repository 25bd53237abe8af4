//! Gesture classification
//!
//! Maps a single landmark frame to a discrete gesture symbol and a pointer
//! position hint. Classification depends only on the frame and the
//! configured thresholds; all temporal behavior lives in the debouncer.
//!
//! Single hand, in order of precedence:
//! - index finger only → move
//! - index + middle → vertical scroll (up in the upper half, down in the lower)
//! - index + pinky → horizontal scroll (by side of the view)
//! - open palm → left click
//! - thumb/middle pinch → right click
//!
//! Two hands, one showing an open palm:
//! - other hand pointing → drag start
//! - other hand index + middle → zoom (in above the split, out below)
//! - other hand a fist → drag end

use crate::config::ClassifierConfig;
use crate::error::GestureError;
use crate::types::{Gesture, GestureSample, Hand, HandLandmark, Landmark, LandmarkFrame};
use chrono::{DateTime, Utc};

/// Stateless classifier for landmark frames
#[derive(Debug, Clone, Default)]
pub struct GestureClassifier {
    config: ClassifierConfig,
}

impl GestureClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one frame.
    ///
    /// Fails with [`GestureError::NoHandDetected`] when the frame holds no
    /// hands and [`GestureError::InvalidFrame`] when a hand is malformed.
    /// Only the first two hands are considered.
    pub fn classify(&self, frame: &LandmarkFrame) -> Result<GestureSample, GestureError> {
        if frame.hands.is_empty() {
            return Err(GestureError::NoHandDetected);
        }

        let hands = &frame.hands[..frame.hands.len().min(2)];
        let poses = hands
            .iter()
            .enumerate()
            .map(|(idx, hand)| Pose::new(idx, hand))
            .collect::<Result<Vec<_>, _>>()?;

        if let [first, second] = poses.as_slice() {
            if let Some(sample) = self.classify_pair(frame.timestamp, first, second) {
                return Ok(sample);
            }
        }

        Ok(self.classify_single(frame.timestamp, &poses[0]))
    }

    fn classify_single(&self, timestamp: DateTime<Utc>, pose: &Pose<'_>) -> GestureSample {
        let fingers = self.fingers(pose);
        let split = self.config.scroll_split;

        let gesture = if fingers.index_only() {
            Gesture::Move
        } else if fingers.index_and_middle() {
            let y = mean(pose.at(HandLandmark::IndexTip).y, pose.at(HandLandmark::MiddleTip).y);
            if y < split {
                Gesture::ScrollUp
            } else {
                Gesture::ScrollDown
            }
        } else if fingers.index_and_pinky() {
            let x = self.view_x(mean(
                pose.at(HandLandmark::IndexTip).x,
                pose.at(HandLandmark::PinkyTip).x,
            ));
            if x > split {
                Gesture::ScrollRight
            } else {
                Gesture::ScrollLeft
            }
        } else if fingers.open_palm() {
            Gesture::ClickLeft
        } else if self.is_pinch(pose) {
            Gesture::ClickRight
        } else {
            Gesture::Idle
        };

        self.sample(timestamp, gesture, pose, pose.hand.score)
    }

    fn classify_pair(
        &self,
        timestamp: DateTime<Utc>,
        first: &Pose<'_>,
        second: &Pose<'_>,
    ) -> Option<GestureSample> {
        for (palm, other) in [(first, second), (second, first)] {
            if !self.fingers(palm).open_palm() {
                continue;
            }

            let fingers = self.fingers(other);
            let gesture = if fingers.index_only() {
                Gesture::DragStart
            } else if fingers.index_and_middle() {
                let y = mean(
                    other.at(HandLandmark::IndexTip).y,
                    other.at(HandLandmark::MiddleTip).y,
                );
                if y < self.config.scroll_split {
                    Gesture::ZoomIn
                } else {
                    Gesture::ZoomOut
                }
            } else if fingers.fist() {
                Gesture::DragEnd
            } else {
                continue;
            };

            let confidence = palm.hand.score.min(other.hand.score);
            return Some(self.sample(timestamp, gesture, other, confidence));
        }
        None
    }

    fn sample(
        &self,
        timestamp: DateTime<Utc>,
        gesture: Gesture,
        pose: &Pose<'_>,
        confidence: f64,
    ) -> GestureSample {
        let anchor = pose.at(self.config.anchor);
        GestureSample {
            timestamp,
            gesture,
            x: self.view_x(anchor.x).clamp(0.0, 1.0),
            y: anchor.y.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Horizontal coordinate as the user sees it
    fn view_x(&self, x: f64) -> f64 {
        if self.config.mirror_x {
            1.0 - x
        } else {
            x
        }
    }

    fn fingers(&self, pose: &Pose<'_>) -> FingerState {
        let ratio = self.config.extension_ratio;
        let wrist = pose.at(HandLandmark::Wrist);
        let extended = |pip: HandLandmark, tip: HandLandmark| {
            wrist.distance(&pose.at(tip)) > ratio * wrist.distance(&pose.at(pip))
        };

        let pinky_mcp = pose.at(HandLandmark::PinkyMcp);
        let thumb = pinky_mcp.distance(&pose.at(HandLandmark::ThumbTip))
            > self.config.thumb_extension_ratio
                * pinky_mcp.distance(&pose.at(HandLandmark::ThumbIp));

        FingerState {
            thumb,
            index: extended(HandLandmark::IndexPip, HandLandmark::IndexTip),
            middle: extended(HandLandmark::MiddlePip, HandLandmark::MiddleTip),
            ring: extended(HandLandmark::RingPip, HandLandmark::RingTip),
            pinky: extended(HandLandmark::PinkyPip, HandLandmark::PinkyTip),
        }
    }

    fn is_pinch(&self, pose: &Pose<'_>) -> bool {
        let palm = pose
            .at(HandLandmark::Wrist)
            .distance(&pose.at(HandLandmark::MiddleMcp));
        if palm <= f64::EPSILON {
            return false;
        }
        let gap = pose
            .at(HandLandmark::ThumbTip)
            .distance(&pose.at(HandLandmark::MiddleTip));
        gap / palm < self.config.pinch_ratio
    }
}

/// A hand whose landmark list has been checked
struct Pose<'a> {
    hand: &'a Hand,
}

impl<'a> Pose<'a> {
    fn new(idx: usize, hand: &'a Hand) -> Result<Self, GestureError> {
        hand.validate()
            .map_err(|e| GestureError::InvalidFrame(format!("hand {idx}: {e}")))?;
        Ok(Self { hand })
    }

    fn at(&self, which: HandLandmark) -> Landmark {
        self.hand.landmarks[which.index()]
    }
}

#[derive(Debug, Clone, Copy)]
struct FingerState {
    thumb: bool,
    index: bool,
    middle: bool,
    ring: bool,
    pinky: bool,
}

impl FingerState {
    fn index_only(&self) -> bool {
        self.index && !(self.middle || self.ring || self.pinky)
    }

    fn index_and_middle(&self) -> bool {
        self.index && self.middle && !(self.ring || self.pinky)
    }

    fn index_and_pinky(&self) -> bool {
        self.index && self.pinky && !(self.middle || self.ring)
    }

    fn open_palm(&self) -> bool {
        self.thumb && self.index && self.middle && self.ring && self.pinky
    }

    fn fist(&self) -> bool {
        !(self.index || self.middle || self.ring || self.pinky)
    }
}

fn mean(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

/// Synthetic hands for tests across the crate.
///
/// The wrist sits at (0.5, 0.8) and fingers point up the image. Extended
/// fingers reach y = 0.4; curled fingers fold back below their knuckles.
#[cfg(test)]
pub(crate) mod fixtures {
    use crate::types::{Hand, HandLandmark, Landmark, LandmarkFrame};
    use chrono::{DateTime, Duration, Utc};

    pub fn t0() -> DateTime<Utc> {
        "2024-01-15T14:00:00Z".parse().unwrap()
    }

    pub fn at_ms(ms: i64) -> DateTime<Utc> {
        t0() + Duration::milliseconds(ms)
    }

    fn finger(x: f64, extended: bool) -> [Landmark; 4] {
        if extended {
            [
                Landmark::new(x, 0.6),
                Landmark::new(x, 0.5),
                Landmark::new(x, 0.45),
                Landmark::new(x, 0.4),
            ]
        } else {
            [
                Landmark::new(x, 0.6),
                Landmark::new(x, 0.52),
                Landmark::new(x, 0.56),
                Landmark::new(x, 0.62),
            ]
        }
    }

    fn thumb(tip: Landmark) -> [Landmark; 4] {
        [
            Landmark::new(0.42, 0.75),
            Landmark::new(0.38, 0.7),
            Landmark::new(0.34, 0.66),
            tip,
        ]
    }

    fn build(thumb_tip: Landmark, fingers: [bool; 4]) -> Hand {
        let mut landmarks = vec![Landmark::new(0.5, 0.8)];
        landmarks.extend(thumb(thumb_tip));
        for (x, extended) in [0.45, 0.5, 0.55, 0.6].into_iter().zip(fingers) {
            landmarks.extend(finger(x, extended));
        }
        Hand::new(landmarks)
    }

    /// Hand with the given fingers extended: thumb, index, middle, ring, pinky
    pub fn hand(thumb: bool, index: bool, middle: bool, ring: bool, pinky: bool) -> Hand {
        let tip = if thumb {
            Landmark::new(0.3, 0.62)
        } else {
            Landmark::new(0.42, 0.68)
        };
        build(tip, [index, middle, ring, pinky])
    }

    /// Curled hand with the thumb tip touching the middle fingertip
    pub fn pinch() -> Hand {
        build(Landmark::new(0.49, 0.62), [false; 4])
    }

    pub fn pointing() -> Hand {
        hand(false, true, false, false, false)
    }

    pub fn open_palm() -> Hand {
        hand(true, true, true, true, true)
    }

    pub fn fist() -> Hand {
        hand(false, false, false, false, false)
    }

    pub fn translated(mut hand: Hand, dx: f64, dy: f64) -> Hand {
        for landmark in &mut hand.landmarks {
            landmark.x += dx;
            landmark.y += dy;
        }
        hand
    }

    /// Pointing hand translated so the index tip lands on (x, y) in raw image space
    pub fn pointing_at(x: f64, y: f64) -> Hand {
        let tip = pointing().landmarks[HandLandmark::IndexTip.index()];
        translated(pointing(), x - tip.x, y - tip.y)
    }

    pub fn frame(ms: i64, hands: Vec<Hand>) -> LandmarkFrame {
        LandmarkFrame::new(at_ms(ms), hands)
    }
}
