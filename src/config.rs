//! Configuration
//!
//! Every threshold used by the classifier, smoother, and debouncer is a named
//! option here. Configurations are validated before a session starts; an
//! invalid configuration is the only fatal error in the pipeline.

use crate::error::GestureError;
use crate::types::{EventKind, HandLandmark};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete mapper configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Geometric classification thresholds
    pub classifier: ClassifierConfig,
    /// Position smoothing
    pub smoothing: SmoothingConfig,
    /// Vote window, cooldowns, and grace period
    pub debounce: DebounceConfig,
    /// Normalized-to-pixel mapping and output scaling
    pub screen: ScreenConfig,
}

/// Geometric thresholds for gesture classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// A finger is extended when wrist→tip exceeds wrist→pip by this factor
    pub extension_ratio: f64,
    /// Thumb is extended when tip→pinky_mcp exceeds ip→pinky_mcp by this factor
    pub thumb_extension_ratio: f64,
    /// Thumb-to-middle fingertip distance, relative to palm size, that counts as a pinch
    pub pinch_ratio: f64,
    /// Normalized coordinate splitting scroll/zoom directions
    pub scroll_split: f64,
    /// Landmark used as the pointer position hint
    pub anchor: HandLandmark,
    /// Mirror x so positions match a selfie-view camera
    pub mirror_x: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            extension_ratio: 1.1,
            thumb_extension_ratio: 1.05,
            pinch_ratio: 0.3,
            scroll_split: 0.5,
            anchor: HandLandmark::IndexTip,
            mirror_x: true,
        }
    }
}

/// Exponential moving average over the position hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Weight of the newest sample (0 < alpha <= 1; 1 disables smoothing)
    pub alpha: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { alpha: 0.4 }
    }
}

/// Confirmation window and debounce timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Number of recent samples in the vote window
    pub window_size: usize,
    /// Share of the window a gesture must exceed to be confirmed
    pub majority_fraction: f64,
    /// Samples below this confidence abstain from the vote
    pub min_confidence: f64,
    /// Minimum length of the contiguous run that confirms a new gesture (ms)
    pub min_hold_ms: u64,
    /// Minimum time between clicks (ms)
    pub click_cooldown_ms: u64,
    /// Minimum time between scroll steps (ms)
    pub scroll_cooldown_ms: u64,
    /// Minimum time between zoom steps (ms)
    pub zoom_cooldown_ms: u64,
    /// Minimum time between two drag begins, or two drag ends (ms)
    pub drag_cooldown_ms: u64,
    /// Minimum time between pointer moves (ms)
    pub move_interval_ms: u64,
    /// Smoothed displacement below which no move is emitted
    pub move_epsilon: f64,
    /// How long a hand may vanish before the session resets (ms)
    pub no_hand_grace_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            majority_fraction: 0.6,
            min_confidence: 0.5,
            min_hold_ms: 0,
            click_cooldown_ms: 500,
            scroll_cooldown_ms: 100,
            zoom_cooldown_ms: 500,
            drag_cooldown_ms: 300,
            move_interval_ms: 16,
            move_epsilon: 0.002,
            no_hand_grace_ms: 750,
        }
    }
}

impl DebounceConfig {
    /// Cooldown that separates two events of the same kind
    pub fn cooldown(&self, kind: EventKind) -> Duration {
        let ms = match kind {
            EventKind::Move => self.move_interval_ms,
            EventKind::Click => self.click_cooldown_ms,
            EventKind::DragBegin | EventKind::DragEnd => self.drag_cooldown_ms,
            EventKind::Scroll => self.scroll_cooldown_ms,
            EventKind::Zoom => self.zoom_cooldown_ms,
        };
        Duration::milliseconds(ms as i64)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::milliseconds(self.no_hand_grace_ms as i64)
    }

    pub fn min_hold(&self) -> Duration {
        Duration::milliseconds(self.min_hold_ms as i64)
    }
}

/// Screen geometry for pixel output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Screen width in pixels
    pub width: u32,
    /// Screen height in pixels
    pub height: u32,
    /// Pixels added to y after scaling
    pub y_offset_px: i32,
    /// Wheel clicks per scroll event
    pub scroll_step: u32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            y_offset_px: 0,
            scroll_step: 50,
        }
    }
}

impl GestureConfig {
    /// Validate config values are within acceptable ranges.
    /// Returns the first invalid field as a configuration error.
    pub fn validate(&self) -> Result<(), GestureError> {
        let c = &self.classifier;
        if !c.extension_ratio.is_finite() || c.extension_ratio <= 0.0 {
            return Err(invalid(format!(
                "classifier.extension_ratio must be > 0, got {}",
                c.extension_ratio
            )));
        }
        if !c.thumb_extension_ratio.is_finite() || c.thumb_extension_ratio <= 0.0 {
            return Err(invalid(format!(
                "classifier.thumb_extension_ratio must be > 0, got {}",
                c.thumb_extension_ratio
            )));
        }
        if !(c.pinch_ratio > 0.0 && c.pinch_ratio <= 2.0) {
            return Err(invalid(format!(
                "classifier.pinch_ratio must be in (0, 2], got {}",
                c.pinch_ratio
            )));
        }
        if !(c.scroll_split > 0.0 && c.scroll_split < 1.0) {
            return Err(invalid(format!(
                "classifier.scroll_split must be in (0, 1), got {}",
                c.scroll_split
            )));
        }

        let alpha = self.smoothing.alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(invalid(format!(
                "smoothing.alpha must be in (0, 1], got {alpha}"
            )));
        }

        let d = &self.debounce;
        if d.window_size < 2 {
            return Err(invalid(format!(
                "debounce.window_size must be at least 2, got {}",
                d.window_size
            )));
        }
        if !(d.majority_fraction >= 0.5 && d.majority_fraction < 1.0) {
            return Err(invalid(format!(
                "debounce.majority_fraction must be in [0.5, 1), got {}",
                d.majority_fraction
            )));
        }
        if !(0.0..=1.0).contains(&d.min_confidence) {
            return Err(invalid(format!(
                "debounce.min_confidence must be in [0, 1], got {}",
                d.min_confidence
            )));
        }
        if !d.move_epsilon.is_finite() || d.move_epsilon < 0.0 {
            return Err(invalid(format!(
                "debounce.move_epsilon must be >= 0, got {}",
                d.move_epsilon
            )));
        }

        if self.screen.width == 0 || self.screen.height == 0 {
            return Err(invalid(format!(
                "screen size must be non-zero, got {}x{}",
                self.screen.width, self.screen.height
            )));
        }

        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, GestureError> {
        let config: Self = toml::from_str(content).map_err(|e| invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file
    pub fn load(path: &Path) -> Result<Self, GestureError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load config from file when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, GestureError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<(), GestureError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, GestureError> {
        toml::to_string_pretty(self).map_err(|e| invalid(e.to_string()))
    }
}

fn invalid(message: String) -> GestureError {
    GestureError::Configuration(message)
}
