//! Pointer command encoding
//!
//! Turns stable events into self-describing pointer commands in screen
//! pixels. The external emitter (an OS input injector) consumes these as
//! NDJSON; nothing in this crate touches the real pointer.

use crate::config::ScreenConfig;
use crate::error::GestureError;
use crate::types::{EventKind, MouseButton, ScrollDirection, StableEvent, ZoomDirection};
use crate::{PRODUCER_NAME, VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maps normalized positions onto the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenMapper {
    width: u32,
    height: u32,
    y_offset_px: i32,
}

impl ScreenMapper {
    pub fn new(config: &ScreenConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            y_offset_px: config.y_offset_px,
        }
    }

    /// Pixel coordinates for a normalized position, clamped to the screen
    pub fn to_pixels(&self, x: f64, y: f64) -> (i32, i32) {
        let px = scale(x, self.width);
        let py = scale(y, self.height).saturating_add(self.y_offset_px);
        (px, py.clamp(0, last_pixel(self.height)))
    }
}

fn last_pixel(extent: u32) -> i32 {
    i32::try_from(extent.saturating_sub(1)).unwrap_or(i32::MAX)
}

fn scale(v: f64, extent: u32) -> i32 {
    let scaled = (v.clamp(0.0, 1.0) * f64::from(extent)).floor();
    // NaN saturates to 0 on the cast
    (scaled as i32).min(last_pixel(extent))
}

/// Scroll or zoom direction of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandDirection {
    Scroll(ScrollDirection),
    Zoom(ZoomDirection),
}

/// Who produced a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandProducer {
    pub name: String,
    pub version: String,
    pub session_id: String,
}

/// One pointer instruction for the external emitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerCommand {
    pub command: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<MouseButton>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<CommandDirection>,
    /// Signed wheel or zoom steps; positive is up, right, or in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i32>,
    /// Timestamp of the frame that released the event
    pub timestamp: DateTime<Utc>,
    pub producer: CommandProducer,
}

/// Encoder for producing pointer commands
pub struct PointerEncoder {
    session_id: String,
    mapper: ScreenMapper,
    scroll_step: i32,
}

impl PointerEncoder {
    /// Create a new encoder with a unique session ID
    pub fn new(screen: &ScreenConfig) -> Self {
        Self::with_session_id(screen, Uuid::new_v4().to_string())
    }

    /// Create an encoder with a specific session ID
    pub fn with_session_id(screen: &ScreenConfig, session_id: String) -> Self {
        Self {
            session_id,
            mapper: ScreenMapper::new(screen),
            scroll_step: i32::try_from(screen.scroll_step).unwrap_or(i32::MAX),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Encode a stable event into a pointer command
    pub fn encode(&self, event: &StableEvent) -> PointerCommand {
        let mut command = PointerCommand {
            command: event.kind(),
            x: None,
            y: None,
            button: None,
            direction: None,
            amount: None,
            timestamp: event.timestamp(),
            producer: CommandProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                session_id: self.session_id.clone(),
            },
        };

        match *event {
            StableEvent::MoveTo { x, y, .. }
            | StableEvent::DragBegin { x, y, .. }
            | StableEvent::DragEnd { x, y, .. } => {
                let (px, py) = self.mapper.to_pixels(x, y);
                command.x = Some(px);
                command.y = Some(py);
            }
            StableEvent::Click { button, .. } => {
                command.button = Some(button);
            }
            StableEvent::Scroll { direction, .. } => {
                let sign = match direction {
                    ScrollDirection::Up | ScrollDirection::Right => 1,
                    ScrollDirection::Down | ScrollDirection::Left => -1,
                };
                command.direction = Some(CommandDirection::Scroll(direction));
                command.amount = Some(sign * self.scroll_step);
            }
            StableEvent::Zoom { direction, .. } => {
                command.direction = Some(CommandDirection::Zoom(direction));
                command.amount = Some(match direction {
                    ZoomDirection::In => 1,
                    ZoomDirection::Out => -1,
                });
            }
        }

        command
    }

    /// Encode to a single-line JSON string
    pub fn encode_to_json(&self, event: &StableEvent) -> Result<String, GestureError> {
        serde_json::to_string(&self.encode(event)).map_err(GestureError::JsonError)
    }
}
