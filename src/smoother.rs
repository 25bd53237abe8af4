//! Position smoothing
//!
//! Exponential moving average over the normalized pointer position hint.
//! The first sample seeds the average so a freshly detected hand does not
//! glide in from the origin.

use serde::{Deserialize, Serialize};

/// EMA filter over a 2-D normalized position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSmoother {
    /// Weight of the newest sample
    alpha: f64,
    /// Current smoothed position, if seeded
    state: Option<(f64, f64)>,
}

impl PositionSmoother {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, state: None }
    }

    /// Feed a raw position and return the smoothed one.
    ///
    /// Written as `s + α(x − s)` so an input equal to the current state
    /// leaves it bit-for-bit unchanged.
    pub fn update(&mut self, x: f64, y: f64) -> (f64, f64) {
        let next = match self.state {
            Some((sx, sy)) => (sx + self.alpha * (x - sx), sy + self.alpha * (y - sy)),
            None => (x, y),
        };
        self.state = Some(next);
        next
    }

    pub fn current(&self) -> Option<(f64, f64)> {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}
