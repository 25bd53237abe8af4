//! Temporal smoothing and debouncing
//!
//! Turns the per-frame classifier output into stable pointer events:
//! - positions pass through an EMA before any move is emitted
//! - a gesture is confirmed by majority vote over the last N samples
//! - every event kind has a cooldown; held discrete gestures repeat once per cooldown
//! - drag begin/end are strictly paired
//! - a missing hand is tolerated for a grace period before state is reset

use crate::config::DebounceConfig;
use crate::smoother::PositionSmoother;
use crate::types::{
    EventKind, Gesture, GestureSample, MouseButton, ScrollDirection, StableEvent, ZoomDirection,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace};

/// Tolerance for float comparisons in the vote
const VOTE_EPSILON: f64 = 1e-9;

/// Fewest agreeing samples that can confirm a gesture
const MIN_VOTES: usize = 2;

/// Per-frame input to the debouncer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// A classified frame
    Sample(GestureSample),
    /// A frame in which no hand was detected
    NoHand { timestamp: DateTime<Utc> },
}

impl Observation {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Observation::Sample(sample) => sample.timestamp,
            Observation::NoHand { timestamp } => *timestamp,
        }
    }
}

/// Rolling-window debouncer for one session
#[derive(Debug, Clone)]
pub struct GestureDebouncer {
    config: DebounceConfig,
    smoother: PositionSmoother,
    /// Recent votes; `None` marks a low-confidence abstention
    window: VecDeque<Option<Gesture>>,
    /// Gesture and start time of the current contiguous run
    run: Option<(Gesture, DateTime<Utc>)>,
    confirmed: Option<Gesture>,
    last_emitted: HashMap<EventKind, DateTime<Utc>>,
    /// Position of the last emitted move, drag begin, or drag end
    last_pointer: Option<(f64, f64)>,
    drag_active: bool,
    hand_lost_at: Option<DateTime<Utc>>,
    gap_handled: bool,
}

impl GestureDebouncer {
    pub fn new(config: DebounceConfig, alpha: f64) -> Self {
        Self {
            smoother: PositionSmoother::new(alpha),
            window: VecDeque::with_capacity(config.window_size),
            run: None,
            confirmed: None,
            last_emitted: HashMap::new(),
            last_pointer: None,
            drag_active: false,
            hand_lost_at: None,
            gap_handled: false,
            config,
        }
    }

    /// Feed one observation and collect the events it releases
    pub fn push(&mut self, observation: Observation) -> Vec<StableEvent> {
        match observation {
            Observation::Sample(sample) => self.on_sample(sample),
            Observation::NoHand { timestamp } => self.on_no_hand(timestamp),
        }
    }

    /// Lazily debounce an ordered sequence of observations
    pub fn events<'a, I>(&'a mut self, observations: I) -> impl Iterator<Item = StableEvent> + 'a
    where
        I: IntoIterator<Item = Observation>,
        I::IntoIter: 'a,
    {
        observations.into_iter().flat_map(move |o| self.push(o))
    }

    /// Gesture currently confirmed, if any
    pub fn confirmed(&self) -> Option<Gesture> {
        self.confirmed
    }

    /// Whether a drag begin is waiting for its end
    pub fn drag_outstanding(&self) -> bool {
        self.drag_active
    }

    pub fn smoothed_position(&self) -> Option<(f64, f64)> {
        self.smoother.current()
    }

    /// Number of samples currently in the vote window
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Drop unconfirmed state without emitting anything.
    ///
    /// Cooldown history and an outstanding drag survive so the caller can
    /// still release the pointer button.
    pub fn cancel(&mut self) {
        let drag_at = self.last_pointer.filter(|_| self.drag_active);
        self.clear_tracking();
        self.last_pointer = drag_at;
        self.hand_lost_at = None;
        self.gap_handled = false;
    }

    /// End an outstanding drag now, bypassing the drag cooldown.
    ///
    /// Used at shutdown so the pointer button is never left held.
    pub fn release_drag(&mut self, timestamp: DateTime<Utc>) -> Option<StableEvent> {
        if !self.drag_active {
            return None;
        }
        let (x, y) = self
            .last_pointer
            .or(self.smoother.current())
            .unwrap_or((0.5, 0.5));
        self.drag_active = false;
        self.last_emitted.insert(EventKind::DragEnd, timestamp);
        debug!(x, y, "outstanding drag released");
        Some(StableEvent::DragEnd { timestamp, x, y })
    }

    /// Restart the session from scratch
    pub fn reset(&mut self) {
        self.cancel();
        self.last_emitted.clear();
        self.drag_active = false;
    }

    fn clear_tracking(&mut self) {
        self.window.clear();
        self.run = None;
        self.confirmed = None;
        self.smoother.reset();
        self.last_pointer = None;
    }

    fn on_sample(&mut self, sample: GestureSample) -> Vec<StableEvent> {
        if let Some(lost_at) = self.hand_lost_at.take() {
            debug!(
                gap_ms = (sample.timestamp - lost_at).num_milliseconds(),
                "hand reacquired"
            );
        }
        self.gap_handled = false;

        let vote = if sample.confidence >= self.config.min_confidence {
            self.smoother.update(sample.x, sample.y);
            Some(sample.gesture)
        } else {
            trace!(
                gesture = sample.gesture.as_str(),
                confidence = sample.confidence,
                "low-confidence sample abstains"
            );
            None
        };

        self.window.push_back(vote);
        while self.window.len() > self.config.window_size {
            self.window.pop_front();
        }

        self.run = match (vote, self.run) {
            (Some(gesture), Some((current, since))) if gesture == current => Some((current, since)),
            (Some(gesture), _) => Some((gesture, sample.timestamp)),
            (None, _) => None,
        };

        let Some(position) = self.smoother.current() else {
            return Vec::new();
        };

        match self.winner() {
            None => Vec::new(),
            Some(gesture) if Some(gesture) == self.confirmed => {
                self.sustain(gesture, sample.timestamp, position)
            }
            Some(gesture) => self.transition(gesture, sample.timestamp, position),
        }
    }

    fn on_no_hand(&mut self, timestamp: DateTime<Utc>) -> Vec<StableEvent> {
        let lost_at = *self.hand_lost_at.get_or_insert_with(|| {
            debug!("hand lost");
            timestamp
        });

        if self.gap_handled || timestamp - lost_at < self.config.grace_period() {
            return Vec::new();
        }

        debug!(
            gap_ms = (timestamp - lost_at).num_milliseconds(),
            "no-hand grace period expired, resetting confirmation state"
        );
        let release_at = self.last_pointer.or(self.smoother.current());
        self.clear_tracking();

        let mut events = Vec::new();
        if self.drag_active {
            let (x, y) = release_at.unwrap_or((0.5, 0.5));
            match self.try_emit(StableEvent::DragEnd { timestamp, x, y }) {
                Some(event) => {
                    self.drag_active = false;
                    events.push(event);
                }
                // Retry the release on the next empty frame
                None => {
                    self.last_pointer = release_at;
                    return events;
                }
            }
        }
        self.gap_handled = true;
        events
    }

    /// Majority winner of the current window
    fn winner(&self) -> Option<Gesture> {
        let fraction = self.config.majority_fraction;
        // Never fewer than two agreeing samples
        let required = (fraction * self.config.window_size as f64 - VOTE_EPSILON)
            .ceil()
            .max(MIN_VOTES as f64) as usize;

        let mut counts: HashMap<Gesture, usize> = HashMap::new();
        for gesture in self.window.iter().flatten() {
            *counts.entry(*gesture).or_default() += 1;
        }

        let (gesture, votes) = counts.into_iter().max_by_key(|(_, votes)| *votes)?;
        let share = votes as f64 > fraction * self.window.len() as f64 + VOTE_EPSILON;
        trace!(gesture = gesture.as_str(), votes, required, "vote leader");

        (votes >= required && share).then_some(gesture)
    }

    /// A different gesture has won the vote
    fn transition(
        &mut self,
        gesture: Gesture,
        timestamp: DateTime<Utc>,
        position: (f64, f64),
    ) -> Vec<StableEvent> {
        // The newest sample must continue a long enough run of the winner
        match self.run {
            Some((current, since))
                if current == gesture && timestamp - since >= self.config.min_hold() => {}
            _ => return Vec::new(),
        }

        let (x, y) = position;
        let mut events = Vec::new();
        match gesture {
            Gesture::Idle => self.confirm(gesture),
            Gesture::Move => {
                self.confirm(gesture);
                events.extend(self.track(timestamp, position));
            }
            Gesture::DragStart => {
                if self.drag_active {
                    self.confirm(gesture);
                    events.extend(self.track(timestamp, position));
                } else if let Some(event) =
                    self.try_emit(StableEvent::DragBegin { timestamp, x, y })
                {
                    self.drag_active = true;
                    self.last_pointer = Some(position);
                    self.confirm(gesture);
                    events.push(event);
                }
            }
            Gesture::DragEnd => {
                if !self.drag_active {
                    self.confirm(gesture);
                } else if let Some(event) =
                    self.try_emit(StableEvent::DragEnd { timestamp, x, y })
                {
                    self.drag_active = false;
                    self.last_pointer = Some(position);
                    self.confirm(gesture);
                    events.push(event);
                }
            }
            Gesture::ZoomIn | Gesture::ZoomOut if self.drag_active => {
                // Switching the pointing hand to another two-hand pose ends the drag
                if let Some(event) = self.try_emit(StableEvent::DragEnd { timestamp, x, y }) {
                    self.drag_active = false;
                    self.last_pointer = Some(position);
                    self.confirm(gesture);
                    events.push(event);
                }
            }
            discrete => {
                if self.drag_active {
                    trace!(gesture = discrete.as_str(), "ignored while dragging");
                } else if let Some(event) = discrete_event(discrete, timestamp) {
                    if let Some(event) = self.try_emit(event) {
                        self.confirm(discrete);
                        events.push(event);
                    }
                }
            }
        }
        events
    }

    /// The confirmed gesture won the vote again
    fn sustain(
        &mut self,
        gesture: Gesture,
        timestamp: DateTime<Utc>,
        position: (f64, f64),
    ) -> Vec<StableEvent> {
        match gesture {
            Gesture::Move => self.track(timestamp, position).into_iter().collect(),
            Gesture::DragStart if self.drag_active => {
                self.track(timestamp, position).into_iter().collect()
            }
            Gesture::DragStart | Gesture::DragEnd | Gesture::Idle => Vec::new(),
            held => discrete_event(held, timestamp)
                .and_then(|event| self.try_emit(event))
                .into_iter()
                .collect(),
        }
    }

    /// Emit a move when the smoothed position has actually changed
    fn track(&mut self, timestamp: DateTime<Utc>, position: (f64, f64)) -> Option<StableEvent> {
        if let Some((lx, ly)) = self.last_pointer {
            let moved = ((position.0 - lx).powi(2) + (position.1 - ly).powi(2)).sqrt();
            if moved <= self.config.move_epsilon {
                return None;
            }
        }

        let event = self.try_emit(StableEvent::MoveTo {
            timestamp,
            x: position.0,
            y: position.1,
        })?;
        self.last_pointer = Some(position);
        Some(event)
    }

    /// Release an event unless its kind is still cooling down
    fn try_emit(&mut self, event: StableEvent) -> Option<StableEvent> {
        let kind = event.kind();
        let timestamp = event.timestamp();
        if let Some(last) = self.last_emitted.get(&kind) {
            if timestamp - *last < self.config.cooldown(kind) {
                trace!(kind = kind.as_str(), "suppressed by cooldown");
                return None;
            }
        }
        self.last_emitted.insert(kind, timestamp);
        Some(event)
    }

    fn confirm(&mut self, gesture: Gesture) {
        if self.confirmed != Some(gesture) {
            debug!(gesture = gesture.as_str(), "gesture confirmed");
        }
        self.confirmed = Some(gesture);
    }
}

/// Event for gestures that fire once per confirmation
fn discrete_event(gesture: Gesture, timestamp: DateTime<Utc>) -> Option<StableEvent> {
    let event = match gesture {
        Gesture::ClickLeft => StableEvent::Click {
            timestamp,
            button: MouseButton::Left,
        },
        Gesture::ClickRight => StableEvent::Click {
            timestamp,
            button: MouseButton::Right,
        },
        Gesture::ScrollUp => StableEvent::Scroll {
            timestamp,
            direction: ScrollDirection::Up,
        },
        Gesture::ScrollDown => StableEvent::Scroll {
            timestamp,
            direction: ScrollDirection::Down,
        },
        Gesture::ScrollLeft => StableEvent::Scroll {
            timestamp,
            direction: ScrollDirection::Left,
        },
        Gesture::ScrollRight => StableEvent::Scroll {
            timestamp,
            direction: ScrollDirection::Right,
        },
        Gesture::ZoomIn => StableEvent::Zoom {
            timestamp,
            direction: ZoomDirection::In,
        },
        Gesture::ZoomOut => StableEvent::Zoom {
            timestamp,
            direction: ZoomDirection::Out,
        },
        Gesture::Idle | Gesture::Move | Gesture::DragStart | Gesture::DragEnd => return None,
    };
    Some(event)
}
