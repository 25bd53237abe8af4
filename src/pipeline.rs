//! Pipeline orchestration
//!
//! This module provides the public API for Gesture Pointer.
//! A [`GestureSession`] owns one classifier and one debouncer and drives
//! landmark frames through both:
//!
//! 1. GestureClassifier - Frame to gesture sample
//! 2. GestureDebouncer - Samples to stable events
//! 3. PointerSink - Stable events to the external pointer emitter

use crate::adapter::FrameAdapter;
use crate::classifier::GestureClassifier;
use crate::config::GestureConfig;
use crate::debouncer::{GestureDebouncer, Observation};
use crate::error::GestureError;
use crate::types::{Gesture, LandmarkFrame, StableEvent};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, never, select, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};
use uuid::Uuid;

/// Convert an NDJSON stream of landmark frames to stable events (stateless, one-shot).
///
/// # Example
/// ```ignore
/// let events = landmarks_to_events(&ndjson, &GestureConfig::default())?;
/// ```
pub fn landmarks_to_events(
    ndjson: &str,
    config: &GestureConfig,
) -> Result<Vec<StableEvent>, GestureError> {
    let frames = FrameAdapter::parse_ndjson(ndjson)?;
    let mut session = GestureSession::new(config)?;
    Ok(session.events(frames).collect())
}

/// Receiving side of the output: the pointer event emitter
pub trait PointerSink {
    fn emit(&mut self, event: &StableEvent) -> Result<(), GestureError>;
}

impl PointerSink for Vec<StableEvent> {
    fn emit(&mut self, event: &StableEvent) -> Result<(), GestureError> {
        self.push(*event);
        Ok(())
    }
}

impl PointerSink for Sender<StableEvent> {
    fn emit(&mut self, event: &StableEvent) -> Result<(), GestureError> {
        self.send(*event)
            .map_err(|e| GestureError::SinkError(e.to_string()))
    }
}

/// Counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Frames accepted by the classifier (including empty ones)
    pub frames: u64,
    /// Frames without a hand
    pub no_hand_frames: u64,
    /// Malformed or out-of-order frames that were skipped
    pub skipped_frames: u64,
    /// Stable events released
    pub events: u64,
}

/// Outcome of [`GestureSession::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Frames taken from the queue
    pub frames: u64,
    /// Frames skipped as invalid
    pub skipped: u64,
    /// Events handed to the sink
    pub events: u64,
    /// Whether the run ended on a stop signal rather than end of input
    pub stopped: bool,
    /// Whether a drag begin is still waiting for its end
    pub drag_outstanding: bool,
}

/// Cloneable handle that asks a running pipeline to stop
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Sender<()>,
}

impl StopHandle {
    pub fn stop(&self) {
        // A full slot means a stop is already pending
        let _ = self.tx.try_send(());
    }
}

/// Create a stop signal for [`GestureSession::run`]
pub fn stop_signal() -> (StopHandle, Receiver<()>) {
    let (tx, rx) = bounded(1);
    (StopHandle { tx }, rx)
}

/// Single-slot queue for handing frames from a capture thread to the pipeline
pub fn frame_queue() -> (Sender<LandmarkFrame>, Receiver<LandmarkFrame>) {
    bounded(1)
}

enum Next {
    Frame(LandmarkFrame),
    Stop,
    StopDetached,
    Exhausted,
}

/// Gesture-to-pointer mapping state for one camera session
pub struct GestureSession {
    id: Uuid,
    classifier: GestureClassifier,
    debouncer: GestureDebouncer,
    last_timestamp: Option<DateTime<Utc>>,
    stats: SessionStats,
}

impl GestureSession {
    /// Create a session, rejecting invalid configuration up front
    pub fn new(config: &GestureConfig) -> Result<Self, GestureError> {
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            classifier: GestureClassifier::new(config.classifier.clone()),
            debouncer: GestureDebouncer::new(config.debounce.clone(), config.smoothing.alpha),
            last_timestamp: None,
            stats: SessionStats::default(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn confirmed(&self) -> Option<Gesture> {
        self.debouncer.confirmed()
    }

    pub fn drag_outstanding(&self) -> bool {
        self.debouncer.drag_outstanding()
    }

    /// Process one frame, surfacing invalid input to the caller
    pub fn try_process_frame(
        &mut self,
        frame: &LandmarkFrame,
    ) -> Result<Vec<StableEvent>, GestureError> {
        if let Some(last) = self.last_timestamp {
            if frame.timestamp < last {
                return Err(GestureError::InvalidFrame(format!(
                    "timestamp {} precedes previous frame {}",
                    frame.timestamp.to_rfc3339(),
                    last.to_rfc3339()
                )));
            }
        }

        let observation = match self.classifier.classify(frame) {
            Ok(sample) => Observation::Sample(sample),
            Err(GestureError::NoHandDetected) => {
                self.stats.no_hand_frames += 1;
                Observation::NoHand {
                    timestamp: frame.timestamp,
                }
            }
            Err(e) => return Err(e),
        };

        self.last_timestamp = Some(frame.timestamp);
        self.stats.frames += 1;

        let events = self.debouncer.push(observation);
        for event in &events {
            debug!(session = %self.id, kind = event.kind().as_str(), "stable event");
        }
        self.stats.events += events.len() as u64;
        Ok(events)
    }

    /// Process one frame; invalid frames are traced and skipped
    pub fn process_frame(&mut self, frame: &LandmarkFrame) -> Vec<StableEvent> {
        match self.try_process_frame(frame) {
            Ok(events) => events,
            Err(e) => {
                self.stats.skipped_frames += 1;
                debug!(session = %self.id, error = %e, "skipping frame");
                Vec::new()
            }
        }
    }

    /// Lazily map a frame sequence to stable events
    pub fn events<I>(&mut self, frames: I) -> StableEvents<'_, I::IntoIter>
    where
        I: IntoIterator<Item = LandmarkFrame>,
    {
        StableEvents {
            session: self,
            frames: frames.into_iter(),
            pending: VecDeque::new(),
        }
    }

    /// Consume frames from a queue until it closes or a stop is signalled.
    ///
    /// Frames are processed one at a time in arrival order. A stop takes effect
    /// before the next frame: unconfirmed state is discarded and nothing further
    /// reaches the sink. An outstanding drag is reported in the summary so the
    /// caller can release the button.
    pub fn run<S>(
        &mut self,
        frames: &Receiver<LandmarkFrame>,
        stop: &Receiver<()>,
        sink: &mut S,
    ) -> Result<PipelineSummary, GestureError>
    where
        S: PointerSink + ?Sized,
    {
        info!(session = %self.id, "pipeline started");
        let mut stop = stop.clone();
        let mut summary = PipelineSummary::default();

        loop {
            let next = select! {
                recv(stop) -> msg => match msg {
                    Ok(()) => Next::Stop,
                    Err(_) => Next::StopDetached,
                },
                recv(frames) -> msg => msg.map_or(Next::Exhausted, Next::Frame),
            };

            let frame = match next {
                Next::Frame(frame) => frame,
                Next::Stop => {
                    summary.stopped = true;
                    break;
                }
                Next::StopDetached => {
                    stop = never();
                    continue;
                }
                Next::Exhausted => break,
            };

            // Stop is honored between frames only, so a frame's events are
            // never split from the state change that produced them
            if stop.try_recv().is_ok() {
                summary.stopped = true;
                break;
            }
            summary.frames += 1;

            let events = match self.try_process_frame(&frame) {
                Ok(events) => events,
                Err(e) if e.is_recoverable() => {
                    summary.skipped += 1;
                    self.stats.skipped_frames += 1;
                    debug!(session = %self.id, error = %e, "skipping frame");
                    continue;
                }
                Err(e) => return Err(e),
            };

            for event in &events {
                sink.emit(event)?;
                summary.events += 1;
            }
        }

        if summary.stopped {
            self.cancel();
        }
        summary.drag_outstanding = self.drag_outstanding();
        info!(
            session = %self.id,
            frames = summary.frames,
            events = summary.events,
            stopped = summary.stopped,
            "pipeline finished"
        );
        Ok(summary)
    }

    /// End an outstanding drag so the pointer button is released.
    ///
    /// Stamped with the last frame time; returns `None` when no drag is held.
    pub fn release_drag(&mut self) -> Option<StableEvent> {
        let timestamp = self.last_timestamp.unwrap_or_else(Utc::now);
        let event = self.debouncer.release_drag(timestamp)?;
        self.stats.events += 1;
        Some(event)
    }

    /// Discard unconfirmed state without emitting anything
    pub fn cancel(&mut self) {
        self.debouncer.cancel();
    }

    /// Start the session over, forgetting drags, cooldowns, and timestamps
    pub fn reset(&mut self) {
        self.debouncer.reset();
        self.last_timestamp = None;
        self.stats = SessionStats::default();
    }
}

/// Lazy iterator returned by [`GestureSession::events`]
pub struct StableEvents<'a, I> {
    session: &'a mut GestureSession,
    frames: I,
    pending: VecDeque<StableEvent>,
}

impl<'a, I> Iterator for StableEvents<'a, I>
where
    I: Iterator<Item = LandmarkFrame>,
{
    type Item = StableEvent;

    fn next(&mut self) -> Option<StableEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let frame = self.frames.next()?;
            self.pending.extend(self.session.process_frame(&frame));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::fixtures::*;
    use crate::types::{EventKind, Hand, Landmark, MouseButton};
    use crossbeam_channel::unbounded;
    use std::cell::Cell;

    const FRAME_MS: i64 = 33;

    fn config() -> GestureConfig {
        let mut config = GestureConfig::default();
        config.smoothing.alpha = 0.5;
        config.debounce.window_size = 5;
        config.debounce.majority_fraction = 0.6;
        config
    }

    fn scored(mut hand: Hand, score: f64) -> Hand {
        hand.score = score;
        hand
    }

    fn frames(range: std::ops::Range<i64>, hands: impl Fn() -> Vec<Hand>) -> Vec<LandmarkFrame> {
        range.map(|i| frame(i * FRAME_MS, hands())).collect()
    }

    fn kinds(events: &[StableEvent]) -> Vec<EventKind> {
        events.iter().map(|e| e.kind()).collect()
    }

    #[test]
    fn test_empty_frames_never_classify() {
        let mut session = GestureSession::new(&config()).unwrap();
        let events: Vec<_> = session
            .events((0..20).map(|i| LandmarkFrame::empty(at_ms(i * FRAME_MS))))
            .collect();

        assert!(events.is_empty());
        assert_eq!(session.confirmed(), None);
        assert_eq!(session.stats().no_hand_frames, 20);
    }

    #[test]
    fn test_steady_pointing_yields_single_move() {
        let mut session = GestureSession::new(&config()).unwrap();
        let input = frames(0..10, || vec![scored(pointing_at(0.5, 0.5), 0.9)]);
        let events: Vec<_> = session.events(input).collect();

        assert_eq!(events.len(), 1);
        match events[0] {
            StableEvent::MoveTo { timestamp, x, y } => {
                assert_eq!(timestamp, at_ms(2 * FRAME_MS));
                assert!((x - 0.5).abs() < 1e-9);
                assert!((y - 0.5).abs() < 1e-9);
            }
            other => panic!("expected MoveTo, got {other:?}"),
        }
        assert_eq!(session.confirmed(), Some(Gesture::Move));
    }

    #[test]
    fn test_open_palm_clicks_once_within_cooldown() {
        let mut session = GestureSession::new(&config()).unwrap();
        let events: Vec<_> = session.events(frames(0..15, || vec![open_palm()])).collect();

        assert_eq!(
            events,
            vec![StableEvent::Click {
                timestamp: at_ms(2 * FRAME_MS),
                button: MouseButton::Left
            }]
        );
    }

    #[test]
    fn test_drag_survives_brief_hand_loss() {
        let mut config = config();
        config.debounce.no_hand_grace_ms = 2000;
        let mut session = GestureSession::new(&config).unwrap();

        let palm = || translated(open_palm(), -0.25, 0.0);
        let mut input = frames(0..5, || vec![palm(), pointing_at(0.6, 0.4)]);
        input.extend((5..55).map(|i| LandmarkFrame::empty(at_ms(i * FRAME_MS))));
        input.extend(frames(55..70, || vec![pointing_at(0.3, 0.4)]));

        let events: Vec<_> = session.events(input).collect();
        let kinds = kinds(&events);
        assert_eq!(kinds[0], EventKind::DragBegin);
        assert!(!kinds.contains(&EventKind::DragEnd));
        assert!(session.drag_outstanding());
    }

    #[test]
    fn test_invalid_frames_are_skipped() {
        let mut session = GestureSession::new(&config()).unwrap();
        let broken = Hand::new(vec![Landmark::new(0.5, 0.5); 3]);

        let mut input = frames(0..2, || vec![open_palm()]);
        input.push(frame(2 * FRAME_MS, vec![broken]));
        input.extend(frames(3..4, || vec![open_palm()]));

        let events: Vec<_> = session.events(input).collect();
        assert_eq!(kinds(&events), vec![EventKind::Click]);
        assert_eq!(session.stats().skipped_frames, 1);
        assert_eq!(session.stats().frames, 3);
    }

    #[test]
    fn test_regressing_timestamp_is_invalid() {
        let mut session = GestureSession::new(&config()).unwrap();
        session.try_process_frame(&frame(100, vec![fist()])).unwrap();

        let result = session.try_process_frame(&frame(50, vec![fist()]));
        assert!(matches!(result, Err(GestureError::InvalidFrame(_))));

        // Equal timestamps are accepted
        assert!(session.try_process_frame(&frame(100, vec![fist()])).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config();
        config.smoothing.alpha = -1.0;
        assert!(matches!(
            GestureSession::new(&config),
            Err(GestureError::Configuration(_))
        ));
    }

    #[test]
    fn test_events_iterator_is_lazy() {
        let mut session = GestureSession::new(&config()).unwrap();
        let consumed = Cell::new(0);
        let input = frames(0..50, || vec![open_palm()])
            .into_iter()
            .inspect(|_| consumed.set(consumed.get() + 1));

        let first = session.events(input).next();
        assert!(matches!(first, Some(StableEvent::Click { .. })));
        assert_eq!(consumed.get(), 3);
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut a = GestureSession::new(&config()).unwrap();
        let mut b = GestureSession::new(&config()).unwrap();
        assert_ne!(a.id(), b.id());

        let clicks: Vec<_> = a.events(frames(0..5, || vec![open_palm()])).collect();
        assert_eq!(clicks.len(), 1);
        assert_eq!(b.confirmed(), None);
        assert_eq!(b.stats(), SessionStats::default());
    }

    #[test]
    fn test_run_until_exhausted() {
        let mut session = GestureSession::new(&config()).unwrap();
        let (frame_tx, frame_rx) = frame_queue();
        let (_stop, stop_rx) = stop_signal();

        let producer = std::thread::spawn(move || {
            for f in frames(0..10, || vec![open_palm()]) {
                frame_tx.send(f).unwrap();
            }
        });

        let mut sink: Vec<StableEvent> = Vec::new();
        let summary = session.run(&frame_rx, &stop_rx, &mut sink).unwrap();
        producer.join().unwrap();

        assert_eq!(summary.frames, 10);
        assert_eq!(summary.events, 1);
        assert!(!summary.stopped);
        assert_eq!(kinds(&sink), vec![EventKind::Click]);
    }

    #[test]
    fn test_run_forwards_to_channel_sink() {
        let mut session = GestureSession::new(&config()).unwrap();
        let (frame_tx, frame_rx) = unbounded();
        for f in frames(0..5, || vec![pinch()]) {
            frame_tx.send(f).unwrap();
        }
        drop(frame_tx);

        let (_stop, stop_rx) = stop_signal();
        let (mut event_tx, event_rx) = unbounded();
        session.run(&frame_rx, &stop_rx, &mut event_tx).unwrap();
        drop(event_tx);

        let received: Vec<_> = event_rx.iter().collect();
        assert!(matches!(
            received.as_slice(),
            [StableEvent::Click {
                button: MouseButton::Right,
                ..
            }]
        ));
    }

    #[test]
    fn test_stop_before_start_consumes_nothing() {
        let mut session = GestureSession::new(&config()).unwrap();
        let (frame_tx, frame_rx) = unbounded();
        for f in frames(0..5, || vec![open_palm()]) {
            frame_tx.send(f).unwrap();
        }

        let (stop, stop_rx) = stop_signal();
        stop.stop();
        stop.stop();

        let mut sink: Vec<StableEvent> = Vec::new();
        let summary = session.run(&frame_rx, &stop_rx, &mut sink).unwrap();
        assert!(summary.stopped);
        assert_eq!(summary.frames, 0);
        assert!(sink.is_empty());
    }

    /// Sink that signals stop once it has received `limit` events
    struct StopAfter {
        limit: usize,
        stop: StopHandle,
        events: Vec<StableEvent>,
    }

    impl StopAfter {
        fn new(limit: usize, stop: StopHandle) -> Self {
            Self {
                limit,
                stop,
                events: Vec::new(),
            }
        }
    }

    impl PointerSink for StopAfter {
        fn emit(&mut self, event: &StableEvent) -> Result<(), GestureError> {
            self.events.push(*event);
            if self.events.len() >= self.limit {
                self.stop.stop();
            }
            Ok(())
        }
    }

    #[test]
    fn test_stop_mid_stream_emits_nothing_further() {
        let mut session = GestureSession::new(&config()).unwrap();
        let (frame_tx, frame_rx) = unbounded();
        // Held palm over 3 s would click every 500 ms
        for i in 0..100 {
            frame_tx.send(frame(i * FRAME_MS, vec![open_palm()])).unwrap();
        }
        drop(frame_tx);

        let (stop, stop_rx) = stop_signal();
        let mut sink = StopAfter::new(1, stop);
        let summary = session.run(&frame_rx, &stop_rx, &mut sink).unwrap();

        assert!(summary.stopped);
        assert_eq!(summary.frames, 3);
        assert_eq!(sink.events.len(), 1);
        assert_eq!(session.confirmed(), None);
    }

    #[test]
    fn test_stop_reports_outstanding_drag() {
        let mut session = GestureSession::new(&config()).unwrap();
        let (frame_tx, frame_rx) = unbounded();
        let palm = || translated(open_palm(), -0.25, 0.0);
        for f in frames(0..5, || vec![palm(), pointing_at(0.6, 0.4)]) {
            frame_tx.send(f).unwrap();
        }
        drop(frame_tx);

        let (stop, stop_rx) = stop_signal();
        let mut sink = StopAfter::new(1, stop);
        let summary = session.run(&frame_rx, &stop_rx, &mut sink).unwrap();

        assert!(summary.stopped);
        assert!(summary.drag_outstanding);
        assert_eq!(kinds(&sink.events), vec![EventKind::DragBegin]);

        let release = session.release_drag();
        assert!(matches!(
            release,
            Some(StableEvent::DragEnd { timestamp, .. }) if timestamp == at_ms(2 * FRAME_MS)
        ));
        assert!(!session.drag_outstanding());
    }

    fn drag_cycles() -> Vec<LandmarkFrame> {
        let palm = || translated(open_palm(), -0.25, 0.0);
        let mut input = Vec::new();
        for cycle in 0..3 {
            let start = cycle * 24;
            input.extend(frames(start..start + 12, || vec![palm(), pointing_at(0.6, 0.4)]));
            input.extend(frames(start + 12..start + 24, || vec![palm(), fist()]));
        }
        input
    }

    fn drag_balance(events: &[StableEvent]) -> i64 {
        events.iter().fold(0, |open, e| match e.kind() {
            EventKind::DragBegin => open + 1,
            EventKind::DragEnd => open - 1,
            _ => open,
        })
    }

    #[test]
    fn test_stop_never_splits_drag_pairing() {
        let mut uninterrupted = GestureSession::new(&config()).unwrap();
        let all: Vec<_> = uninterrupted.events(drag_cycles()).collect();
        assert_eq!(
            kinds(&all),
            [EventKind::DragBegin, EventKind::DragEnd].repeat(3)
        );

        for limit in 1..=all.len() {
            let mut session = GestureSession::new(&config()).unwrap();
            let (frame_tx, frame_rx) = unbounded();
            for f in drag_cycles() {
                frame_tx.send(f).unwrap();
            }
            drop(frame_tx);

            let (stop, stop_rx) = stop_signal();
            let mut sink = StopAfter::new(limit, stop);
            let summary = session.run(&frame_rx, &stop_rx, &mut sink).unwrap();

            assert!(summary.stopped);
            assert_eq!(sink.events.len(), limit);
            // What the sink saw matches what the session believes is held
            assert_eq!(drag_balance(&sink.events), i64::from(summary.drag_outstanding));

            sink.events.extend(session.release_drag());
            assert_eq!(drag_balance(&sink.events), 0);
        }
    }

    #[test]
    fn test_dropped_stop_handle_does_not_stop() {
        let mut session = GestureSession::new(&config()).unwrap();
        let (frame_tx, frame_rx) = unbounded();
        for f in frames(0..5, || vec![open_palm()]) {
            frame_tx.send(f).unwrap();
        }
        drop(frame_tx);

        let (stop, stop_rx) = stop_signal();
        drop(stop);

        let mut sink: Vec<StableEvent> = Vec::new();
        let summary = session.run(&frame_rx, &stop_rx, &mut sink).unwrap();
        assert!(!summary.stopped);
        assert_eq!(summary.frames, 5);
    }

    #[test]
    fn test_landmarks_to_events_one_shot() {
        let ndjson: String = frames(0..4, || vec![open_palm()])
            .iter()
            .map(|f| serde_json::to_string(f).unwrap() + "\n")
            .collect();

        let events = landmarks_to_events(&ndjson, &config()).unwrap();
        assert_eq!(kinds(&events), vec![EventKind::Click]);
    }

    #[test]
    fn test_reset_clears_stats_and_timestamps() {
        let mut session = GestureSession::new(&config()).unwrap();
        session.process_frame(&frame(1000, vec![fist()]));
        session.reset();

        assert_eq!(session.stats(), SessionStats::default());
        assert!(session.try_process_frame(&frame(0, vec![fist()])).is_ok());
    }
}
