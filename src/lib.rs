//! Gesture Pointer - Hand-landmark gesture recognition for pointer control
//!
//! Gesture Pointer turns per-frame hand landmarks from an upstream detector into
//! debounced pointer events through a deterministic pipeline: frame adaptation
//! → gesture classification → smoothing and majority-vote debouncing → pointer
//! command encoding.
//!
//! Camera capture, landmark detection, and OS input injection live outside this
//! crate; frames come in as [`LandmarkFrame`]s and decisions leave as
//! [`StableEvent`]s through a [`PointerSink`].

pub mod adapter;
pub mod classifier;
pub mod config;
pub mod debouncer;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod smoother;
pub mod types;

pub use adapter::{FrameAdapter, FRAME_SCHEMA};
pub use classifier::GestureClassifier;
pub use config::GestureConfig;
pub use debouncer::GestureDebouncer;
pub use encoder::{PointerCommand, PointerEncoder, ScreenMapper};
pub use error::GestureError;
pub use pipeline::{
    frame_queue, landmarks_to_events, stop_signal, GestureSession, PipelineSummary, PointerSink,
    StopHandle,
};
pub use types::{Gesture, GestureSample, Hand, LandmarkFrame, StableEvent};

/// Crate version embedded in every pointer command
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for pointer commands
pub const PRODUCER_NAME: &str = "gesture-pointer";
