#![forbid(unsafe_code)]

//! Core domain model and counting logic for the repcount bicep-curl counter.
//!
//! This crate provides:
//! - Pose landmark schema and joint triplets
//! - Joint angle extraction
//! - Rep counting state machine with display smoothing
//! - Audible cue side channel
//! - Landmark stream input, per-frame trace export and session history

pub mod landmark;
pub mod error;
pub mod angle;
pub mod counter;
pub mod cue;
pub mod config;
pub mod logging;
pub mod source;
pub mod session;
pub mod trace;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use landmark::{Arm, JointTriplet, Landmark, LandmarkSet, PoseLandmark};
pub use angle::{compute_angle, AngleExtractor};
pub use counter::{
    step, CounterSettings, CounterState, CounterUpdate, Direction, LinearMap, RepCounter,
    TriggerPolicy,
};
pub use cue::{BellCue, CueEvent, CueSink, LogCue, NullCue};
pub use config::Config;
pub use source::{CoordinateSpace, FrameReader, InputRecord};
pub use session::{CountingSession, FrameOutcome, FrameStatus, SessionSummary};
pub use trace::TraceWriter;
pub use history::{load_recent, read_summaries, SessionLog};
