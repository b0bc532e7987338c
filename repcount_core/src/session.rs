//! Counting sessions.
//!
//! A session owns everything needed to count one landmark stream: the
//! angle extractor, the counter state and the cue sink. Streams never share
//! a session, so no synchronization is needed.

use crate::{
    AngleExtractor, Config, CounterSettings, CounterState, CueSink, FrameReader, InputRecord,
    JointTriplet, LandmarkSet, RepCounter, Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use uuid::Uuid;

/// What happened to one record of the stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    /// Angle computed and counter updated
    Processed,
    /// Empty landmark set
    NoPerson,
    /// Person found but part of the joint triplet is missing
    MissingLandmark,
    /// Reset record applied
    Reset,
}

impl FrameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameStatus::Processed => "processed",
            FrameStatus::NoPerson => "no_person",
            FrameStatus::MissingLandmark => "missing_landmark",
            FrameStatus::Reset => "reset",
        }
    }
}

/// Per-record output handed to whatever renders the frame
///
/// Skipped frames still carry the (unchanged) counter state so a renderer
/// can keep drawing the last known values.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameOutcome {
    /// Zero-based position of the record in the stream
    pub frame: u64,
    pub status: FrameStatus,
    pub angle: Option<f64>,
    pub target_percentage: Option<f64>,
    pub smoothed_percentage: f64,
    pub smoothed_bar_position: f64,
    pub count: f64,
    pub direction: u8,
    pub counted: bool,
    pub at_extreme: bool,
    pub cue: bool,
}

impl FrameOutcome {
    fn unchanged(frame: u64, status: FrameStatus, state: &CounterState) -> Self {
        Self {
            frame,
            status,
            angle: None,
            target_percentage: None,
            smoothed_percentage: state.smoothed_percentage,
            smoothed_bar_position: state.smoothed_bar_position,
            count: state.count(),
            direction: state.direction.as_index(),
            counted: false,
            at_extreme: false,
            cue: false,
        }
    }
}

/// Record of a finished session, appended to the history log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub joint: JointTriplet,
    pub count: f64,
    pub whole_reps: u32,
    pub frames: u64,
    pub processed: u64,
    pub no_person: u64,
    pub missing_landmark: u64,
    pub cues: u64,
    pub resets: u64,
}

#[derive(Clone, Copy, Debug, Default)]
struct Tally {
    records: u64,
    frames: u64,
    processed: u64,
    no_person: u64,
    missing_landmark: u64,
    cues: u64,
    resets: u64,
}

/// One landmark stream being counted
pub struct CountingSession<C> {
    id: Uuid,
    started_at: DateTime<Utc>,
    extractor: AngleExtractor,
    counter: RepCounter,
    cue: C,
    tally: Tally,
}

impl<C: CueSink> CountingSession<C> {
    /// Start a session from configuration
    ///
    /// A joint triplet outside the pose schema or unusable calibration fails
    /// here rather than on the first frame.
    pub fn new(config: &Config, cue: C) -> Result<Self> {
        Self::with_parts(config.joint_triplet()?, config.counter_settings()?, cue)
    }

    pub fn with_parts(triplet: JointTriplet, settings: CounterSettings, cue: C) -> Result<Self> {
        let counter = RepCounter::new(settings)?;
        let session = Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            extractor: AngleExtractor::new(triplet),
            counter,
            cue,
            tally: Tally::default(),
        };
        tracing::info!("Started session {} tracking {}", session.id, triplet);
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &CounterState {
        self.counter.state()
    }

    pub fn process(&mut self, record: &InputRecord) -> FrameOutcome {
        match record {
            InputRecord::Frame { landmarks } => self.process_frame(landmarks),
            InputRecord::Reset => self.reset(),
        }
    }

    /// Feed one frame's landmarks through the extractor and counter
    pub fn process_frame(&mut self, landmarks: &LandmarkSet) -> FrameOutcome {
        let frame = self.next_record();
        self.tally.frames += 1;

        if landmarks.is_empty() {
            self.tally.no_person += 1;
            return FrameOutcome::unchanged(frame, FrameStatus::NoPerson, self.counter.state());
        }

        let Some(angle) = self.extractor.extract(landmarks) else {
            self.tally.missing_landmark += 1;
            tracing::debug!(
                "Frame {}: joint {} not fully visible, skipping",
                frame,
                self.extractor.triplet()
            );
            return FrameOutcome::unchanged(
                frame,
                FrameStatus::MissingLandmark,
                self.counter.state(),
            );
        };

        let update = self.counter.update(angle);
        self.tally.processed += 1;

        if let Some(ref event) = update.cue {
            self.tally.cues += 1;
            self.cue.alert(event);
        }

        FrameOutcome {
            frame,
            status: FrameStatus::Processed,
            angle: Some(angle),
            target_percentage: Some(update.target_percentage),
            smoothed_percentage: update.state.smoothed_percentage,
            smoothed_bar_position: update.state.smoothed_bar_position,
            count: update.state.count(),
            direction: update.state.direction.as_index(),
            counted: update.counted,
            at_extreme: update.at_extreme,
            cue: update.cue.is_some(),
        }
    }

    /// Clear the count and smoothing, as the user's reset action
    pub fn reset(&mut self) -> FrameOutcome {
        let frame = self.next_record();
        self.counter.reset();
        self.tally.resets += 1;
        tracing::info!("Session {} reset at record {}", self.id, frame);
        FrameOutcome::unchanged(frame, FrameStatus::Reset, self.counter.state())
    }

    /// Drain a landmark stream, handing each outcome to `on_frame`
    ///
    /// Returns when the stream ends or on the first IO or callback error.
    pub fn run<R, F>(&mut self, frames: FrameReader<R>, mut on_frame: F) -> Result<()>
    where
        R: BufRead,
        F: FnMut(&FrameOutcome) -> Result<()>,
    {
        for record in frames {
            let outcome = self.process(&record?);
            on_frame(&outcome)?;
        }
        tracing::debug!("End of stream after {} records", self.tally.records);
        Ok(())
    }

    /// End the session; no further frames can be processed
    pub fn finish(self) -> SessionSummary {
        let state = self.counter.state();
        let summary = SessionSummary {
            id: self.id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            joint: self.extractor.triplet(),
            count: state.count(),
            whole_reps: state.whole_reps(),
            frames: self.tally.frames,
            processed: self.tally.processed,
            no_person: self.tally.no_person,
            missing_landmark: self.tally.missing_landmark,
            cues: self.tally.cues,
            resets: self.tally.resets,
        };
        tracing::info!(
            "Finished session {}: {} reps over {} frames",
            summary.id,
            summary.count,
            summary.frames
        );
        summary
    }

    fn next_record(&mut self) -> u64 {
        let frame = self.tally.records;
        self.tally.records += 1;
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoordinateSpace, CueEvent, Landmark, NullCue, PoseLandmark};
    use std::io::Cursor;

    /// Right-arm landmarks whose elbow angle is `degrees`
    fn arm_at(degrees: f64) -> LandmarkSet {
        let elbow = (400.0, 400.0);
        // Shoulder straight above the elbow sits at -90 degrees
        let wrist_dir = (degrees - 90.0).to_radians();
        LandmarkSet::new(vec![
            Landmark::new(PoseLandmark::RightShoulder.index(), elbow.0, elbow.1 - 150.0),
            Landmark::new(PoseLandmark::RightElbow.index(), elbow.0, elbow.1),
            Landmark::new(
                PoseLandmark::RightWrist.index(),
                elbow.0 + 150.0 * wrist_dir.cos(),
                elbow.1 + 150.0 * wrist_dir.sin(),
            ),
        ])
    }

    fn session() -> CountingSession<NullCue> {
        CountingSession::new(&Config::default(), NullCue).unwrap()
    }

    #[test]
    fn test_arm_helper_produces_requested_angle() {
        let angle = AngleExtractor::default().extract(&arm_at(250.0)).unwrap();
        assert!((angle - 250.0).abs() < 1e-6);
    }

    #[test]
    fn test_counts_full_rep() {
        let mut session = session();
        // Past both calibration ends so float noise cannot miss an extreme
        for degrees in [200.0, 320.0, 200.0] {
            session.process_frame(&arm_at(degrees));
        }
        assert_eq!(session.state().count(), 1.0);
    }

    #[test]
    fn test_no_person_frame_is_noop() {
        let mut session = session();
        session.process_frame(&arm_at(320.0));
        let before = *session.state();

        let outcome = session.process_frame(&LandmarkSet::default());

        assert_eq!(outcome.status, FrameStatus::NoPerson);
        assert_eq!(outcome.angle, None);
        assert_eq!(outcome.count, 0.5);
        assert_eq!(*session.state(), before);
    }

    #[test]
    fn test_missing_landmark_is_skipped() {
        let mut session = session();
        let partial = LandmarkSet::new(vec![Landmark::new(
            PoseLandmark::RightShoulder.index(),
            10.0,
            10.0,
        )]);

        let outcome = session.process_frame(&partial);
        assert_eq!(outcome.status, FrameStatus::MissingLandmark);
        assert_eq!(*session.state(), CounterState::default());
    }

    #[test]
    fn test_reset_record_clears_count() {
        let mut session = session();
        session.process(&InputRecord::frame(arm_at(320.0)));
        session.process(&InputRecord::frame(arm_at(200.0)));
        assert_eq!(session.state().count(), 1.0);

        let outcome = session.process(&InputRecord::Reset);
        assert_eq!(outcome.status, FrameStatus::Reset);
        assert_eq!(outcome.count, 0.0);
        assert_eq!(*session.state(), CounterState::default());

        let summary = session.finish();
        assert_eq!(summary.resets, 1);
        assert_eq!(summary.count, 0.0);
    }

    #[test]
    fn test_cue_sink_receives_band_frames() {
        let mut cues: Vec<CueEvent> = Vec::new();
        {
            let sink = |e: &CueEvent| cues.push(*e);
            let mut session = CountingSession::new(&Config::default(), sink).unwrap();
            // 245 degrees -> 35%, 280 -> 70%
            session.process_frame(&arm_at(245.0));
            session.process_frame(&arm_at(280.0));
            session.process_frame(&arm_at(245.0));
        }
        assert_eq!(cues.len(), 2);
        assert!((cues[0].target_percentage - 35.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_joint_fails_at_setup() {
        let mut config = Config::default();
        config.joint.vertex = 99;
        assert!(CountingSession::new(&config, NullCue).is_err());
    }

    #[test]
    fn test_run_consumes_stream_and_summarizes() {
        let mut lines = String::new();
        for degrees in [200.0, 320.0, 200.0, 320.0, 200.0] {
            let record = InputRecord::frame(arm_at(degrees));
            lines.push_str(&serde_json::to_string(&record).unwrap());
            lines.push('\n');
        }
        lines.push_str("{\"type\":\"frame\",\"landmarks\":[]}\n");
        lines.push_str("garbage\n");

        let mut session = session();
        let mut outcomes = Vec::new();
        let reader = FrameReader::new(Cursor::new(lines), CoordinateSpace::Pixel);
        session
            .run(reader, |o| {
                outcomes.push(o.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(outcomes.len(), 6);
        assert_eq!(outcomes.iter().filter(|o| o.counted).count(), 4);

        let summary = session.finish();
        assert_eq!(summary.count, 2.0);
        assert_eq!(summary.whole_reps, 2);
        assert_eq!(summary.frames, 6);
        assert_eq!(summary.processed, 5);
        assert_eq!(summary.no_person, 1);
        assert_eq!(summary.joint, JointTriplet::default());
    }

    #[test]
    fn test_independent_sessions_do_not_share_state() {
        let mut a = session();
        let mut b = session();
        a.process_frame(&arm_at(320.0));
        assert_eq!(a.state().count(), 0.5);
        assert_eq!(b.state().count(), 0.0);
        b.process_frame(&arm_at(200.0));
        assert_eq!(a.state().count(), 0.5);
        assert_ne!(a.id(), b.id());
    }
}
