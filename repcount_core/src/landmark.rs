//! Pose landmark schema and per-frame landmark sets.
//!
//! The pose model reports 33 body points per detected person. Only the
//! shoulder/elbow/wrist triplet of one arm is used for counting, but the
//! full schema is kept so configuration can be validated against it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of points in the pose schema
pub const LANDMARK_COUNT: usize = 33;

// ============================================================================
// Schema
// ============================================================================

/// Named body points, discriminants match the pose model's landmark indices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl PoseLandmark {
    /// All landmarks in index order
    pub const ALL: [PoseLandmark; LANDMARK_COUNT] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    /// Look up a landmark by its model index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The model index of this landmark
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEyeInner => "left_eye_inner",
            Self::LeftEye => "left_eye",
            Self::LeftEyeOuter => "left_eye_outer",
            Self::RightEyeInner => "right_eye_inner",
            Self::RightEye => "right_eye",
            Self::RightEyeOuter => "right_eye_outer",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::MouthLeft => "mouth_left",
            Self::MouthRight => "mouth_right",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftPinky => "left_pinky",
            Self::RightPinky => "right_pinky",
            Self::LeftIndex => "left_index",
            Self::RightIndex => "right_index",
            Self::LeftThumb => "left_thumb",
            Self::RightThumb => "right_thumb",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
            Self::LeftHeel => "left_heel",
            Self::RightHeel => "right_heel",
            Self::LeftFootIndex => "left_foot_index",
            Self::RightFootIndex => "right_foot_index",
        }
    }
}

impl TryFrom<usize> for PoseLandmark {
    type Error = crate::Error;

    fn try_from(index: usize) -> Result<Self> {
        Self::from_index(index).ok_or(Error::InvalidLandmark(index))
    }
}

impl fmt::Display for PoseLandmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.index())
    }
}

// ============================================================================
// Joint triplet
// ============================================================================

/// Which arm to track
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arm {
    Left,
    Right,
}

/// Three landmarks forming a joint, with `vertex` at the joint itself
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointTriplet {
    pub first: PoseLandmark,
    pub vertex: PoseLandmark,
    pub last: PoseLandmark,
}

impl JointTriplet {
    /// Shoulder, elbow and wrist of the given arm
    pub fn elbow(arm: Arm) -> Self {
        match arm {
            Arm::Left => Self {
                first: PoseLandmark::LeftShoulder,
                vertex: PoseLandmark::LeftElbow,
                last: PoseLandmark::LeftWrist,
            },
            Arm::Right => Self {
                first: PoseLandmark::RightShoulder,
                vertex: PoseLandmark::RightElbow,
                last: PoseLandmark::RightWrist,
            },
        }
    }

    /// Build a triplet from raw model indices
    ///
    /// Fails if any index is outside the schema or if two indices repeat.
    pub fn from_indices(first: usize, vertex: usize, last: usize) -> Result<Self> {
        if first == vertex || vertex == last || first == last {
            return Err(Error::Config(format!(
                "joint landmarks must be distinct, got ({}, {}, {})",
                first, vertex, last
            )));
        }

        Ok(Self {
            first: PoseLandmark::try_from(first)?,
            vertex: PoseLandmark::try_from(vertex)?,
            last: PoseLandmark::try_from(last)?,
        })
    }
}

impl Default for JointTriplet {
    fn default() -> Self {
        Self::elbow(Arm::Right)
    }
}

impl fmt::Display for JointTriplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.first, self.vertex, self.last)
    }
}

// ============================================================================
// Per-frame landmarks
// ============================================================================

/// A single detected point in pixel space (y grows downward)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: usize,
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        Self { id, x, y }
    }

    /// Convert a normalized (0..1) model coordinate to integer pixels
    ///
    /// Truncates toward zero, matching the model's usual pixel conversion.
    pub fn from_normalized(id: usize, x: f64, y: f64, width: u32, height: u32) -> Self {
        Self {
            id,
            x: (x * f64::from(width)).trunc(),
            y: (y * f64::from(height)).trunc(),
        }
    }
}

/// All landmarks reported for one frame
///
/// An empty set means the model found no person in the frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Find a landmark by schema id (not by list position)
    pub fn get(&self, landmark: PoseLandmark) -> Option<&Landmark> {
        let id = landmark.index();
        // Model output is normally ordered by id, so try the direct slot first
        match self.points.get(id) {
            Some(point) if point.id == id => Some(point),
            _ => self.points.iter().find(|point| point.id == id),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.points.iter()
    }
}

impl FromIterator<Landmark> for LandmarkSet {
    fn from_iter<I: IntoIterator<Item = Landmark>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
