//! Joint angle extraction.

use crate::{JointTriplet, Landmark, LandmarkSet};

/// Angle at `p2` between the rays toward `p3` and `p1`, in degrees [0, 360)
///
/// Measured in image coordinates (y grows downward), so the value is
/// signed by winding direction rather than folded into [0, 180].
pub fn compute_angle(p1: &Landmark, p2: &Landmark, p3: &Landmark) -> f64 {
    let radians = (p3.y - p2.y).atan2(p3.x - p2.x) - (p1.y - p2.y).atan2(p1.x - p2.x);
    let mut degrees = radians.to_degrees();

    if degrees < 0.0 {
        degrees += 360.0;
    }
    // -1e-15 + 360 rounds to 360
    if degrees >= 360.0 {
        degrees = 0.0;
    }

    degrees
}

/// Computes the tracked joint's angle from a frame's landmarks
#[derive(Clone, Copy, Debug, Default)]
pub struct AngleExtractor {
    triplet: JointTriplet,
}

impl AngleExtractor {
    pub fn new(triplet: JointTriplet) -> Self {
        Self { triplet }
    }

    pub fn triplet(&self) -> JointTriplet {
        self.triplet
    }

    /// Returns `None` when any of the three landmarks is absent from the frame
    pub fn extract(&self, landmarks: &LandmarkSet) -> Option<f64> {
        let first = landmarks.get(self.triplet.first)?;
        let vertex = landmarks.get(self.triplet.vertex)?;
        let last = landmarks.get(self.triplet.last)?;

        Some(compute_angle(first, vertex, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Arm, PoseLandmark};

    const EPSILON: f64 = 1e-9;

    fn point(x: f64, y: f64) -> Landmark {
        Landmark::new(0, x, y)
    }

    #[test]
    fn test_colinear_points_give_straight_angle() {
        let cases = [
            (point(0.0, 0.0), point(5.0, 0.0), point(10.0, 0.0)),
            (point(10.0, 0.0), point(5.0, 0.0), point(0.0, 0.0)),
            (point(0.0, 0.0), point(3.0, 4.0), point(6.0, 8.0)),
            (point(100.0, 50.0), point(100.0, 150.0), point(100.0, 400.0)),
        ];

        for (p1, p2, p3) in cases {
            let angle = compute_angle(&p1, &p2, &p3);
            assert!((angle - 180.0).abs() < EPSILON, "got {}", angle);
        }
    }

    #[test]
    fn test_right_angle_both_windings() {
        let vertex = point(0.0, 0.0);
        let right = point(1.0, 0.0);
        let down = point(0.0, 1.0);

        assert!((compute_angle(&right, &vertex, &down) - 90.0).abs() < EPSILON);
        assert!((compute_angle(&down, &vertex, &right) - 270.0).abs() < EPSILON);
    }

    #[test]
    fn test_result_stays_in_half_open_range() {
        let vertex = point(0.0, 0.0);
        let same = point(1.0, 1.0);
        let angle = compute_angle(&same, &vertex, &same);
        assert!((0.0..360.0).contains(&angle));
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn test_extract_uses_configured_triplet() {
        let landmarks = LandmarkSet::new(vec![
            Landmark::new(PoseLandmark::RightShoulder.index(), 100.0, 0.0),
            Landmark::new(PoseLandmark::RightElbow.index(), 100.0, 100.0),
            Landmark::new(PoseLandmark::RightWrist.index(), 200.0, 100.0),
        ]);

        let extractor = AngleExtractor::new(JointTriplet::elbow(Arm::Right));
        let angle = extractor.extract(&landmarks).unwrap();
        assert!((angle - 90.0).abs() < EPSILON);
    }

    #[test]
    fn test_extract_missing_landmark_returns_none() {
        let landmarks = LandmarkSet::new(vec![
            Landmark::new(PoseLandmark::RightShoulder.index(), 100.0, 0.0),
            Landmark::new(PoseLandmark::RightElbow.index(), 100.0, 100.0),
        ]);

        let extractor = AngleExtractor::default();
        assert!(extractor.extract(&landmarks).is_none());
        assert!(extractor.extract(&LandmarkSet::default()).is_none());
    }
}
