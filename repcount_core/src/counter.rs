//! Rep counting state machine with smoothed display values.
//!
//! Each processed frame feeds one elbow angle into the counter:
//! - The angle is mapped onto a 0-100 percentage and a bar position
//! - Both are low-pass filtered for display
//! - A half-rep is counted whenever the percentage reaches the extreme the
//!   counter is waiting for, after which it waits for the opposite extreme
//!
//! The counter is edge-triggered: dwelling at an extreme never counts twice,
//! because the direction has already flipped.

use crate::{CueEvent, Error, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Calibration
// ============================================================================

/// Clamped linear map from an angle range onto an output range
///
/// The output range may run in either direction; the bar map, for example,
/// goes from a large pixel row at the bottom to a small one at the top.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearMap {
    pub angle_low: f64,
    pub angle_high: f64,
    pub out_low: f64,
    pub out_high: f64,
}

impl LinearMap {
    pub fn new(angle_low: f64, angle_high: f64, out_low: f64, out_high: f64) -> Self {
        Self {
            angle_low,
            angle_high,
            out_low,
            out_high,
        }
    }

    /// Interpolate, clamping inputs outside the angle range to the nearest bound
    ///
    /// The endpoints map exactly onto `out_low` and `out_high`, which the
    /// exact trigger policy depends on.
    pub fn apply(&self, angle: f64) -> f64 {
        if angle <= self.angle_low {
            self.out_low
        } else if angle >= self.angle_high {
            self.out_high
        } else {
            let t = (angle - self.angle_low) / (self.angle_high - self.angle_low);
            self.out_low + t * (self.out_high - self.out_low)
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let all_finite = [self.angle_low, self.angle_high, self.out_low, self.out_high]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::Config(format!("{} calibration must be finite", name)));
        }
        if self.angle_low >= self.angle_high {
            return Err(Error::Config(format!(
                "{} angle range is empty: [{}, {}]",
                name, self.angle_low, self.angle_high
            )));
        }
        Ok(())
    }
}

/// When the percentage counts as having reached an extreme
///
/// Stored as a flat `[trigger]` table. Without a `policy` key the table means
/// `threshold` if either bound is set, otherwise `exact`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "TriggerTable", into = "TriggerTable")]
pub enum TriggerPolicy {
    /// Only exactly 0 and exactly 100
    #[default]
    Exact,
    /// At or below `lower`, at or above `upper`
    Threshold { lower: f64, upper: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PolicyKind {
    Exact,
    Threshold,
}

#[derive(Serialize, Deserialize)]
struct TriggerTable {
    #[serde(default)]
    policy: Option<PolicyKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upper: Option<f64>,
}

impl From<TriggerTable> for TriggerPolicy {
    fn from(table: TriggerTable) -> Self {
        let bounds_given = table.lower.is_some() || table.upper.is_some();
        match table.policy {
            Some(PolicyKind::Exact) => TriggerPolicy::Exact,
            None if !bounds_given => TriggerPolicy::Exact,
            Some(PolicyKind::Threshold) | None => TriggerPolicy::Threshold {
                lower: table.lower.unwrap_or(DEFAULT_LOWER_THRESHOLD),
                upper: table.upper.unwrap_or(DEFAULT_UPPER_THRESHOLD),
            },
        }
    }
}

impl From<TriggerPolicy> for TriggerTable {
    fn from(policy: TriggerPolicy) -> Self {
        match policy {
            TriggerPolicy::Exact => TriggerTable {
                policy: Some(PolicyKind::Exact),
                lower: None,
                upper: None,
            },
            TriggerPolicy::Threshold { lower, upper } => TriggerTable {
                policy: Some(PolicyKind::Threshold),
                lower: Some(lower),
                upper: Some(upper),
            },
        }
    }
}

pub const DEFAULT_LOWER_THRESHOLD: f64 = 1.0;
pub const DEFAULT_UPPER_THRESHOLD: f64 = 99.0;

impl TriggerPolicy {
    pub fn at_top(&self, percentage: f64) -> bool {
        match *self {
            TriggerPolicy::Exact => percentage == 100.0,
            TriggerPolicy::Threshold { upper, .. } => percentage >= upper,
        }
    }

    pub fn at_bottom(&self, percentage: f64) -> bool {
        match *self {
            TriggerPolicy::Exact => percentage == 0.0,
            TriggerPolicy::Threshold { lower, .. } => percentage <= lower,
        }
    }
}

/// Fixed parameters of one counting session
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CounterSettings {
    /// Angle to percentage (0-100)
    pub percentage: LinearMap,
    /// Angle to bar position in pixels
    pub bar: LinearMap,
    /// Weight of the new target in the low-pass filter, in (0, 1]
    pub smoothing: f64,
    pub policy: TriggerPolicy,
    /// Inclusive percentage band that raises a cue, if any
    pub cue_band: Option<(f64, f64)>,
}

impl Default for CounterSettings {
    fn default() -> Self {
        Self {
            percentage: LinearMap::new(210.0, 310.0, 0.0, 100.0),
            bar: LinearMap::new(220.0, 310.0, 650.0, 100.0),
            smoothing: 0.3,
            policy: TriggerPolicy::Exact,
            cue_band: Some((30.0, 40.0)),
        }
    }
}

impl CounterSettings {
    pub fn validate(&self) -> Result<()> {
        self.percentage.validate("percentage")?;
        self.bar.validate("bar")?;

        if self.percentage.out_low != 0.0 || self.percentage.out_high != 100.0 {
            return Err(Error::Config(
                "percentage map must produce 0..100".into(),
            ));
        }

        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(Error::Config(format!(
                "smoothing factor must be in (0, 1], got {}",
                self.smoothing
            )));
        }

        if let TriggerPolicy::Threshold { lower, upper } = self.policy {
            if !(0.0..100.0).contains(&lower) || !(0.0..=100.0).contains(&upper) || lower >= upper
            {
                return Err(Error::Config(format!(
                    "trigger thresholds must satisfy 0 <= lower < upper <= 100, got {} / {}",
                    lower, upper
                )));
            }
        }

        if let Some((low, high)) = self.cue_band {
            if low > high {
                return Err(Error::Config(format!(
                    "cue band is inverted: [{}, {}]",
                    low, high
                )));
            }
        }

        Ok(())
    }

    /// Bar position shown before any frame is processed
    pub fn rest_bar_position(&self) -> f64 {
        self.bar.out_low
    }
}

// ============================================================================
// State
// ============================================================================

/// Which extreme the counter is waiting for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Waiting for 100% (curling up); encoded as 0
    #[default]
    Rising,
    /// Waiting for 0% (lowering); encoded as 1
    Falling,
}

impl Direction {
    pub fn as_index(self) -> u8 {
        match self {
            Direction::Rising => 0,
            Direction::Falling => 1,
        }
    }
}

/// Everything that persists from one frame to the next
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterState {
    half_reps: u32,
    pub direction: Direction,
    pub smoothed_bar_position: f64,
    pub smoothed_percentage: f64,
}

impl CounterState {
    /// Fresh state for the given settings
    pub fn initial(settings: &CounterSettings) -> Self {
        Self {
            half_reps: 0,
            direction: Direction::Rising,
            smoothed_bar_position: settings.rest_bar_position(),
            smoothed_percentage: 0.0,
        }
    }

    /// Repetitions counted so far, in steps of 0.5
    pub fn count(&self) -> f64 {
        f64::from(self.half_reps) / 2.0
    }

    /// Completed repetitions (the count rounded down)
    pub fn whole_reps(&self) -> u32 {
        self.half_reps / 2
    }

    pub fn half_reps(&self) -> u32 {
        self.half_reps
    }
}

impl Default for CounterState {
    fn default() -> Self {
        Self::initial(&CounterSettings::default())
    }
}

/// Result of feeding one angle into the counter
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CounterUpdate {
    pub state: CounterState,
    pub target_percentage: f64,
    pub target_bar_position: f64,
    /// A half-rep was added on this frame
    pub counted: bool,
    /// The target is at the top or bottom extreme
    pub at_extreme: bool,
    pub cue: Option<CueEvent>,
}

/// Advance `state` by one angle sample
///
/// Pure: the caller decides whether to keep the returned state.
pub fn step(state: &CounterState, settings: &CounterSettings, angle: f64) -> CounterUpdate {
    let target_percentage = settings.percentage.apply(angle);
    let target_bar_position = settings.bar.apply(angle);

    let alpha = settings.smoothing;
    let mut next = *state;
    next.smoothed_bar_position =
        state.smoothed_bar_position * (1.0 - alpha) + target_bar_position * alpha;
    next.smoothed_percentage =
        state.smoothed_percentage * (1.0 - alpha) + target_percentage * alpha;

    let at_top = settings.policy.at_top(target_percentage);
    let at_bottom = settings.policy.at_bottom(target_percentage);

    let counted = match state.direction {
        Direction::Rising if at_top => {
            next.direction = Direction::Falling;
            true
        }
        Direction::Falling if at_bottom => {
            next.direction = Direction::Rising;
            true
        }
        _ => false,
    };
    if counted {
        next.half_reps += 1;
    }

    let cue = settings
        .cue_band
        .filter(|&(low, high)| (low..=high).contains(&target_percentage))
        .map(|_| CueEvent {
            angle,
            target_percentage,
        });

    CounterUpdate {
        state: next,
        target_percentage,
        target_bar_position,
        counted,
        at_extreme: at_top || at_bottom,
        cue,
    }
}

// ============================================================================
// Counter
// ============================================================================

/// Owns a `CounterState` for one stream and applies `step` to it
#[derive(Clone, Debug)]
pub struct RepCounter {
    settings: CounterSettings,
    state: CounterState,
}

impl RepCounter {
    /// Create a counter, rejecting unusable calibration
    pub fn new(settings: CounterSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            state: CounterState::initial(&settings),
            settings,
        })
    }

    pub fn settings(&self) -> &CounterSettings {
        &self.settings
    }

    pub fn state(&self) -> &CounterState {
        &self.state
    }

    pub fn update(&mut self, angle: f64) -> CounterUpdate {
        let update = step(&self.state, &self.settings, angle);
        if update.counted {
            tracing::debug!(
                "Half-rep at {:.1} degrees, count now {}",
                angle,
                update.state.count()
            );
        }
        self.state = update.state;
        update
    }

    /// Back to the initial state; calling it repeatedly changes nothing further
    pub fn reset(&mut self) {
        self.state = CounterState::initial(&self.settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> RepCounter {
        RepCounter::new(CounterSettings::default()).unwrap()
    }

    fn feed(counter: &mut RepCounter, angles: &[f64]) {
        for &angle in angles {
            counter.update(angle);
        }
    }

    #[test]
    fn test_interp_clamps_and_hits_endpoints() {
        let map = LinearMap::new(210.0, 310.0, 0.0, 100.0);
        assert_eq!(map.apply(100.0), 0.0);
        assert_eq!(map.apply(210.0), 0.0);
        assert_eq!(map.apply(260.0), 50.0);
        assert_eq!(map.apply(310.0), 100.0);
        assert_eq!(map.apply(359.0), 100.0);
    }

    #[test]
    fn test_interp_decreasing_output() {
        let map = LinearMap::new(220.0, 310.0, 650.0, 100.0);
        assert_eq!(map.apply(200.0), 650.0);
        assert_eq!(map.apply(265.0), 375.0);
        assert_eq!(map.apply(320.0), 100.0);
    }

    #[test]
    fn test_initial_state() {
        let counter = counter();
        let state = counter.state();
        assert_eq!(state.count(), 0.0);
        assert_eq!(state.direction, Direction::Rising);
        assert_eq!(state.smoothed_bar_position, 650.0);
        assert_eq!(state.smoothed_percentage, 0.0);
    }

    #[test]
    fn test_single_rep_scenario() {
        let mut counter = counter();

        let first = counter.update(210.0);
        assert_eq!(first.target_percentage, 0.0);
        assert!(!first.counted);
        assert_eq!(first.state.count(), 0.0);

        let second = counter.update(310.0);
        assert_eq!(second.target_percentage, 100.0);
        assert!(second.counted);
        assert_eq!(second.state.direction, Direction::Falling);
        assert_eq!(second.state.count(), 0.5);

        let third = counter.update(210.0);
        assert!(third.counted);
        assert_eq!(third.state.direction, Direction::Rising);
        assert_eq!(third.state.count(), 1.0);
        assert_eq!(third.state.whole_reps(), 1);
    }

    #[test]
    fn test_sweep_counts_each_crossing_once() {
        let mut counter = counter();
        let mut previous = 0.0;

        // Up to 310, down to 210, back up to 310 in 1 degree steps
        let down = (0..=100).map(|i| 310.0 - f64::from(i));
        let up = (0..=100).map(|i| 210.0 + f64::from(i));
        let sweep: Vec<f64> = std::iter::once(310.0).chain(down).chain(up).collect();

        for angle in sweep {
            let count = counter.update(angle).state.count();
            assert!(count >= previous, "count decreased");
            previous = count;
        }

        // 310 counts the first half, 210 the second, the return to 310 a third
        assert_eq!(counter.state().count(), 1.5);
    }

    #[test]
    fn test_high_low_high_from_falling_adds_one() {
        let mut counter = counter();
        counter.update(310.0);
        let start = counter.state().count();

        let down = (0..=100).map(|i| 310.0 - f64::from(i));
        let up = (0..=100).map(|i| 210.0 + f64::from(i));
        for angle in down.chain(up) {
            counter.update(angle);
        }

        assert_eq!(counter.state().count() - start, 1.0);
    }

    #[test]
    fn test_repeated_bottom_does_not_double_count() {
        let mut counter = counter();
        feed(&mut counter, &[210.0, 210.0, 200.0]);
        assert_eq!(counter.state().count(), 0.0);

        feed(&mut counter, &[310.0, 320.0, 310.0]);
        assert_eq!(counter.state().count(), 0.5);

        feed(&mut counter, &[210.0, 210.0]);
        assert_eq!(counter.state().count(), 1.0);
    }

    #[test]
    fn test_exact_policy_ignores_near_extremes() {
        let mut counter = counter();
        for _ in 0..50 {
            feed(&mut counter, &[305.0, 215.0]);
        }
        assert_eq!(counter.state().count(), 0.0);
    }

    #[test]
    fn test_threshold_policy_counts_near_extremes() {
        let settings = CounterSettings {
            policy: TriggerPolicy::Threshold {
                lower: 10.0,
                upper: 90.0,
            },
            ..CounterSettings::default()
        };
        let mut counter = RepCounter::new(settings).unwrap();

        for _ in 0..3 {
            feed(&mut counter, &[305.0, 305.0, 215.0, 215.0]);
        }
        assert_eq!(counter.state().count(), 3.0);
    }

    #[test]
    fn test_smoothing_step() {
        let mut counter = counter();
        let update = counter.update(260.0);

        assert_eq!(update.target_percentage, 50.0);
        assert!((update.state.smoothed_percentage - 15.0).abs() < 1e-9);
        let expected_bar = 650.0 * 0.7 + update.target_bar_position * 0.3;
        assert!((update.state.smoothed_bar_position - expected_bar).abs() < 1e-9);
    }

    #[test]
    fn test_smoothing_converges_to_target() {
        let mut counter = counter();
        let mut last = counter.update(275.0);
        for _ in 0..100 {
            last = counter.update(275.0);
        }

        assert!((last.state.smoothed_percentage - last.target_percentage).abs() < 1e-6);
        assert!((last.state.smoothed_bar_position - last.target_bar_position).abs() < 1e-6);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut counter = counter();
        feed(&mut counter, &[310.0, 210.0, 280.0]);
        assert_eq!(counter.state().count(), 1.0);

        counter.reset();
        let once = *counter.state();
        counter.reset();
        let twice = *counter.state();

        assert_eq!(once, twice);
        assert_eq!(once, CounterState::initial(counter.settings()));
    }

    #[test]
    fn test_cue_band_inclusive() {
        let mut counter = counter();
        // 240 -> 30%, 250 -> 40%, 245 -> 35%, 255 -> 45%
        assert!(counter.update(240.0).cue.is_some());
        assert!(counter.update(245.0).cue.is_some());
        assert!(counter.update(250.0).cue.is_some());
        assert!(counter.update(255.0).cue.is_none());
        assert!(counter.update(230.0).cue.is_none());
    }

    #[test]
    fn test_cue_disabled() {
        let settings = CounterSettings {
            cue_band: None,
            ..CounterSettings::default()
        };
        let mut counter = RepCounter::new(settings).unwrap();
        assert!(counter.update(245.0).cue.is_none());
    }

    #[test]
    fn test_step_is_pure() {
        let settings = CounterSettings::default();
        let state = CounterState::initial(&settings);
        let a = step(&state, &settings, 310.0);
        let b = step(&state, &settings, 310.0);
        assert_eq!(a, b);
        assert_eq!(state.count(), 0.0);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let bad_alpha = CounterSettings {
            smoothing: 0.0,
            ..CounterSettings::default()
        };
        assert!(RepCounter::new(bad_alpha).is_err());

        let empty_range = CounterSettings {
            percentage: LinearMap::new(300.0, 200.0, 0.0, 100.0),
            ..CounterSettings::default()
        };
        assert!(RepCounter::new(empty_range).is_err());

        let bad_threshold = CounterSettings {
            policy: TriggerPolicy::Threshold {
                lower: 60.0,
                upper: 40.0,
            },
            ..CounterSettings::default()
        };
        assert!(RepCounter::new(bad_threshold).is_err());
    }
}
