//! Sensor classification.
//!
//! [`classify`] is a pure mapping from one [`SensorSnapshot`] to a
//! [`SteeringAction`]. Each sensor carries a positional weight, `2` at the
//! rightmost element down to `-2` at the leftmost, and the mean weight of the
//! active sensors selects the turn severity. The threshold checks are done on
//! integers scaled by ten so that boundary cases never hinge on float rounding.

use core::fmt;

/// Number of reflectance sensors on the array.
pub const SENSOR_COUNT: usize = 5;

/// Weights for each sensor, rightmost first.
pub const SENSOR_WEIGHTS: [i32; SENSOR_COUNT] = [2, 1, 0, -1, -2];

const HARD_THRESHOLD_X10: i32 = 12;
const MILD_THRESHOLD_X10: i32 = 6;
const SLIGHT_THRESHOLD_X10: i32 = 2;

/// Line detection state of the five sensors, ordered right to left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SensorSnapshot {
    active: [bool; SENSOR_COUNT],
}

impl SensorSnapshot {
    #[must_use]
    pub const fn new(active: [bool; SENSOR_COUNT]) -> Self {
        Self { active }
    }

    /// Builds a snapshot from `0`/`1` levels; any non-zero value counts as active.
    #[must_use]
    pub const fn from_levels(levels: [u8; SENSOR_COUNT]) -> Self {
        Self::new([
            levels[0] != 0,
            levels[1] != 0,
            levels[2] != 0,
            levels[3] != 0,
            levels[4] != 0,
        ])
    }

    #[must_use]
    pub const fn active(&self) -> [bool; SENSOR_COUNT] {
        self.active
    }

    #[must_use]
    pub fn levels(&self) -> [u8; SENSOR_COUNT] {
        self.active.map(u8::from)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|active| **active).count()
    }
}

/// Which way a steering action leans.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnSide {
    Left,
    Right,
}

/// How sharply a directional action turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Slight,
    Mild,
    Hard,
}

/// Outcome of classifying one sensor snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SteeringAction {
    #[default]
    Forward,
    SlightRight,
    MildRight,
    HardRight,
    SlightLeft,
    MildLeft,
    HardLeft,
    OnJunction,
    LineLost,
    Searching,
}

impl SteeringAction {
    /// Operator-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SteeringAction::Forward => "FORWARD",
            SteeringAction::SlightRight => "SLIGHT RIGHT",
            SteeringAction::MildRight => "MILD RIGHT",
            SteeringAction::HardRight => "HARD RIGHT",
            SteeringAction::SlightLeft => "SLIGHT LEFT",
            SteeringAction::MildLeft => "MILD LEFT",
            SteeringAction::HardLeft => "HARD LEFT",
            SteeringAction::OnJunction => "ON JUNCTION",
            SteeringAction::LineLost => "LINE LOST",
            SteeringAction::Searching => "SEARCHING",
        }
    }

    /// Side and severity for turning actions; `None` for everything else.
    #[must_use]
    pub const fn turn(self) -> Option<(TurnSide, Severity)> {
        match self {
            SteeringAction::SlightRight => Some((TurnSide::Right, Severity::Slight)),
            SteeringAction::MildRight => Some((TurnSide::Right, Severity::Mild)),
            SteeringAction::HardRight => Some((TurnSide::Right, Severity::Hard)),
            SteeringAction::SlightLeft => Some((TurnSide::Left, Severity::Slight)),
            SteeringAction::MildLeft => Some((TurnSide::Left, Severity::Mild)),
            SteeringAction::HardLeft => Some((TurnSide::Left, Severity::Hard)),
            _ => None,
        }
    }

    /// Side this action leans toward, if any.
    #[must_use]
    pub const fn bias(self) -> Option<TurnSide> {
        match self.turn() {
            Some((side, _)) => Some(side),
            None => None,
        }
    }

    const fn toward(side: TurnSide, severity: Severity) -> Self {
        match (side, severity) {
            (TurnSide::Right, Severity::Slight) => SteeringAction::SlightRight,
            (TurnSide::Right, Severity::Mild) => SteeringAction::MildRight,
            (TurnSide::Right, Severity::Hard) => SteeringAction::HardRight,
            (TurnSide::Left, Severity::Slight) => SteeringAction::SlightLeft,
            (TurnSide::Left, Severity::Mild) => SteeringAction::MildLeft,
            (TurnSide::Left, Severity::Hard) => SteeringAction::HardLeft,
        }
    }
}

impl fmt::Display for SteeringAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps a snapshot to a steering action.
#[must_use]
pub fn classify(snapshot: &SensorSnapshot) -> SteeringAction {
    let mut count = 0_i32;
    let mut sum = 0_i32;
    for (active, weight) in snapshot.active.iter().zip(SENSOR_WEIGHTS) {
        if *active {
            count += 1;
            sum += weight;
        }
    }

    if count == 0 {
        return SteeringAction::LineLost;
    }
    if snapshot.active_count() == SENSOR_COUNT {
        return SteeringAction::OnJunction;
    }

    // |sum / count| > t / 10  <=>  |sum| * 10 > t * count
    let side = if sum > 0 { TurnSide::Right } else { TurnSide::Left };
    let scaled = sum.abs() * 10;
    if scaled > HARD_THRESHOLD_X10 * count {
        SteeringAction::toward(side, Severity::Hard)
    } else if scaled > MILD_THRESHOLD_X10 * count {
        SteeringAction::toward(side, Severity::Mild)
    } else if scaled > SLIGHT_THRESHOLD_X10 * count {
        SteeringAction::toward(side, Severity::Slight)
    } else if sum == 0 {
        SteeringAction::Forward
    } else {
        SteeringAction::Searching
    }
}
