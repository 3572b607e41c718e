//! Recognized tunable keys and their override rules.
//!
//! Each query key maps to exactly one field of [`LineFollowTunables`] or
//! [`MissionTunables`]. Overrides are applied one field at a time: a value
//! that fails to parse is skipped and the rest of the request still applies.
//! Numeric values outside their valid range are clamped. Values arrive
//! percent-encoded and are decoded here before parsing.

use core::fmt;
use core::time::Duration;

use super::grammar::QueryPair;
use crate::mission::{MissionTunables, Side};
use crate::motion::LineFollowTunables;
use crate::ports::{Angle, Duty};

/// Query key reserved for the control action itself.
pub const ACTION_KEY: &str = "action";

/// Longest decoded value accepted for any key.
pub const MAX_VALUE_BYTES: usize = 32;

/// How a key's value is parsed and clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// Integer duty, clamped to `0..=100`.
    Percent,
    /// Decimal ratio, clamped to `0.0..=1.0`.
    Ratio,
    /// Integer milliseconds, negative values clamp to zero.
    Millis,
    /// Integer degrees, clamped to `0..=180`.
    Angle,
    /// `left` or `right`.
    Side,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterKey {
    Speed,
    Slight,
    Mild,
    Hard,
    Grace,
    Search,
    BaseCenter,
    BaseOffset,
    FirstSide,
    ArmTransport,
    ArmDown,
    GripOpen,
    GripClose,
    ServoSettle,
    ReverseSpeed,
    ReverseTime,
    RotateDir,
    RotateSpeed,
    RotateTime,
}

impl ParameterKey {
    pub const ALL: [ParameterKey; 19] = [
        ParameterKey::Speed,
        ParameterKey::Slight,
        ParameterKey::Mild,
        ParameterKey::Hard,
        ParameterKey::Grace,
        ParameterKey::Search,
        ParameterKey::BaseCenter,
        ParameterKey::BaseOffset,
        ParameterKey::FirstSide,
        ParameterKey::ArmTransport,
        ParameterKey::ArmDown,
        ParameterKey::GripOpen,
        ParameterKey::GripClose,
        ParameterKey::ServoSettle,
        ParameterKey::ReverseSpeed,
        ParameterKey::ReverseTime,
        ParameterKey::RotateDir,
        ParameterKey::RotateSpeed,
        ParameterKey::RotateTime,
    ];

    /// Query-string and telemetry name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ParameterKey::Speed => "speed",
            ParameterKey::Slight => "slight",
            ParameterKey::Mild => "mild",
            ParameterKey::Hard => "hard",
            ParameterKey::Grace => "grace",
            ParameterKey::Search => "search",
            ParameterKey::BaseCenter => "base_center",
            ParameterKey::BaseOffset => "base_offset",
            ParameterKey::FirstSide => "first_side",
            ParameterKey::ArmTransport => "arm_transport",
            ParameterKey::ArmDown => "arm_down",
            ParameterKey::GripOpen => "grip_open",
            ParameterKey::GripClose => "grip_close",
            ParameterKey::ServoSettle => "servo_settle",
            ParameterKey::ReverseSpeed => "reverse_speed",
            ParameterKey::ReverseTime => "reverse_time",
            ParameterKey::RotateDir => "rotate_dir",
            ParameterKey::RotateSpeed => "rotate_speed",
            ParameterKey::RotateTime => "rotate_time",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }

    #[must_use]
    pub const fn kind(self) -> ValueKind {
        match self {
            ParameterKey::Speed | ParameterKey::ReverseSpeed | ParameterKey::RotateSpeed => {
                ValueKind::Percent
            }
            ParameterKey::Slight | ParameterKey::Mild | ParameterKey::Hard | ParameterKey::Search => {
                ValueKind::Ratio
            }
            ParameterKey::Grace
            | ParameterKey::ServoSettle
            | ParameterKey::ReverseTime
            | ParameterKey::RotateTime => ValueKind::Millis,
            ParameterKey::BaseCenter
            | ParameterKey::BaseOffset
            | ParameterKey::ArmTransport
            | ParameterKey::ArmDown
            | ParameterKey::GripOpen
            | ParameterKey::GripClose => ValueKind::Angle,
            ParameterKey::FirstSide | ParameterKey::RotateDir => ValueKind::Side,
        }
    }
}

/// Why a single override was skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverrideError {
    Malformed,
    UnknownSide,
}

impl fmt::Display for OverrideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideError::Malformed => f.write_str("malformed value"),
            OverrideError::UnknownSide => f.write_str("expected left or right"),
        }
    }
}

/// Parsed value ready to be stored.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Value {
    Percent(u8),
    Ratio(f64),
    Millis(Duration),
    Angle(Angle),
    Side(Side),
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decodes `%XX` escapes into `out`. `+` is kept literally.
fn percent_decode<'b>(
    raw: &str,
    out: &'b mut heapless::Vec<u8, MAX_VALUE_BYTES>,
) -> Result<&'b str, OverrideError> {
    let mut bytes = raw.bytes();
    while let Some(byte) = bytes.next() {
        let decoded = if byte == b'%' {
            let high = bytes.next().and_then(hex_digit);
            let low = bytes.next().and_then(hex_digit);
            match (high, low) {
                (Some(high), Some(low)) => (high << 4) | low,
                _ => return Err(OverrideError::Malformed),
            }
        } else {
            byte
        };
        out.push(decoded).map_err(|_| OverrideError::Malformed)?;
    }
    core::str::from_utf8(out).map_err(|_| OverrideError::Malformed)
}

fn parse_value(kind: ValueKind, raw: &str) -> Result<Value, OverrideError> {
    let mut decoded = heapless::Vec::new();
    let raw = percent_decode(raw, &mut decoded)?.trim();
    match kind {
        ValueKind::Percent => {
            let value: i64 = raw.parse().map_err(|_| OverrideError::Malformed)?;
            u8::try_from(value.clamp(0, 100))
                .map(Value::Percent)
                .map_err(|_| OverrideError::Malformed)
        }
        ValueKind::Ratio => {
            let value: f64 = raw.parse().map_err(|_| OverrideError::Malformed)?;
            if value.is_finite() {
                Ok(Value::Ratio(value.clamp(0.0, 1.0)))
            } else {
                Err(OverrideError::Malformed)
            }
        }
        ValueKind::Millis => {
            let value: i64 = raw.parse().map_err(|_| OverrideError::Malformed)?;
            let millis = u64::try_from(value).unwrap_or(0);
            Ok(Value::Millis(Duration::from_millis(millis)))
        }
        ValueKind::Angle => {
            let value: i64 = raw.parse().map_err(|_| OverrideError::Malformed)?;
            let degrees = i32::try_from(value.clamp(0, 180)).map_err(|_| OverrideError::Malformed)?;
            Ok(Value::Angle(Angle::clamped(degrees)))
        }
        ValueKind::Side => Side::parse(raw).map(Value::Side).ok_or(OverrideError::UnknownSide),
    }
}

/// Parses `raw` for `key` and stores it in the matching tunable.
pub fn apply_override(
    key: ParameterKey,
    raw: &str,
    line: &mut LineFollowTunables,
    mission: &mut MissionTunables,
) -> Result<(), OverrideError> {
    let value = parse_value(key.kind(), raw)?;
    match (key, value) {
        (ParameterKey::Speed, Value::Percent(v)) => line.base_speed = v,
        (ParameterKey::Slight, Value::Ratio(v)) => line.slight_ratio = v,
        (ParameterKey::Mild, Value::Ratio(v)) => line.mild_ratio = v,
        (ParameterKey::Hard, Value::Ratio(v)) => line.hard_ratio = v,
        (ParameterKey::Grace, Value::Millis(v)) => line.grace_period = v,
        (ParameterKey::Search, Value::Ratio(v)) => line.search_ratio = v,
        (ParameterKey::BaseCenter, Value::Angle(v)) => mission.base_center = v,
        (ParameterKey::BaseOffset, Value::Angle(v)) => mission.base_offset = v,
        (ParameterKey::FirstSide, Value::Side(v)) => mission.first_side = v,
        (ParameterKey::ArmTransport, Value::Angle(v)) => mission.arm_transport = v,
        (ParameterKey::ArmDown, Value::Angle(v)) => mission.arm_down = v,
        (ParameterKey::GripOpen, Value::Angle(v)) => mission.grip_open = v,
        (ParameterKey::GripClose, Value::Angle(v)) => mission.grip_close = v,
        (ParameterKey::ServoSettle, Value::Millis(v)) => mission.servo_settle = v,
        (ParameterKey::ReverseSpeed, Value::Percent(v)) => mission.reverse_speed = Duty::new(v),
        (ParameterKey::ReverseTime, Value::Millis(v)) => mission.reverse_time = v,
        (ParameterKey::RotateDir, Value::Side(v)) => mission.rotate_dir = v,
        (ParameterKey::RotateSpeed, Value::Percent(v)) => mission.rotate_speed = Duty::new(v),
        (ParameterKey::RotateTime, Value::Millis(v)) => mission.rotate_time = v,
        _ => return Err(OverrideError::Malformed),
    }
    Ok(())
}

/// Tally of one batch of overrides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverrideSummary {
    pub applied: u8,
    pub skipped: u8,
    /// Keys outside the recognized table.
    pub ignored: u8,
}

impl OverrideSummary {
    /// Counts pairs cut off by the query cap as ignored.
    #[must_use]
    pub const fn with_dropped(self, dropped: u8) -> Self {
        Self {
            ignored: self.ignored.saturating_add(dropped),
            ..self
        }
    }
}

/// Applies every recognized pair in order; later duplicates win.
pub fn apply_overrides<'a, P>(
    pairs: P,
    line: &mut LineFollowTunables,
    mission: &mut MissionTunables,
) -> OverrideSummary
where
    P: IntoIterator<Item = &'a QueryPair<'a>>,
{
    let mut summary = OverrideSummary::default();
    for pair in pairs {
        if pair.key == ACTION_KEY {
            continue;
        }
        match ParameterKey::from_name(pair.key) {
            Some(key) => match apply_override(key, pair.value, line, mission) {
                Ok(()) => summary.applied = summary.applied.saturating_add(1),
                Err(_) => summary.skipped = summary.skipped.saturating_add(1),
            },
            None => summary.ignored = summary.ignored.saturating_add(1),
        }
    }
    summary
}
