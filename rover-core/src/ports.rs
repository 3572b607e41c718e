//! Hardware seams consumed by the mission logic.
//!
//! The firmware binds these traits to timers and GPIO, the emulator to its
//! kinematic track model. Values crossing the boundary are range-checked by
//! construction: [`Duty`] never exceeds 100 and [`Angle`] never exceeds 180.

use core::fmt;

use crate::decision::SensorSnapshot;

/// One of the four independently driven wheels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wheel {
    LeftFront,
    LeftBack,
    RightFront,
    RightBack,
}

impl Wheel {
    /// All wheels in dispatch order.
    pub const ALL: [Wheel; 4] = [
        Wheel::LeftFront,
        Wheel::LeftBack,
        Wheel::RightFront,
        Wheel::RightBack,
    ];

    /// Returns `true` for the wheels on the left side of the chassis.
    #[must_use]
    pub const fn is_left(self) -> bool {
        matches!(self, Wheel::LeftFront | Wheel::LeftBack)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Wheel::LeftFront => 0,
            Wheel::LeftBack => 1,
            Wheel::RightFront => 2,
            Wheel::RightBack => 3,
        }
    }
}

impl fmt::Display for Wheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Wheel::LeftFront => "left-front",
            Wheel::LeftBack => "left-back",
            Wheel::RightFront => "right-front",
            Wheel::RightBack => "right-back",
        })
    }
}

/// Rotation sense requested for a wheel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WheelDirection {
    Forward,
    Backward,
}

/// PWM duty in percent, clamped to `0..=100`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duty(u8);

impl Duty {
    pub const ZERO: Duty = Duty(0);
    pub const MAX: Duty = Duty(100);

    /// Builds a duty value, saturating anything above 100 percent.
    #[must_use]
    pub const fn new(percent: u8) -> Self {
        if percent > 100 { Duty(100) } else { Duty(percent) }
    }

    /// Truncates a fractional duty toward zero, matching integer speed math.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_scaled(value: f64) -> Self {
        if value.is_nan() || value <= 0.0 {
            Duty::ZERO
        } else if value >= 100.0 {
            Duty::MAX
        } else {
            Duty(value as u8)
        }
    }

    #[must_use]
    pub const fn percent(self) -> u8 {
        self.0
    }
}

/// Servo channel on the arm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmChannel {
    Base,
    Elevation,
    Gripper,
}

impl ArmChannel {
    pub const ALL: [ArmChannel; 3] = [ArmChannel::Base, ArmChannel::Elevation, ArmChannel::Gripper];

    /// Servo controller channel number.
    #[must_use]
    pub const fn channel(self) -> u8 {
        match self {
            ArmChannel::Base => 0,
            ArmChannel::Elevation => 1,
            ArmChannel::Gripper => 2,
        }
    }
}

impl fmt::Display for ArmChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArmChannel::Base => "base",
            ArmChannel::Elevation => "arm",
            ArmChannel::Gripper => "gripper",
        })
    }
}

/// Servo angle in degrees, clamped to `0..=180`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Angle(u8);

impl Angle {
    pub const MAX_DEGREES: u8 = 180;

    #[must_use]
    pub const fn new(degrees: u8) -> Self {
        if degrees > Self::MAX_DEGREES {
            Angle(Self::MAX_DEGREES)
        } else {
            Angle(degrees)
        }
    }

    /// Clamps a signed intermediate (for example `center - offset`).
    #[must_use]
    pub fn clamped(degrees: i32) -> Self {
        let degrees = degrees.clamp(0, i32::from(Self::MAX_DEGREES));
        u8::try_from(degrees).map_or(Angle(Self::MAX_DEGREES), Angle)
    }

    #[must_use]
    pub const fn degrees(self) -> u8 {
        self.0
    }
}

/// Identifies the port that raised a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortId {
    Motor(Wheel),
    MotorBus,
    Arm(ArmChannel),
    Sensors,
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortId::Motor(wheel) => write!(f, "motor {wheel}"),
            PortId::MotorBus => f.write_str("motor bus"),
            PortId::Arm(channel) => write!(f, "servo {channel}"),
            PortId::Sensors => f.write_str("sensor array"),
        }
    }
}

/// Failure category reported by a port implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortFaultKind {
    /// The driver refused or failed to apply the command.
    Rejected,
    /// The peripheral did not respond.
    Unresponsive,
    /// The reading could not be trusted.
    InvalidReading,
}

/// Typed fault surfaced by a hardware port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortFault {
    pub port: PortId,
    pub kind: PortFaultKind,
}

impl PortFault {
    #[must_use]
    pub const fn new(port: PortId, kind: PortFaultKind) -> Self {
        Self { port, kind }
    }
}

impl fmt::Display for PortFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            PortFaultKind::Rejected => "rejected command",
            PortFaultKind::Unresponsive => "unresponsive",
            PortFaultKind::InvalidReading => "invalid reading",
        };
        write!(f, "{}: {kind}", self.port)
    }
}

/// Four-wheel motor driver.
pub trait MotorPort {
    /// Drives one wheel in `direction` at `duty`.
    fn drive(&mut self, wheel: Wheel, direction: WheelDirection, duty: Duty)
    -> Result<(), PortFault>;

    /// Removes drive from every wheel.
    fn stop_all(&mut self) -> Result<(), PortFault>;
}

/// Three-channel servo arm.
pub trait ArmPort {
    fn set_angle(&mut self, channel: ArmChannel, angle: Angle) -> Result<(), PortFault>;
}

/// Five-element reflectance array.
pub trait SensorPort {
    fn sample(&mut self) -> Result<SensorSnapshot, PortFault>;
}
