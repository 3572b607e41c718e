//! Kinematic model of the rover on a straight taped track.
//!
//! The track runs along +x from the start marker at `0` to the end marker at
//! `length_cm`; each marker is a crossbar that lights every sensor. Lateral
//! offset is measured to the right of the line when facing the end marker and
//! heading is measured clockwise, so a positive yaw rate turns the rover right.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rover_core::MissionInstant;
use rover_core::decision::{SENSOR_COUNT, SensorSnapshot};
use rover_core::ports::{
    Angle, ArmChannel, ArmPort, Duty, MotorPort, PortFault, PortFaultKind, PortId, SensorPort,
    Wheel, WheelDirection,
};

/// Time since the emulator booted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimInstant(Duration);

impl SimInstant {
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Reads the host monotonic clock.
    #[must_use]
    pub fn now() -> Self {
        static BOOT: OnceLock<Instant> = OnceLock::new();
        Self(BOOT.get_or_init(Instant::now).elapsed())
    }
}

impl MissionInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

/// Geometry and drivetrain constants of the simulated track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackConfig {
    /// Distance from the start marker to the end marker.
    pub length_cm: f64,
    /// Depth of each marker crossbar.
    pub marker_cm: f64,
    pub line_half_width_cm: f64,
    pub sensor_pitch_cm: f64,
    /// Ground speed with every wheel at full forward duty.
    pub top_speed_cm_s: f64,
    /// Yaw rate per unit of left/right duty difference.
    pub turn_rate_deg_s: f64,
    /// Clockwise yaw picked up while driving at top speed.
    pub drift_deg_s: f64,
    /// Where the rover is placed at boot.
    pub start_cm: f64,
}

impl TrackConfig {
    pub const DEFAULT: Self = Self {
        length_cm: 200.0,
        marker_cm: 3.0,
        line_half_width_cm: 1.0,
        sensor_pitch_cm: 1.5,
        top_speed_cm_s: 60.0,
        turn_rate_deg_s: 225.0,
        drift_deg_s: 2.0,
        start_cm: 10.0,
    };
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Sensor positions across the bar, rightmost first, in units of pitch.
const SENSOR_SLOTS: [f64; SENSOR_COUNT] = [2.0, 1.0, 0.0, -1.0, -2.0];

/// Pose and actuator state of the simulated rover.
#[derive(Clone, Debug)]
pub struct SimWorld {
    config: TrackConfig,
    position_cm: f64,
    offset_cm: f64,
    heading_rad: f64,
    wheels: [(WheelDirection, Duty); 4],
    arm: [Angle; 3],
    last_step: Option<SimInstant>,
    pending_faults: u8,
}

/// Copy of the world used by the status panel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldView {
    pub position_cm: f64,
    pub offset_cm: f64,
    pub heading_deg: f64,
    pub wheels: [(WheelDirection, Duty); 4],
    pub arm: [Angle; 3],
}

impl SimWorld {
    #[must_use]
    pub fn new(config: TrackConfig) -> Self {
        Self {
            config,
            position_cm: config.start_cm,
            offset_cm: 0.0,
            heading_rad: 0.0,
            wheels: [(WheelDirection::Forward, Duty::ZERO); 4],
            arm: [Angle::new(90); 3],
            last_step: None,
            pending_faults: 0,
        }
    }

    /// Integrates the pose from the previous step up to `now`.
    pub fn advance_to(&mut self, now: SimInstant) {
        let Some(last) = self.last_step.replace(now) else {
            return;
        };
        let dt = now.saturating_duration_since(last).as_secs_f64();
        if dt <= 0.0 {
            return;
        }

        let left = f64::midpoint(
            self.wheel_speed(Wheel::LeftFront),
            self.wheel_speed(Wheel::LeftBack),
        );
        let right = f64::midpoint(
            self.wheel_speed(Wheel::RightFront),
            self.wheel_speed(Wheel::RightBack),
        );
        let speed = f64::midpoint(left, right) * self.config.top_speed_cm_s;
        let drift =
            self.config.drift_deg_s.to_radians() * (speed.abs() / self.config.top_speed_cm_s);
        let yaw = (left - right) * self.config.turn_rate_deg_s.to_radians() + drift;

        self.heading_rad += yaw * dt;
        self.position_cm += speed * self.heading_rad.cos() * dt;
        self.offset_cm += speed * self.heading_rad.sin() * dt;
    }

    /// What the reflectance array sees at the current pose.
    #[must_use]
    pub fn sensors(&self) -> SensorSnapshot {
        let x = self.position_cm;
        let length = self.config.length_cm;
        let marker = self.config.marker_cm;
        if (-marker..=0.0).contains(&x) || (length..=length + marker).contains(&x) {
            return SensorSnapshot::new([true; SENSOR_COUNT]);
        }
        if !(0.0..=length).contains(&x) {
            return SensorSnapshot::new([false; SENSOR_COUNT]);
        }

        // The bar's lateral axis flips when the rover faces the start marker.
        let facing = self.heading_rad.cos();
        SensorSnapshot::new(SENSOR_SLOTS.map(|slot| {
            let lateral = self.offset_cm + slot * self.config.sensor_pitch_cm * facing;
            lateral.abs() <= self.config.line_half_width_cm
        }))
    }

    #[must_use]
    pub fn view(&self) -> WorldView {
        WorldView {
            position_cm: self.position_cm,
            offset_cm: self.offset_cm,
            heading_deg: self.heading_rad.to_degrees(),
            wheels: self.wheels,
            arm: self.arm,
        }
    }

    /// Makes the next `count` actuator calls fail.
    pub fn inject_faults(&mut self, count: u8) {
        self.pending_faults = count;
    }

    fn take_fault(&mut self) -> bool {
        if self.pending_faults == 0 {
            return false;
        }
        self.pending_faults -= 1;
        true
    }

    fn wheel_speed(&self, wheel: Wheel) -> f64 {
        let (direction, duty) = self.wheels[wheel.index()];
        let magnitude = f64::from(duty.percent()) / 100.0;
        match direction {
            WheelDirection::Forward => magnitude,
            WheelDirection::Backward => -magnitude,
        }
    }
}

pub type SharedWorld = Arc<Mutex<SimWorld>>;

/// Wheel driver backed by the simulated drivetrain.
pub struct SimMotors {
    world: SharedWorld,
}

impl SimMotors {
    #[must_use]
    pub fn new(world: SharedWorld) -> Self {
        Self { world }
    }
}

impl MotorPort for SimMotors {
    fn drive(
        &mut self,
        wheel: Wheel,
        direction: WheelDirection,
        duty: Duty,
    ) -> Result<(), PortFault> {
        let mut world = self.world.lock();
        if world.take_fault() {
            return Err(PortFault::new(PortId::Motor(wheel), PortFaultKind::Rejected));
        }
        world.wheels[wheel.index()] = (direction, duty);
        Ok(())
    }

    fn stop_all(&mut self) -> Result<(), PortFault> {
        let mut world = self.world.lock();
        if world.take_fault() {
            return Err(PortFault::new(PortId::MotorBus, PortFaultKind::Unresponsive));
        }
        world.wheels = [(WheelDirection::Forward, Duty::ZERO); 4];
        Ok(())
    }
}

/// Servo bank that snaps to the commanded angle.
pub struct SimArm {
    world: SharedWorld,
}

impl SimArm {
    #[must_use]
    pub fn new(world: SharedWorld) -> Self {
        Self { world }
    }
}

impl ArmPort for SimArm {
    fn set_angle(&mut self, channel: ArmChannel, angle: Angle) -> Result<(), PortFault> {
        let mut world = self.world.lock();
        if world.take_fault() {
            return Err(PortFault::new(PortId::Arm(channel), PortFaultKind::Rejected));
        }
        world.arm[usize::from(channel.channel())] = angle;
        Ok(())
    }
}

pub struct SimSensors {
    world: SharedWorld,
}

impl SimSensors {
    #[must_use]
    pub fn new(world: SharedWorld) -> Self {
        Self { world }
    }
}

impl SensorPort for SimSensors {
    fn sample(&mut self) -> Result<SensorSnapshot, PortFault> {
        Ok(self.world.lock().sensors())
    }
}
