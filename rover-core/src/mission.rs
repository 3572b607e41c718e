//! Mission lifecycle and the staged manipulation sequencer.
//!
//! The manipulation at the far marker is a fixed template of ten
//! [`StageStep`]s. Each step names the dwell that must elapse since the stage
//! was entered and the commands issued once it has. [`poll`] is called on the
//! mission cadence, never blocks, and advances at most one stage per call.

use core::fmt;
use core::time::Duration;

use crate::MissionInstant;
use crate::decision::TurnSide;
use crate::gate::{ActuationPlan, ArmCommand};
use crate::motion::MotorCommand;
use crate::ports::{Angle, ArmChannel, Duty};
use crate::state::SharedState;

pub const STATUS_STOPPED: &str = "Stopped";
pub const STATUS_OUTBOUND: &str = "Going to end marker";
pub const STATUS_MANIPULATING: &str = "Manipulating object";
pub const STATUS_RETURNING: &str = "Returning to start";
pub const STATUS_DONE: &str = "Mission accomplished (back at start)";
pub const STATUS_STOPPED_BY_USER: &str = "Stopped by user";
pub const STATUS_FAULT: &str = "Halted: actuator fault";

/// Chassis side used by the base servo and the rotate maneuver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// Accepts exactly `left` or `right`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            _ => None,
        }
    }

    const fn turn(self) -> TurnSide {
        match self {
            Side::Left => TurnSide::Left,
            Side::Right => TurnSide::Right,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of one mission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissionMode {
    #[default]
    Idle,
    Outbound,
    ArmSeq,
    Returning,
    Done,
}

impl MissionMode {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            MissionMode::Idle => "IDLE",
            MissionMode::Outbound => "OUTBOUND",
            MissionMode::ArmSeq => "ARM_SEQ",
            MissionMode::Returning => "RETURNING",
            MissionMode::Done => "DONE",
        }
    }
}

impl fmt::Display for MissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Manipulation stages, in execution order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissionStage {
    #[default]
    BaseToFirstSide,
    CloseGripper,
    LiftToTransport,
    BaseToOppositeSide,
    LowerArm,
    OpenGripper,
    LiftAndReverse,
    Reversing,
    Rotating,
    Handoff,
}

impl MissionStage {
    pub const ALL: [MissionStage; 10] = [
        MissionStage::BaseToFirstSide,
        MissionStage::CloseGripper,
        MissionStage::LiftToTransport,
        MissionStage::BaseToOppositeSide,
        MissionStage::LowerArm,
        MissionStage::OpenGripper,
        MissionStage::LiftAndReverse,
        MissionStage::Reversing,
        MissionStage::Rotating,
        MissionStage::Handoff,
    ];

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Stage that follows this one, `None` after the hand-off.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(usize::from(self.index()) + 1).copied()
    }

    #[must_use]
    pub fn step(self) -> &'static StageStep {
        &MISSION_STAGES[usize::from(self.index())]
    }
}

/// Operator-tunable manipulation and maneuver parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MissionTunables {
    pub base_center: Angle,
    pub base_offset: Angle,
    pub first_side: Side,
    pub arm_transport: Angle,
    pub arm_down: Angle,
    pub grip_open: Angle,
    pub grip_close: Angle,
    pub servo_settle: Duration,
    pub reverse_speed: Duty,
    pub reverse_time: Duration,
    pub rotate_dir: Side,
    pub rotate_speed: Duty,
    pub rotate_time: Duration,
}

impl MissionTunables {
    pub const DEFAULT: Self = Self {
        base_center: Angle::new(90),
        base_offset: Angle::new(45),
        first_side: Side::Left,
        arm_transport: Angle::new(100),
        arm_down: Angle::new(70),
        grip_open: Angle::new(120),
        grip_close: Angle::new(60),
        servo_settle: Duration::from_millis(600),
        reverse_speed: Duty::new(35),
        reverse_time: Duration::from_millis(600),
        rotate_dir: Side::Left,
        rotate_speed: Duty::new(40),
        rotate_time: Duration::from_millis(1_000),
    };

    /// Base servo angle that points the arm at `side`.
    #[must_use]
    pub fn base_angle_for(&self, side: Side) -> Angle {
        let center = i32::from(self.base_center.degrees());
        let offset = i32::from(self.base_offset.degrees());
        match side {
            Side::Left => Angle::clamped(center - offset),
            Side::Right => Angle::clamped(center + offset),
        }
    }

    /// Arm pose applied when a mission starts.
    #[must_use]
    pub const fn neutral_pose(&self) -> [ArmCommand; 3] {
        [
            ArmCommand::new(ArmChannel::Base, self.base_center),
            ArmCommand::new(ArmChannel::Elevation, self.arm_transport),
            ArmCommand::new(ArmChannel::Gripper, self.grip_open),
        ]
    }
}

impl Default for MissionTunables {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Dwell that must elapse before a stage fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageGate {
    Immediate,
    ServoSettle,
    ReverseTime,
    RotateTime,
}

impl StageGate {
    #[must_use]
    pub const fn dwell(self, tunables: &MissionTunables) -> Duration {
        match self {
            StageGate::Immediate => Duration::ZERO,
            StageGate::ServoSettle => tunables.servo_settle,
            StageGate::ReverseTime => tunables.reverse_time,
            StageGate::RotateTime => tunables.rotate_time,
        }
    }
}

/// Named arm targets resolved against the current tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmPose {
    BaseFirstSide,
    BaseOppositeSide,
    ArmTransport,
    ArmDown,
    GripClose,
    GripOpen,
}

impl ArmPose {
    #[must_use]
    pub fn command(self, tunables: &MissionTunables) -> ArmCommand {
        match self {
            ArmPose::BaseFirstSide => ArmCommand::new(
                ArmChannel::Base,
                tunables.base_angle_for(tunables.first_side),
            ),
            ArmPose::BaseOppositeSide => ArmCommand::new(
                ArmChannel::Base,
                tunables.base_angle_for(tunables.first_side.opposite()),
            ),
            ArmPose::ArmTransport => ArmCommand::new(ArmChannel::Elevation, tunables.arm_transport),
            ArmPose::ArmDown => ArmCommand::new(ArmChannel::Elevation, tunables.arm_down),
            ArmPose::GripClose => ArmCommand::new(ArmChannel::Gripper, tunables.grip_close),
            ArmPose::GripOpen => ArmCommand::new(ArmChannel::Gripper, tunables.grip_open),
        }
    }
}

/// Commands issued when a stage's gate opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageEffect {
    Pose(ArmPose),
    PoseAndReverse(ArmPose),
    StopAndRotate,
    Stop,
    /// Returns control to the line-follow loop for the way back.
    Handoff,
}

/// One entry of the manipulation template.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageStep {
    pub stage: MissionStage,
    pub gate: StageGate,
    pub effect: StageEffect,
}

impl StageStep {
    const fn new(stage: MissionStage, gate: StageGate, effect: StageEffect) -> Self {
        Self {
            stage,
            gate,
            effect,
        }
    }
}

pub static MISSION_STAGES: [StageStep; 10] = [
    StageStep::new(
        MissionStage::BaseToFirstSide,
        StageGate::Immediate,
        StageEffect::Pose(ArmPose::BaseFirstSide),
    ),
    StageStep::new(
        MissionStage::CloseGripper,
        StageGate::ServoSettle,
        StageEffect::Pose(ArmPose::GripClose),
    ),
    StageStep::new(
        MissionStage::LiftToTransport,
        StageGate::ServoSettle,
        StageEffect::Pose(ArmPose::ArmTransport),
    ),
    StageStep::new(
        MissionStage::BaseToOppositeSide,
        StageGate::ServoSettle,
        StageEffect::Pose(ArmPose::BaseOppositeSide),
    ),
    StageStep::new(
        MissionStage::LowerArm,
        StageGate::ServoSettle,
        StageEffect::Pose(ArmPose::ArmDown),
    ),
    StageStep::new(
        MissionStage::OpenGripper,
        StageGate::ServoSettle,
        StageEffect::Pose(ArmPose::GripOpen),
    ),
    StageStep::new(
        MissionStage::LiftAndReverse,
        StageGate::ServoSettle,
        StageEffect::PoseAndReverse(ArmPose::ArmTransport),
    ),
    StageStep::new(
        MissionStage::Reversing,
        StageGate::ReverseTime,
        StageEffect::StopAndRotate,
    ),
    StageStep::new(
        MissionStage::Rotating,
        StageGate::RotateTime,
        StageEffect::Stop,
    ),
    StageStep::new(
        MissionStage::Handoff,
        StageGate::Immediate,
        StageEffect::Handoff,
    ),
];

/// Advances the manipulation sequence if the current stage's dwell has elapsed.
///
/// Returns the commands to dispatch when a stage fired, `None` otherwise or
/// when the mission is not in [`MissionMode::ArmSeq`].
pub fn poll<I: MissionInstant>(state: &mut SharedState<I>, now: I) -> Option<ActuationPlan> {
    if state.mission.mode != MissionMode::ArmSeq {
        return None;
    }

    let step = state.mission.stage.step();
    let elapsed = state
        .mission
        .stage_started_at
        .map_or(Duration::MAX, |started| now.saturating_duration_since(started));
    if elapsed < step.gate.dwell(&state.mission_tunables) {
        return None;
    }

    let tunables = state.mission_tunables;
    let mut plan = state.plan();
    match step.effect {
        StageEffect::Pose(pose) => plan.push_arm(pose.command(&tunables)),
        StageEffect::PoseAndReverse(pose) => {
            plan.push_arm(pose.command(&tunables));
            plan.push_motor(MotorCommand::reverse(tunables.reverse_speed));
        }
        StageEffect::StopAndRotate => {
            plan.push_motor(MotorCommand::StopAll);
            plan.push_motor(MotorCommand::pivot(
                tunables.rotate_dir.turn(),
                tunables.rotate_speed,
            ));
        }
        StageEffect::Stop => plan.push_motor(MotorCommand::StopAll),
        StageEffect::Handoff => state.begin_return(now),
    }

    if let Some(next) = step.stage.next() {
        state.enter_stage(next, now);
    }
    Some(plan)
}
