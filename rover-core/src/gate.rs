//! Epoch-fenced actuation.
//!
//! Decisions are computed under the shared-state lock and come out as an
//! [`ActuationPlan`] stamped with the state's epoch. The [`ActuatorGate`] owns
//! the motor and arm ports and remembers the newest epoch it has dispatched.
//! A plan older than that fence is dropped, so a plan computed before a stop
//! can never reach the wheels after the stop has been dispatched.

use heapless::Vec;

use crate::motion::MotorCommand;
use crate::ports::{Angle, ArmChannel, ArmPort, MotorPort, PortFault};

/// Upper bound on motor commands in a single plan (stop, then a new drive).
pub const MAX_MOTOR_COMMANDS: usize = 2;
/// Upper bound on arm commands in a single plan (the full neutral pose).
pub const MAX_ARM_COMMANDS: usize = 3;

/// Absolute angle request for one arm servo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArmCommand {
    pub channel: ArmChannel,
    pub angle: Angle,
}

impl ArmCommand {
    #[must_use]
    pub const fn new(channel: ArmChannel, angle: Angle) -> Self {
        Self { channel, angle }
    }
}

/// Commands computed under the state lock, dispatched after it is released.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActuationPlan {
    epoch: u32,
    arm: Vec<ArmCommand, MAX_ARM_COMMANDS>,
    motor: Vec<MotorCommand, MAX_MOTOR_COMMANDS>,
}

impl ActuationPlan {
    #[must_use]
    pub const fn new(epoch: u32) -> Self {
        Self {
            epoch,
            arm: Vec::new(),
            motor: Vec::new(),
        }
    }

    /// Plan holding a single motor command.
    #[must_use]
    pub fn motor_only(epoch: u32, command: MotorCommand) -> Self {
        let mut plan = Self::new(epoch);
        plan.push_motor(command);
        plan
    }

    pub fn push_motor(&mut self, command: MotorCommand) {
        let pushed = self.motor.push(command);
        debug_assert!(pushed.is_ok(), "motor plan capacity exceeded");
    }

    pub fn push_arm(&mut self, command: ArmCommand) {
        let pushed = self.arm.push(command);
        debug_assert!(pushed.is_ok(), "arm plan capacity exceeded");
    }

    #[must_use]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }

    #[must_use]
    pub fn motor_commands(&self) -> &[MotorCommand] {
        &self.motor
    }

    #[must_use]
    pub fn arm_commands(&self) -> &[ArmCommand] {
        &self.arm
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.motor.is_empty() && self.arm.is_empty()
    }
}

/// Result of handing a plan to the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Applied,
    /// The plan predates the newest dispatched epoch and was dropped.
    Superseded { plan_epoch: u32, fence: u32 },
}

/// Sole owner of the actuation ports.
pub struct ActuatorGate<M, A> {
    motors: M,
    arm: A,
    fence: u32,
}

impl<M, A> ActuatorGate<M, A>
where
    M: MotorPort,
    A: ArmPort,
{
    #[must_use]
    pub const fn new(motors: M, arm: A) -> Self {
        Self {
            motors,
            arm,
            fence: 0,
        }
    }

    /// Issues every command in `plan`, arm first, unless it has been superseded.
    pub fn dispatch(&mut self, plan: &ActuationPlan) -> Result<DispatchOutcome, PortFault> {
        if plan.epoch < self.fence {
            return Ok(DispatchOutcome::Superseded {
                plan_epoch: plan.epoch,
                fence: self.fence,
            });
        }
        self.fence = plan.epoch;

        for command in &plan.arm {
            self.arm.set_angle(command.channel, command.angle)?;
        }
        for command in &plan.motor {
            command.issue(&mut self.motors)?;
        }
        Ok(DispatchOutcome::Applied)
    }

    pub fn motors(&self) -> &M {
        &self.motors
    }

    pub fn arm(&self) -> &A {
        &self.arm
    }
}
