//! Wheel command synthesis and the line-lost recovery heuristic.
//!
//! [`apply`] turns a [`SteeringAction`] into a [`MotorCommand`] without
//! touching hardware. The caller stamps the result into an
//! [`ActuationPlan`](crate::gate::ActuationPlan) and dispatches it after
//! releasing the shared-state lock.

use core::time::Duration;

use crate::MissionInstant;
use crate::decision::{Severity, SteeringAction, TurnSide};
use crate::ports::{Duty, MotorPort, PortFault, Wheel, WheelDirection};

/// Factor applied to the search intensity on every consecutive line-lost tick.
pub const SEARCH_ESCALATION: f64 = 1.5;

/// Operator-tunable line following parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineFollowTunables {
    /// Outer-wheel duty in percent.
    pub base_speed: u8,
    pub slight_ratio: f64,
    pub mild_ratio: f64,
    pub hard_ratio: f64,
    /// How long a recovery pivot is attempted after the line disappears.
    pub grace_period: Duration,
    pub search_ratio: f64,
}

impl LineFollowTunables {
    pub const DEFAULT: Self = Self {
        base_speed: 30,
        slight_ratio: 0.9,
        mild_ratio: 0.75,
        hard_ratio: 0.6,
        grace_period: Duration::from_millis(800),
        search_ratio: 0.4,
    };

    /// Inner-wheel ratio for a turn of the given severity.
    #[must_use]
    pub const fn ratio_for(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Slight => self.slight_ratio,
            Severity::Mild => self.mild_ratio,
            Severity::Hard => self.hard_ratio,
        }
    }
}

impl Default for LineFollowTunables {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Mutable state owned by the line-follow loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineFollowRuntime<I> {
    pub running: bool,
    pub line_lost: bool,
    pub line_lost_since: Option<I>,
    pub last_direction: SteeringAction,
    pub search_intensity: f64,
}

impl<I> LineFollowRuntime<I> {
    /// Idle runtime as created at power-up.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            running: false,
            line_lost: false,
            line_lost_since: None,
            last_direction: SteeringAction::Forward,
            search_intensity: 1.0,
        }
    }

    /// Re-arms line following with every recovery field cleared.
    pub fn resume(&mut self) {
        self.running = true;
        self.line_lost = false;
        self.line_lost_since = None;
        self.last_direction = SteeringAction::Forward;
        self.search_intensity = 1.0;
    }

    pub fn halt(&mut self) {
        self.running = false;
    }

    /// Closes any open line-lost window.
    pub fn clear_lost(&mut self) {
        self.line_lost = false;
        self.line_lost_since = None;
    }
}

impl<I> Default for LineFollowRuntime<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Direction and duty for one wheel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WheelCommand {
    pub wheel: Wheel,
    pub direction: WheelDirection,
    pub duty: Duty,
}

/// Command for the whole drive train.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotorCommand {
    StopAll,
    Drive([WheelCommand; 4]),
}

impl MotorCommand {
    /// Drives the left and right wheel pairs independently.
    #[must_use]
    pub fn sides(left: (WheelDirection, Duty), right: (WheelDirection, Duty)) -> Self {
        MotorCommand::Drive(Wheel::ALL.map(|wheel| {
            let (direction, duty) = if wheel.is_left() { left } else { right };
            WheelCommand {
                wheel,
                direction,
                duty,
            }
        }))
    }

    /// All four wheels forward at `duty`.
    #[must_use]
    pub fn straight(duty: Duty) -> Self {
        Self::sides(
            (WheelDirection::Forward, duty),
            (WheelDirection::Forward, duty),
        )
    }

    /// All four wheels backward at `duty`.
    #[must_use]
    pub fn reverse(duty: Duty) -> Self {
        Self::sides(
            (WheelDirection::Backward, duty),
            (WheelDirection::Backward, duty),
        )
    }

    /// Spins in place toward `side`; the pair on that side runs backward.
    #[must_use]
    pub fn pivot(side: TurnSide, duty: Duty) -> Self {
        match side {
            TurnSide::Left => Self::sides(
                (WheelDirection::Backward, duty),
                (WheelDirection::Forward, duty),
            ),
            TurnSide::Right => Self::sides(
                (WheelDirection::Forward, duty),
                (WheelDirection::Backward, duty),
            ),
        }
    }

    /// Sends the command to the motor driver.
    pub fn issue<M: MotorPort>(&self, motors: &mut M) -> Result<(), PortFault> {
        match self {
            MotorCommand::StopAll => motors.stop_all(),
            MotorCommand::Drive(wheels) => {
                for command in wheels {
                    motors.drive(command.wheel, command.direction, command.duty)?;
                }
                Ok(())
            }
        }
    }
}

/// Forward drive for a directional action; the inner pair is slowed on turns.
#[must_use]
pub fn steer(action: SteeringAction, tunables: &LineFollowTunables) -> MotorCommand {
    let outer = Duty::new(tunables.base_speed);
    match action.turn() {
        Some((side, severity)) => {
            let inner = Duty::from_scaled(
                f64::from(tunables.base_speed) * tunables.ratio_for(severity),
            );
            let forward = WheelDirection::Forward;
            match side {
                TurnSide::Left => MotorCommand::sides((forward, inner), (forward, outer)),
                TurnSide::Right => MotorCommand::sides((forward, outer), (forward, inner)),
            }
        }
        None => MotorCommand::straight(outer),
    }
}

/// Computes the motor command for `action` and updates the runtime.
pub fn apply<I: MissionInstant>(
    action: SteeringAction,
    tunables: &LineFollowTunables,
    runtime: &mut LineFollowRuntime<I>,
    now: I,
) -> MotorCommand {
    match action {
        SteeringAction::OnJunction => {
            runtime.search_intensity = 1.0;
            MotorCommand::StopAll
        }
        SteeringAction::LineLost | SteeringAction::Searching => {
            if action == SteeringAction::LineLost {
                runtime.search_intensity *= SEARCH_ESCALATION;
            }
            let within_grace = runtime
                .line_lost_since
                .is_some_and(|since| now.saturating_duration_since(since) < tunables.grace_period);
            if !within_grace {
                runtime.search_intensity = 1.0;
                return MotorCommand::StopAll;
            }
            match runtime.last_direction.bias() {
                Some(side) => {
                    let duty = Duty::from_scaled(
                        f64::from(tunables.base_speed)
                            * tunables.search_ratio
                            * runtime.search_intensity,
                    );
                    // Pivot toward the side the line was last seen on.
                    MotorCommand::pivot(side, duty)
                }
                None => steer(runtime.last_direction, tunables),
            }
        }
        directional => {
            runtime.last_direction = directional;
            runtime.search_intensity = 1.0;
            steer(directional, tunables)
        }
    }
}
