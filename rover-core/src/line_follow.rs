//! Periodic line-follow step.
//!
//! [`tick`] is the only place junctions and line loss are detected. It runs on
//! every [`TICK_PERIOD`](crate::TICK_PERIOD) whether or not a mission is in
//! progress so the latest sensor sample is always available to telemetry.

use crate::MissionInstant;
use crate::decision::{SensorSnapshot, SteeringAction, classify};
use crate::gate::ActuationPlan;
use crate::mission::MissionMode;
use crate::motion::{self, MotorCommand};
use crate::state::SharedState;
use crate::telemetry::MissionEvent;

/// Processes one sensor sample and returns the wheel commands to dispatch.
pub fn tick<I: MissionInstant>(
    state: &mut SharedState<I>,
    snapshot: SensorSnapshot,
    now: I,
) -> Option<ActuationPlan> {
    state.sensors = snapshot;
    if !state.runtime.running {
        return None;
    }

    let action = classify(&snapshot);
    state.last_action = action;
    let command = respond_to(state, action, now)?;
    Some(ActuationPlan::motor_only(state.epoch(), command))
}

/// Turns one classification into a wheel command; `None` while the lost
/// window is only being opened.
fn respond_to<I: MissionInstant>(
    state: &mut SharedState<I>,
    action: SteeringAction,
    now: I,
) -> Option<MotorCommand> {
    let command = match action {
        SteeringAction::OnJunction => {
            let command = motion::apply(action, &state.line, &mut state.runtime, now);
            state.runtime.halt();
            state.events.record(MissionEvent::JunctionReached, now);
            match state.mission.mode {
                MissionMode::Outbound => state.begin_manipulation(now),
                MissionMode::Returning => state.complete_mission(now),
                _ => {}
            }
            command
        }
        SteeringAction::LineLost => {
            if !state.runtime.line_lost {
                state.runtime.line_lost = true;
                state.runtime.line_lost_since = Some(now);
                state.events.record(MissionEvent::LineLost, now);
                return None;
            }
            let expired = state
                .lost_for(now)
                .is_some_and(|elapsed| elapsed >= state.line.grace_period);
            if expired {
                MotorCommand::StopAll
            } else {
                motion::apply(action, &state.line, &mut state.runtime, now)
            }
        }
        // Ambiguous reading: keep any open lost window so the pivot can run.
        SteeringAction::Searching => motion::apply(action, &state.line, &mut state.runtime, now),
        _ => {
            if state.runtime.line_lost {
                state.runtime.clear_lost();
                state.events.record(MissionEvent::LineReacquired, now);
            }
            motion::apply(action, &state.line, &mut state.runtime, now)
        }
    };
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    use crate::decision::TurnSide;
    use crate::mission::{MissionStage, STATUS_DONE, STATUS_MANIPULATING};
    use crate::ports::Duty;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Ms(u64);

    impl MissionInstant for Ms {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    const JUNCTION: SensorSnapshot = SensorSnapshot::from_levels([1, 1, 1, 1, 1]);
    const LOST: SensorSnapshot = SensorSnapshot::from_levels([0, 0, 0, 0, 0]);
    const CENTERED: SensorSnapshot = SensorSnapshot::from_levels([0, 0, 1, 0, 0]);

    fn running_state(mode: MissionMode) -> SharedState<Ms> {
        let mut state = SharedState::new();
        state.set_mode(mode, "test", Ms(0));
        state.runtime.resume();
        state
    }

    #[test]
    fn idle_tick_only_records_sensors() {
        let mut state = SharedState::<Ms>::new();
        assert!(tick(&mut state, CENTERED, Ms(0)).is_none());
        assert_eq!(state.sensors, CENTERED);
    }

    #[test]
    fn outbound_junction_starts_manipulation() {
        let mut state = running_state(MissionMode::Outbound);
        let plan = tick(&mut state, JUNCTION, Ms(500)).expect("stop plan");

        assert_eq!(plan.motor_commands(), &[MotorCommand::StopAll]);
        assert!(!state.runtime.running);
        assert_eq!(state.mission.mode, MissionMode::ArmSeq);
        assert_eq!(state.mission.stage, MissionStage::BaseToFirstSide);
        assert_eq!(state.mission.stage_started_at, Some(Ms(500)));
        assert_eq!(state.mission.status, STATUS_MANIPULATING);
    }

    #[test]
    fn returning_junction_completes_mission() {
        let mut state = running_state(MissionMode::Returning);
        tick(&mut state, JUNCTION, Ms(500));
        assert_eq!(state.mission.mode, MissionMode::Done);
        assert_eq!(state.mission.status, STATUS_DONE);
    }

    #[test]
    fn first_lost_tick_only_opens_the_window() {
        let mut state = running_state(MissionMode::Outbound);
        assert!(tick(&mut state, LOST, Ms(100)).is_none());
        assert!(state.runtime.line_lost);
        assert_eq!(state.runtime.line_lost_since, Some(Ms(100)));
    }

    #[test]
    fn lost_beyond_grace_stops_without_resetting_intensity() {
        let mut state = running_state(MissionMode::Outbound);
        tick(&mut state, LOST, Ms(0));
        tick(&mut state, LOST, Ms(50));
        let escalated = state.runtime.search_intensity;

        let plan = tick(&mut state, LOST, Ms(800)).expect("stop plan");
        assert_eq!(plan.motor_commands(), &[MotorCommand::StopAll]);
        assert!(state.runtime.search_intensity > 1.0);
        assert!(state.runtime.search_intensity <= escalated);
    }

    #[test]
    fn reacquiring_the_line_clears_the_window() {
        let mut state = running_state(MissionMode::Outbound);
        tick(&mut state, LOST, Ms(0));
        tick(&mut state, LOST, Ms(50));
        tick(&mut state, CENTERED, Ms(100));

        assert!(!state.runtime.line_lost);
        assert_eq!(state.runtime.line_lost_since, None);
        assert!(state.runtime.search_intensity <= 1.0);
    }

    #[test]
    fn searching_inside_the_lost_window_pivots() {
        let mut state = running_state(MissionMode::Outbound);
        tick(&mut state, SensorSnapshot::from_levels([1, 0, 0, 0, 0]), Ms(0));
        tick(&mut state, LOST, Ms(10));

        let command = respond_to(&mut state, SteeringAction::Searching, Ms(40));

        // 30 * 0.4 at intensity 1.0.
        assert_eq!(
            command,
            Some(MotorCommand::pivot(TurnSide::Right, Duty::new(12)))
        );
        assert!(state.runtime.line_lost);
        assert_eq!(state.runtime.line_lost_since, Some(Ms(10)));
    }
}
