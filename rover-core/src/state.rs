//! The single mutable record shared by every executor.
//!
//! Platforms wrap one [`SharedState`] in their mutex of choice. All
//! read-modify-write sequences happen through `&mut SharedState` inside that
//! critical section; nothing here performs I/O, so a lock is never held
//! across an actuation call.

use core::time::Duration;

use crate::MissionInstant;
use crate::decision::{SensorSnapshot, SteeringAction};
use crate::gate::ActuationPlan;
use crate::mission::{
    MissionMode, MissionStage, MissionTunables, STATUS_DONE, STATUS_FAULT, STATUS_MANIPULATING,
    STATUS_RETURNING, STATUS_STOPPED,
};
use crate::motion::{LineFollowRuntime, LineFollowTunables, MotorCommand};
use crate::ports::PortFault;
use crate::telemetry::{MissionEvent, TelemetryRecorder};

/// Consecutive port faults that trip the fail-safe.
pub const FAULT_TRIP_THRESHOLD: u8 = 3;

/// Mission progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MissionState<I> {
    pub mode: MissionMode,
    pub stage: MissionStage,
    pub stage_started_at: Option<I>,
    pub status: &'static str,
}

impl<I> MissionState<I> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: MissionMode::Idle,
            stage: MissionStage::BaseToFirstSide,
            stage_started_at: None,
            status: STATUS_STOPPED,
        }
    }
}

impl<I> Default for MissionState<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks consecutive actuation and sensing failures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaultMonitor {
    consecutive: u8,
    total: u32,
    last: Option<PortFault>,
}

impl FaultMonitor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            consecutive: 0,
            total: 0,
            last: None,
        }
    }

    #[must_use]
    pub const fn consecutive(&self) -> u8 {
        self.consecutive
    }

    #[must_use]
    pub const fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub const fn last(&self) -> Option<PortFault> {
        self.last
    }
}

/// Tunables, mission progress and line-follow runtime behind one lock.
pub struct SharedState<I> {
    pub line: LineFollowTunables,
    pub mission_tunables: MissionTunables,
    pub mission: MissionState<I>,
    pub runtime: LineFollowRuntime<I>,
    /// Most recent sensor sample, refreshed every line-follow tick.
    pub sensors: SensorSnapshot,
    pub last_action: SteeringAction,
    pub faults: FaultMonitor,
    pub events: TelemetryRecorder<I>,
    epoch: u32,
}

impl<I: MissionInstant> SharedState<I> {
    /// Power-up state: idle, default tunables, empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            line: LineFollowTunables::DEFAULT,
            mission_tunables: MissionTunables::DEFAULT,
            mission: MissionState::new(),
            runtime: LineFollowRuntime::new(),
            sensors: SensorSnapshot::new([false; 5]),
            last_action: SteeringAction::Forward,
            faults: FaultMonitor::new(),
            events: TelemetryRecorder::new(),
            epoch: 0,
        }
    }

    /// Actuation generation; bumped whenever control cancels in-flight motion.
    #[must_use]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Starts a new actuation generation and returns it.
    pub fn advance_epoch(&mut self) -> u32 {
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    /// Empty plan stamped with the current epoch.
    #[must_use]
    pub const fn plan(&self) -> ActuationPlan {
        ActuationPlan::new(self.epoch)
    }

    /// Switches mode and status text, logging the change.
    pub fn set_mode(&mut self, mode: MissionMode, status: &'static str, now: I) {
        self.mission.status = status;
        if self.mission.mode != mode {
            self.mission.mode = mode;
            self.events.record(MissionEvent::ModeChanged(mode), now);
        }
    }

    pub fn enter_stage(&mut self, stage: MissionStage, now: I) {
        self.mission.stage = stage;
        self.mission.stage_started_at = Some(now);
        self.events.record(MissionEvent::StageEntered(stage), now);
    }

    /// Junction reached on the outbound leg: start the manipulation.
    pub fn begin_manipulation(&mut self, now: I) {
        self.set_mode(MissionMode::ArmSeq, STATUS_MANIPULATING, now);
        self.enter_stage(MissionStage::BaseToFirstSide, now);
    }

    /// Manipulation finished: hand control back to line following.
    pub fn begin_return(&mut self, now: I) {
        self.set_mode(MissionMode::Returning, STATUS_RETURNING, now);
        self.runtime.resume();
    }

    /// Junction reached on the return leg.
    pub fn complete_mission(&mut self, now: I) {
        self.set_mode(MissionMode::Done, STATUS_DONE, now);
    }

    /// Elapsed time since the line was first reported lost.
    #[must_use]
    pub fn lost_for(&self, now: I) -> Option<Duration> {
        self.runtime
            .line_lost_since
            .map(|since| now.saturating_duration_since(since))
    }

    /// Notes a port fault and trips the fail-safe once faults persist.
    ///
    /// Returns the all-stop plan when the fail-safe trips.
    pub fn record_fault(&mut self, fault: PortFault, now: I) -> Option<ActuationPlan> {
        self.faults.consecutive = self.faults.consecutive.saturating_add(1);
        self.faults.total = self.faults.total.saturating_add(1);
        self.faults.last = Some(fault);
        self.events.record(MissionEvent::PortFault(fault), now);

        if self.faults.consecutive != FAULT_TRIP_THRESHOLD {
            return None;
        }

        self.runtime.halt();
        self.set_mode(MissionMode::Idle, STATUS_FAULT, now);
        self.events.record(MissionEvent::FailSafe, now);
        let epoch = self.advance_epoch();
        Some(ActuationPlan::motor_only(epoch, MotorCommand::StopAll))
    }

    /// Clears the consecutive-fault streak after a successful dispatch.
    pub fn record_healthy(&mut self) {
        self.faults.consecutive = 0;
    }
}

impl<I: MissionInstant> Default for SharedState<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortFaultKind, PortId, Wheel};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Ms(u64);

    impl MissionInstant for Ms {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    const FAULT: PortFault = PortFault::new(PortId::Motor(Wheel::LeftFront), PortFaultKind::Rejected);

    #[test]
    fn fail_safe_trips_on_third_consecutive_fault() {
        let mut state = SharedState::<Ms>::new();
        state.set_mode(MissionMode::Outbound, "Going to end marker", Ms(0));
        state.runtime.resume();

        assert!(state.record_fault(FAULT, Ms(10)).is_none());
        assert!(state.record_fault(FAULT, Ms(20)).is_none());
        let plan = state.record_fault(FAULT, Ms(30)).expect("fail-safe plan");

        assert_eq!(plan.motor_commands(), &[MotorCommand::StopAll]);
        assert_eq!(plan.epoch(), 1);
        assert_eq!(state.mission.mode, MissionMode::Idle);
        assert_eq!(state.mission.status, STATUS_FAULT);
        assert!(!state.runtime.running);
    }

    #[test]
    fn healthy_dispatch_resets_the_streak() {
        let mut state = SharedState::<Ms>::new();
        state.record_fault(FAULT, Ms(0));
        state.record_fault(FAULT, Ms(1));
        state.record_healthy();
        assert!(state.record_fault(FAULT, Ms(2)).is_none());
        assert_eq!(state.faults.total(), 3);
        assert_eq!(state.faults.consecutive(), 1);
    }
}
