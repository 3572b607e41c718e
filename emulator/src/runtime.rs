//! Host-side executors wrapped around the shared mission state.
//!
//! Each entry point takes the state lock only long enough to run the core
//! decision, then dispatches the resulting plan through the actuator gate
//! with the lock released.

use parking_lot::Mutex;
use rover_core::control::{self, StatusSnapshot};
use rover_core::gate::{ActuationPlan, ActuatorGate, DispatchOutcome};
use rover_core::ports::{PortFault, SensorPort};
use rover_core::state::SharedState;
use rover_core::telemetry::{EventId, MissionEvent};
use rover_core::{line_follow, mission};
use tracing::{debug, error, info, warn};

use crate::assets::EmulatorAssets;
use crate::error::EmulatorError;
use crate::sim::{SharedWorld, SimArm, SimInstant, SimMotors, SimSensors, WorldView};

/// Everything the status panel shows, captured at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelView {
    pub status: StatusSnapshot,
    pub world: WorldView,
    pub fault_total: u32,
    pub last_fault: Option<PortFault>,
}

pub struct Runtime {
    state: Mutex<SharedState<SimInstant>>,
    gate: Mutex<ActuatorGate<SimMotors, SimArm>>,
    sensors: Mutex<SimSensors>,
    world: SharedWorld,
    event_cursor: Mutex<EventId>,
}

impl Runtime {
    #[must_use]
    pub fn new(world: SharedWorld) -> Self {
        Self {
            state: Mutex::new(SharedState::new()),
            gate: Mutex::new(ActuatorGate::new(
                SimMotors::new(world.clone()),
                SimArm::new(world.clone()),
            )),
            sensors: Mutex::new(SimSensors::new(world.clone())),
            world,
            event_cursor: Mutex::new(0),
        }
    }

    /// One line-follow period: sample, decide, actuate.
    pub fn line_follow_tick(&self, now: SimInstant) {
        self.world.lock().advance_to(now);
        let sample = self.sensors.lock().sample();
        match sample {
            Ok(snapshot) => {
                let plan = line_follow::tick(&mut self.state.lock(), snapshot, now);
                if let Some(plan) = plan {
                    self.dispatch(&plan, now);
                }
            }
            Err(fault) => self.note_fault(fault, now),
        }
        self.drain_events();
    }

    /// One mission-sequencer period.
    pub fn mission_tick(&self, now: SimInstant) {
        self.world.lock().advance_to(now);
        let plan = mission::poll(&mut self.state.lock(), now);
        if let Some(plan) = plan {
            self.dispatch(&plan, now);
        }
        self.drain_events();
    }

    /// Handles one raw request and returns the full response text.
    pub fn handle_request(&self, raw: &str, now: SimInstant) -> Result<String, EmulatorError> {
        let handled = control::handle(&mut self.state.lock(), raw, now);

        match (handled.route, handled.overrides) {
            (None, _) => warn!("rejected malformed request line"),
            (Some(route), Some(summary)) if summary.skipped > 0 => warn!(
                ?route,
                applied = summary.applied,
                skipped = summary.skipped,
                "some overrides were skipped"
            ),
            (Some(route), Some(summary)) => {
                info!(?route, applied = summary.applied, "control request");
            }
            (Some(route), None) => debug!(?route, "control request"),
        }

        if let Some(plan) = &handled.plan {
            self.dispatch(plan, now);
        }
        self.drain_events();

        let mut response = String::new();
        handled.reply.write_to(&EmulatorAssets, &mut response)?;
        Ok(response)
    }

    #[must_use]
    pub fn panel_view(&self) -> PanelView {
        let (status, fault_total, last_fault) = {
            let state = self.state.lock();
            (
                StatusSnapshot::capture(&state),
                state.faults.total(),
                state.faults.last(),
            )
        };
        PanelView {
            status,
            world: self.world.lock().view(),
            fault_total,
            last_fault,
        }
    }

    fn dispatch(&self, plan: &ActuationPlan, now: SimInstant) {
        let outcome = self.gate.lock().dispatch(plan);
        match outcome {
            Ok(DispatchOutcome::Applied) => self.state.lock().record_healthy(),
            Ok(DispatchOutcome::Superseded { plan_epoch, fence }) => {
                debug!(plan_epoch, fence, "dropped superseded plan");
            }
            Err(fault) => self.note_fault(fault, now),
        }
    }

    fn note_fault(&self, fault: PortFault, now: SimInstant) {
        warn!(%fault, "port fault");
        let fail_safe = self.state.lock().record_fault(fault, now);
        if let Some(plan) = fail_safe {
            error!("fault streak tripped the fail-safe; stopping all wheels");
            if let Err(fault) = self.gate.lock().dispatch(&plan) {
                error!(%fault, "fail-safe stop was not applied");
            }
        }
    }

    /// Logs every mission event recorded since the previous drain.
    fn drain_events(&self) {
        let mut cursor = self.event_cursor.lock();
        let fresh: Vec<(EventId, MissionEvent)> = {
            let state = self.state.lock();
            let fresh = state
                .events
                .since(*cursor)
                .map(|record| (record.id, record.event))
                .collect();
            *cursor = state.events.next_id();
            fresh
        };
        drop(cursor);

        for (id, event) in fresh {
            info!(id, %event, "mission event");
        }
    }
}
