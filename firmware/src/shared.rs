//! The mission state cell shared by the firmware tasks.
//!
//! Tasks run on the thread-mode executor, so a blocking mutex with a
//! `RefCell` inside is enough: every access is a short closure that never
//! awaits, and actuation happens after the closure returns.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;
use portable_atomic::{AtomicU32, Ordering};
use rover_core::MissionInstant;
use rover_core::state::SharedState;
use rover_core::telemetry::{EVENT_RING_CAPACITY, EventId, MissionEvent};

use crate::telemetry;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

#[cfg(target_os = "none")]
pub type RoverMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
pub type RoverMutex = NoopRawMutex;

pub type SharedCell<I> = Mutex<RoverMutex, RefCell<SharedState<I>>>;

/// Power-up contents of the shared cell.
pub const fn new_shared<I: MissionInstant>() -> SharedCell<I> {
    Mutex::new(RefCell::new(SharedState::new()))
}

/// Runs `f` with exclusive access to the shared state.
pub fn with_state<I, R>(cell: &SharedCell<I>, f: impl FnOnce(&mut SharedState<I>) -> R) -> R {
    cell.lock(|state| f(&mut state.borrow_mut()))
}

/// Logs the events recorded since `cursor` and advances it.
///
/// Returns the number of events logged.
pub fn drain_events<I: MissionInstant>(cell: &SharedCell<I>, cursor: &AtomicU32) -> usize {
    let fresh = with_state(cell, |state| {
        let mut fresh: Vec<(EventId, MissionEvent), EVENT_RING_CAPACITY> = Vec::new();
        for record in state.events.since(cursor.load(Ordering::Relaxed)) {
            // The ring holds at most EVENT_RING_CAPACITY records.
            let _ = fresh.push((record.id, record.event));
        }
        cursor.store(state.events.next_id(), Ordering::Relaxed);
        fresh
    });

    for (id, event) in &fresh {
        telemetry::log_event(*id, event);
    }
    fresh.len()
}

#[cfg(test)]
mod tests {
    use rover_core::control;
    use rover_core::mission::MissionMode;

    use super::*;
    use crate::instant::RoverInstant;

    #[test]
    fn drain_logs_each_event_once() {
        let cell: SharedCell<RoverInstant> = new_shared();
        let cursor = AtomicU32::new(0);

        with_state(&cell, |state| {
            control::handle(state, "GET /?action=start HTTP/1.1", RoverInstant::from_millis(0))
        });
        assert_eq!(drain_events(&cell, &cursor), 2);
        assert_eq!(drain_events(&cell, &cursor), 0);

        with_state(&cell, |state| {
            control::handle(state, "GET /?action=stop HTTP/1.1", RoverInstant::from_millis(10))
        });
        assert_eq!(drain_events(&cell, &cursor), 2);
        assert_eq!(
            with_state(&cell, |state| state.mission.mode),
            MissionMode::Idle
        );
    }
}
