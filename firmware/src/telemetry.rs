//! Log sinks for mission events and port faults.
//!
//! The core records events into its ring; the tasks drain that ring after
//! each step (see [`crate::shared::drain_events`]) and mirror every entry here:
//! defmt on the target, stdout when the crate is built for the host.

use rover_core::ports::PortFault;
use rover_core::telemetry::{EventId, MissionEvent};

pub fn log_event(id: EventId, event: &MissionEvent) {
    emit_event(id, event);
}

pub fn log_fault(fault: &PortFault) {
    emit_fault(fault);
}

/// Reports a request whose overrides were only partially applied.
pub fn log_skipped_overrides(applied: u8, skipped: u8) {
    emit_skipped(applied, skipped);
}

#[cfg(target_os = "none")]
fn emit_event(id: EventId, event: &MissionEvent) {
    defmt::info!("mission #{} {}", id, defmt::Display2Format(event));
}

#[cfg(not(target_os = "none"))]
fn emit_event(id: EventId, event: &MissionEvent) {
    println!("mission #{id} {event}");
}

#[cfg(target_os = "none")]
fn emit_fault(fault: &PortFault) {
    defmt::warn!("port fault: {}", defmt::Display2Format(fault));
}

#[cfg(not(target_os = "none"))]
fn emit_fault(fault: &PortFault) {
    println!("port fault: {fault}");
}

#[cfg(target_os = "none")]
fn emit_skipped(applied: u8, skipped: u8) {
    defmt::warn!("control: applied={} skipped={}", applied, skipped);
}

#[cfg(not(target_os = "none"))]
fn emit_skipped(applied: u8, skipped: u8) {
    println!("control: applied={applied} skipped={skipped}");
}
