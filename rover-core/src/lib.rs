#![no_std]

//! Platform-neutral mission logic for the line-following rover.
//!
//! Everything in this crate is free of I/O: hardware is reached through the
//! traits in [`ports`], time through [`MissionInstant`], and every decision
//! yields an [`gate::ActuationPlan`] that the platform dispatches once its
//! shared-state lock has been released.

pub mod control;
pub mod decision;
pub mod gate;
pub mod line_follow;
pub mod mission;
pub mod motion;
pub mod ports;
pub mod state;
pub mod telemetry;

use core::time::Duration;

/// Cadence shared by the line-follow and mission tasks.
pub const TICK_PERIOD: Duration = Duration::from_millis(50);

/// Monotonic instant supplied by the platform clock.
pub trait MissionInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}
