//! Embassy clock adapter for the mission logic.

use embassy_time::{Duration as EmbassyDuration, Instant};
use rover_core::{MissionInstant, TICK_PERIOD};

/// Monotonic instant backed by the embassy time driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RoverInstant(Instant);

impl RoverInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(Instant::from_millis(millis))
    }
}

impl From<Instant> for RoverInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl MissionInstant for RoverInstant {
    fn saturating_duration_since(&self, earlier: Self) -> core::time::Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        core::time::Duration::from_micros(elapsed.as_micros())
    }
}

/// [`TICK_PERIOD`] expressed in embassy ticks.
pub fn tick_period() -> EmbassyDuration {
    let micros = u64::try_from(TICK_PERIOD.as_micros()).unwrap_or(u64::MAX);
    EmbassyDuration::from_micros(micros)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_time_saturates_at_zero() {
        let early = RoverInstant::from_millis(100);
        let late = RoverInstant::from_millis(350);
        assert_eq!(
            late.saturating_duration_since(early),
            core::time::Duration::from_millis(250)
        );
        assert_eq!(
            early.saturating_duration_since(late),
            core::time::Duration::ZERO
        );
    }

    #[test]
    fn tick_period_matches_core_cadence() {
        assert_eq!(tick_period().as_millis(), 50);
    }
}
