use embassy_time::Ticker;
use rover_core::mission;

use super::{EVENT_CURSOR, GateCell, SHARED, dispatch};
use crate::instant::{RoverInstant, tick_period};
use crate::shared::{drain_events, with_state};

/// Advances the manipulation sequence; runs alongside the line follower.
#[embassy_executor::task]
pub async fn run(gate: &'static GateCell) -> ! {
    let mut ticker = Ticker::every(tick_period());

    loop {
        ticker.next().await;
        let now = RoverInstant::now();

        if let Some(plan) = with_state(&SHARED, |state| mission::poll(state, now)) {
            dispatch(gate, &plan, now);
        }
        drain_events(&SHARED, &EVENT_CURSOR);
    }
}
