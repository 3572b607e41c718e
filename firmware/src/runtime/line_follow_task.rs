use embassy_time::Ticker;
use rover_core::line_follow;
use rover_core::ports::SensorPort;

use super::{EVENT_CURSOR, GateCell, SHARED, dispatch, note_fault};
use crate::hw::LineSensors;
use crate::instant::{RoverInstant, tick_period};
use crate::shared::{drain_events, with_state};

#[embassy_executor::task]
pub async fn run(gate: &'static GateCell, mut sensors: LineSensors) -> ! {
    let mut ticker = Ticker::every(tick_period());

    loop {
        ticker.next().await;
        let now = RoverInstant::now();

        match sensors.sample() {
            Ok(snapshot) => {
                let plan = with_state(&SHARED, |state| line_follow::tick(state, snapshot, now));
                if let Some(plan) = plan {
                    dispatch(gate, &plan, now);
                }
            }
            Err(fault) => note_fault(gate, fault, now),
        }

        drain_events(&SHARED, &EVENT_CURSOR);
    }
}
