use core::time::Duration;

use rover_core::MissionInstant;
use rover_core::control::{self, ReplyBody, Route};
use rover_core::decision::SensorSnapshot;
use rover_core::gate::{ActuatorGate, DispatchOutcome};
use rover_core::line_follow;
use rover_core::mission::{MissionMode, MissionStage, STATUS_OUTBOUND, STATUS_STOPPED_BY_USER};
use rover_core::motion::MotorCommand;
use rover_core::ports::{Angle, ArmChannel, ArmPort, Duty, MotorPort, PortFault, Wheel, WheelDirection};
use rover_core::state::SharedState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MockInstant(u64);

impl MissionInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

#[derive(Default)]
struct Wheels {
    duty: [u8; 4],
    drive_calls: usize,
    stop_calls: usize,
}

impl MotorPort for Wheels {
    fn drive(&mut self, wheel: Wheel, _: WheelDirection, duty: Duty) -> Result<(), PortFault> {
        self.duty[wheel.index()] = duty.percent();
        self.drive_calls += 1;
        Ok(())
    }

    fn stop_all(&mut self) -> Result<(), PortFault> {
        self.duty = [0; 4];
        self.stop_calls += 1;
        Ok(())
    }
}

#[derive(Default)]
struct Servos {
    angles: [u8; 3],
}

impl ArmPort for Servos {
    fn set_angle(&mut self, channel: ArmChannel, angle: Angle) -> Result<(), PortFault> {
        self.angles[usize::from(channel.channel())] = angle.degrees();
        Ok(())
    }
}

const SLIGHT_RIGHT: SensorSnapshot = SensorSnapshot::from_levels([0, 1, 1, 0, 0]);
const LOST: SensorSnapshot = SensorSnapshot::from_levels([0, 0, 0, 0, 0]);
const HARD_RIGHT: SensorSnapshot = SensorSnapshot::from_levels([1, 0, 0, 0, 0]);

#[test]
fn start_from_any_mode_goes_outbound() {
    for mode in [
        MissionMode::Idle,
        MissionMode::Outbound,
        MissionMode::ArmSeq,
        MissionMode::Returning,
        MissionMode::Done,
    ] {
        let mut state = SharedState::<MockInstant>::new();
        state.set_mode(mode, "before", MockInstant(0));
        state.mission.stage = MissionStage::Rotating;

        control::handle(&mut state, "GET /?action=start HTTP/1.1", MockInstant(10));

        assert_eq!(state.mission.mode, MissionMode::Outbound);
        assert_eq!(state.mission.status, STATUS_OUTBOUND);
        assert!(state.runtime.running);
        assert!((state.runtime.search_intensity - 1.0).abs() < f64::EPSILON);
    }
}

#[test]
fn start_poses_arm_neutral() {
    let mut state = SharedState::<MockInstant>::new();
    let mut gate = ActuatorGate::new(Wheels::default(), Servos::default());

    let handled = control::handle(&mut state, "GET /?action=start HTTP/1.1", MockInstant(0));
    let plan = handled.plan.expect("start plan");
    assert_eq!(gate.dispatch(&plan), Ok(DispatchOutcome::Applied));

    assert_eq!(gate.arm().angles, [90, 100, 120]);
}

#[test]
fn stop_wins_over_in_flight_tick() {
    let mut state = SharedState::<MockInstant>::new();
    let mut gate = ActuatorGate::new(Wheels::default(), Servos::default());
    let start = control::handle(&mut state, "GET /?action=start HTTP/1.1", MockInstant(0));
    gate.dispatch(&start.plan.expect("start plan")).unwrap();

    // A tick computes its plan, then loses the race to a stop request.
    let in_flight = line_follow::tick(&mut state, SLIGHT_RIGHT, MockInstant(50)).expect("drive plan");
    let stop = control::handle(&mut state, "GET /?action=stop HTTP/1.1", MockInstant(60));
    assert_eq!(
        gate.dispatch(&stop.plan.expect("stop plan")),
        Ok(DispatchOutcome::Applied)
    );
    assert!(matches!(
        gate.dispatch(&in_flight),
        Ok(DispatchOutcome::Superseded { .. })
    ));

    assert_eq!(gate.motors().drive_calls, 0);
    assert_eq!(gate.motors().stop_calls, 1);
    assert_eq!(state.mission.mode, MissionMode::Idle);
    assert_eq!(state.mission.status, STATUS_STOPPED_BY_USER);

    // Subsequent ticks produce nothing until the next start.
    assert!(line_follow::tick(&mut state, SLIGHT_RIGHT, MockInstant(100)).is_none());
}

#[test]
fn stop_is_issued_even_when_already_stopped() {
    let mut state = SharedState::<MockInstant>::new();
    let mut gate = ActuatorGate::new(Wheels::default(), Servos::default());
    for now in [0, 10] {
        let handled = control::handle(&mut state, "GET /?action=stop HTTP/1.1", MockInstant(now));
        gate.dispatch(&handled.plan.expect("stop plan")).unwrap();
    }
    assert_eq!(gate.motors().stop_calls, 2);
}

#[test]
fn slight_right_example_drives_thirty_and_twenty_seven() {
    let mut state = SharedState::<MockInstant>::new();
    let mut gate = ActuatorGate::new(Wheels::default(), Servos::default());
    control::handle(
        &mut state,
        "GET /?action=start&speed=30&slight=0.9 HTTP/1.1",
        MockInstant(0),
    );

    let plan = line_follow::tick(&mut state, SLIGHT_RIGHT, MockInstant(50)).expect("drive plan");
    gate.dispatch(&plan).unwrap();

    assert_eq!(gate.motors().duty, [30, 30, 27, 27]);
}

#[test]
fn search_intensity_escalates_then_resets() {
    let mut state = SharedState::<MockInstant>::new();
    control::handle(&mut state, "GET /?action=start HTTP/1.1", MockInstant(0));
    line_follow::tick(&mut state, HARD_RIGHT, MockInstant(0));

    // First lost tick opens the window without escalating.
    line_follow::tick(&mut state, LOST, MockInstant(50));
    let mut previous = state.runtime.search_intensity;
    assert!((previous - 1.0).abs() < f64::EPSILON);

    for tick in 2..=6_u64 {
        let plan = line_follow::tick(&mut state, LOST, MockInstant(tick * 50)).expect("pivot plan");
        let intensity = state.runtime.search_intensity;
        assert!((intensity - previous * 1.5).abs() < 1e-9);
        assert!(matches!(plan.motor_commands()[0], MotorCommand::Drive(_)));
        previous = intensity;
    }

    line_follow::tick(&mut state, SLIGHT_RIGHT, MockInstant(400));
    assert!((state.runtime.search_intensity - 1.0).abs() < f64::EPSILON);
    assert!(!state.runtime.line_lost);
}

#[test]
fn sensors_reply_reflects_running_state() {
    let mut state = SharedState::<MockInstant>::new();
    line_follow::tick(&mut state, SLIGHT_RIGHT, MockInstant(0));

    let handled = control::handle(&mut state, "GET /sensors HTTP/1.1", MockInstant(0));
    assert_eq!(handled.route, Some(Route::Sensors));
    let ReplyBody::Status(snapshot) = handled.reply.body else {
        panic!("expected status body");
    };
    assert_eq!(snapshot.sensors, [0, 1, 1, 0, 0]);
    assert_eq!(snapshot.action_label(), "-");

    let mut json = String::new();
    snapshot.write_json(&mut json).unwrap();
    assert!(json.contains("\"status\":\"Stopped\""));
    assert!(json.contains("\"mode\":\"IDLE\""));
}

#[test]
fn events_reply_lists_control_history() {
    let mut state = SharedState::<MockInstant>::new();
    control::handle(&mut state, "GET /?action=start HTTP/1.1", MockInstant(0));
    control::handle(&mut state, "GET /?action=stop HTTP/1.1", MockInstant(250));

    let handled = control::handle(&mut state, "GET /events HTTP/1.1", MockInstant(1_000));
    let mut out = String::new();
    handled
        .reply
        .write_to(&control::PlaceholderAssets, &mut out)
        .unwrap();

    assert!(out.starts_with("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n"));
    assert!(out.contains("\"event\":\"control-start applied=0 skipped=0\""));
    assert!(out.contains("\"event\":\"mode-changed OUTBOUND\""));
    assert!(out.contains("\"age_ms\":750,\"event\":\"control-stop\""));
}

fn padded_request(leading: &str, filler: usize, trailing: &str) -> String {
    let mut line = format!("GET /?{leading}");
    for index in 0..filler {
        line.push_str(&format!("&pad{index}=1"));
    }
    line.push_str(trailing);
    line.push_str(" HTTP/1.1\r\n\r\n");
    line
}

#[test]
fn stop_with_a_long_query_still_stops() {
    let mut state = SharedState::<MockInstant>::new();
    let mut gate = ActuatorGate::new(Wheels::default(), Servos::default());
    control::handle(&mut state, "GET /?action=start HTTP/1.1", MockInstant(0));

    let raw = padded_request("action=stop", control::grammar::MAX_QUERY_PAIRS, "");
    let handled = control::handle(&mut state, &raw, MockInstant(40));

    assert_eq!(handled.route, Some(Route::Action(control::ControlAction::Stop)));
    assert_eq!(handled.reply.status_line(), "HTTP/1.1 200 OK");
    gate.dispatch(&handled.plan.expect("stop plan")).unwrap();
    assert_eq!(gate.motors().stop_calls, 1);
    assert_eq!(state.mission.mode, MissionMode::Idle);
    assert!(!state.runtime.running);
}

#[test]
fn action_past_the_pair_cap_is_still_routed() {
    let mut state = SharedState::<MockInstant>::new();
    let raw = padded_request("speed=60", 30, "&action=start");

    let handled = control::handle(&mut state, &raw, MockInstant(0));

    assert_eq!(handled.route, Some(Route::Action(control::ControlAction::Start)));
    assert_eq!(state.mission.mode, MissionMode::Outbound);
    assert_eq!(state.line.base_speed, 60);
}

#[test]
fn update_counts_pairs_past_the_cap_as_ignored() {
    let mut state = SharedState::<MockInstant>::new();
    let raw = padded_request("action=update&speed=55", 30, "&speed=10");

    let handled = control::handle(&mut state, &raw, MockInstant(0));

    // 24 kept pairs: action, speed and 22 unknown pads; 8 pads plus the
    // late speed fall past the cap.
    assert_eq!(
        handled.overrides,
        Some(control::OverrideSummary {
            applied: 1,
            skipped: 0,
            ignored: 22 + 9,
        })
    );
    assert_eq!(state.line.base_speed, 55);
    assert_eq!(state.mission.mode, MissionMode::Idle);
}
