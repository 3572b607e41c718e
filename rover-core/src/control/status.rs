//! Telemetry snapshot served at `/sensors`.
//!
//! [`StatusSnapshot::capture`] copies what it needs out of the shared state so
//! the JSON can be rendered after the lock is released.

use core::fmt;

use super::params::ParameterKey;
use crate::MissionInstant;
use crate::decision::{SENSOR_COUNT, SteeringAction, classify};
use crate::mission::{MissionMode, MissionStage, MissionTunables};
use crate::motion::LineFollowTunables;
use crate::state::SharedState;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub sensors: [u8; SENSOR_COUNT],
    /// `None` while line following is not running.
    pub action: Option<SteeringAction>,
    pub running: bool,
    pub mission_status: &'static str,
    pub mode: MissionMode,
    pub stage: MissionStage,
    pub line: LineFollowTunables,
    pub mission: MissionTunables,
}

impl StatusSnapshot {
    #[must_use]
    pub fn capture<I: MissionInstant>(state: &SharedState<I>) -> Self {
        let running = state.runtime.running;
        Self {
            sensors: state.sensors.levels(),
            action: running.then(|| classify(&state.sensors)),
            running,
            mission_status: state.mission.status,
            mode: state.mission.mode,
            stage: state.mission.stage,
            line: state.line,
            mission: state.mission_tunables,
        }
    }

    /// Label for the `action` field.
    #[must_use]
    pub fn action_label(&self) -> &'static str {
        self.action.map_or("-", SteeringAction::label)
    }

    pub fn write_json<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        out.write_str("{\"sensors\":[")?;
        for (index, level) in self.sensors.iter().enumerate() {
            if index > 0 {
                out.write_char(',')?;
            }
            write!(out, "{level}")?;
        }
        write!(
            out,
            "],\"action\":\"{}\",\"status\":\"{}\",\"mission\":\"{}\",\"mode\":\"{}\",\"stage\":{},\"params\":{{",
            self.action_label(),
            if self.running { "Running" } else { "Stopped" },
            self.mission_status,
            self.mode.name(),
            self.stage.index(),
        )?;
        for (index, key) in ParameterKey::ALL.into_iter().enumerate() {
            if index > 0 {
                out.write_char(',')?;
            }
            write!(out, "\"{}\":", key.name())?;
            self.write_param(key, out)?;
        }
        out.write_str("}}")
    }

    fn write_param<W: fmt::Write>(&self, key: ParameterKey, out: &mut W) -> fmt::Result {
        let line = &self.line;
        let mission = &self.mission;
        match key {
            ParameterKey::Speed => write!(out, "{}", line.base_speed),
            ParameterKey::Slight => write!(out, "{}", line.slight_ratio),
            ParameterKey::Mild => write!(out, "{}", line.mild_ratio),
            ParameterKey::Hard => write!(out, "{}", line.hard_ratio),
            ParameterKey::Grace => write!(out, "{}", line.grace_period.as_millis()),
            ParameterKey::Search => write!(out, "{}", line.search_ratio),
            ParameterKey::BaseCenter => write!(out, "{}", mission.base_center.degrees()),
            ParameterKey::BaseOffset => write!(out, "{}", mission.base_offset.degrees()),
            ParameterKey::FirstSide => write!(out, "\"{}\"", mission.first_side),
            ParameterKey::ArmTransport => write!(out, "{}", mission.arm_transport.degrees()),
            ParameterKey::ArmDown => write!(out, "{}", mission.arm_down.degrees()),
            ParameterKey::GripOpen => write!(out, "{}", mission.grip_open.degrees()),
            ParameterKey::GripClose => write!(out, "{}", mission.grip_close.degrees()),
            ParameterKey::ServoSettle => write!(out, "{}", mission.servo_settle.as_millis()),
            ParameterKey::ReverseSpeed => write!(out, "{}", mission.reverse_speed.percent()),
            ParameterKey::ReverseTime => write!(out, "{}", mission.reverse_time.as_millis()),
            ParameterKey::RotateDir => write!(out, "\"{}\"", mission.rotate_dir),
            ParameterKey::RotateSpeed => write!(out, "{}", mission.rotate_speed.percent()),
            ParameterKey::RotateTime => write!(out, "{}", mission.rotate_time.as_millis()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    use crate::decision::SensorSnapshot;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Ms(u64);

    impl MissionInstant for Ms {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    #[test]
    fn idle_snapshot_renders_defaults() {
        let mut state = SharedState::<Ms>::new();
        state.sensors = SensorSnapshot::from_levels([0, 1, 1, 0, 0]);

        let mut out: heapless::String<768> = heapless::String::new();
        StatusSnapshot::capture(&state).write_json(&mut out).unwrap();

        assert_eq!(
            out.as_str(),
            "{\"sensors\":[0,1,1,0,0],\"action\":\"-\",\"status\":\"Stopped\",\
             \"mission\":\"Stopped\",\"mode\":\"IDLE\",\"stage\":0,\"params\":{\
             \"speed\":30,\"slight\":0.9,\"mild\":0.75,\"hard\":0.6,\"grace\":800,\
             \"search\":0.4,\"base_center\":90,\"base_offset\":45,\"first_side\":\"left\",\
             \"arm_transport\":100,\"arm_down\":70,\"grip_open\":120,\"grip_close\":60,\
             \"servo_settle\":600,\"reverse_speed\":35,\"reverse_time\":600,\
             \"rotate_dir\":\"left\",\"rotate_speed\":40,\"rotate_time\":1000}}"
        );
    }

    #[test]
    fn running_snapshot_reports_live_action() {
        let mut state = SharedState::<Ms>::new();
        state.runtime.resume();
        state.sensors = SensorSnapshot::from_levels([0, 1, 1, 0, 0]);

        let snapshot = StatusSnapshot::capture(&state);
        assert_eq!(snapshot.action_label(), "SLIGHT RIGHT");
        assert!(snapshot.running);
    }
}
