//! Operator control surface.
//!
//! One HTTP-shaped request is handled per connection. [`handle`] runs inside
//! the platform's shared-state critical section: it parses the request line,
//! applies the requested transition and returns a self-contained [`Reply`]
//! plus an optional [`ActuationPlan`]. Both are written out after the lock has
//! been released.

pub mod grammar;
pub mod params;
pub mod status;

use core::fmt;

use heapless::Vec;

use crate::MissionInstant;
use crate::gate::ActuationPlan;
use crate::mission::{MissionMode, MissionStage, STATUS_OUTBOUND, STATUS_STOPPED_BY_USER};
use crate::motion::MotorCommand;
use crate::state::SharedState;
use crate::telemetry::{EVENT_RING_CAPACITY, EventDigest, MissionEvent, write_events_json};

pub use grammar::{QueryPair, Request, RequestError, parse_request};
pub use params::{OverrideSummary, ParameterKey, apply_overrides};
pub use status::StatusSnapshot;

/// Static operator UI resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Asset {
    Page,
    Stylesheet,
    Script,
}

impl Asset {
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Asset::Page => "text/html",
            Asset::Stylesheet => "text/css",
            Asset::Script => "application/javascript",
        }
    }
}

/// Supplies the UI payloads; each platform bundles its own.
pub trait AssetSource {
    fn body(&self, asset: Asset) -> &str;
}

/// Bare-bones UI used when a platform has nothing better to serve.
pub struct PlaceholderAssets;

impl AssetSource for PlaceholderAssets {
    fn body(&self, asset: Asset) -> &str {
        match asset {
            Asset::Page => {
                "<!DOCTYPE html><html><head><title>Rover</title></head><body>\
                 <a href=\"/?action=start\">start</a> <a href=\"/?action=stop\">stop</a> \
                 <a href=\"/sensors\">sensors</a></body></html>"
            }
            Asset::Stylesheet | Asset::Script => "",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlAction {
    Start,
    Stop,
    Update,
}

impl ControlAction {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(ControlAction::Start),
            "stop" => Some(ControlAction::Stop),
            "update" => Some(ControlAction::Update),
            _ => None,
        }
    }
}

/// Where a parsed request is dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Asset(Asset),
    Sensors,
    Events,
    Action(ControlAction),
}

/// Resolves a request to a route; anything unrecognized gets the UI page.
#[must_use]
pub fn route(request: &Request<'_>) -> Route {
    match request.path {
        "/sensors" => Route::Sensors,
        "/events" => Route::Events,
        "/style.css" => Route::Asset(Asset::Stylesheet),
        "/script.js" => Route::Asset(Asset::Script),
        _ => request
            .query_value(params::ACTION_KEY)
            .and_then(ControlAction::from_name)
            .map_or(Route::Asset(Asset::Page), Route::Action),
    }
}

/// Applies overrides, poses the arm and begins the outbound leg.
pub fn start<I: MissionInstant>(
    state: &mut SharedState<I>,
    pairs: &[QueryPair<'_>],
    now: I,
) -> (OverrideSummary, ActuationPlan) {
    let summary = apply_overrides(pairs, &mut state.line, &mut state.mission_tunables);
    state.events.record(
        MissionEvent::ControlStart {
            applied: summary.applied,
            skipped: summary.skipped,
        },
        now,
    );

    let epoch = state.advance_epoch();
    let mut plan = ActuationPlan::new(epoch);
    for command in state.mission_tunables.neutral_pose() {
        plan.push_arm(command);
    }

    state.mission.stage = MissionStage::BaseToFirstSide;
    state.mission.stage_started_at = Some(now);
    state.set_mode(MissionMode::Outbound, STATUS_OUTBOUND, now);
    state.runtime.resume();
    (summary, plan)
}

/// Halts the mission and cancels any motion computed before this call.
pub fn stop<I: MissionInstant>(state: &mut SharedState<I>, now: I) -> ActuationPlan {
    state.runtime.halt();
    state.set_mode(MissionMode::Idle, STATUS_STOPPED_BY_USER, now);
    state.events.record(MissionEvent::ControlStop, now);
    let epoch = state.advance_epoch();
    ActuationPlan::motor_only(epoch, MotorCommand::StopAll)
}

/// Applies overrides without touching mode or running state.
pub fn update<I: MissionInstant>(
    state: &mut SharedState<I>,
    pairs: &[QueryPair<'_>],
    now: I,
) -> OverrideSummary {
    let summary = apply_overrides(pairs, &mut state.line, &mut state.mission_tunables);
    state.events.record(
        MissionEvent::ControlUpdate {
            applied: summary.applied,
            skipped: summary.skipped,
        },
        now,
    );
    summary
}

/// Response payload, detached from the shared state.
#[derive(Clone, Debug, PartialEq)]
pub enum ReplyBody {
    Ok,
    BadRequest,
    Status(StatusSnapshot),
    Events(Vec<EventDigest, EVENT_RING_CAPACITY>),
    Asset(Asset),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub body: ReplyBody,
}

impl Reply {
    #[must_use]
    pub const fn new(body: ReplyBody) -> Self {
        Self { body }
    }

    #[must_use]
    pub const fn status_line(&self) -> &'static str {
        match self.body {
            ReplyBody::BadRequest => "HTTP/1.1 400 Bad Request",
            _ => "HTTP/1.1 200 OK",
        }
    }

    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match &self.body {
            ReplyBody::Ok | ReplyBody::BadRequest => "text/plain",
            ReplyBody::Status(_) | ReplyBody::Events(_) => "application/json",
            ReplyBody::Asset(asset) => asset.content_type(),
        }
    }

    /// Writes the status line and headers, including the blank separator line.
    pub fn write_head<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        write!(
            out,
            "{}\r\nContent-Type: {}\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\n\r\n",
            self.status_line(),
            self.content_type()
        )
    }

    pub fn write_body<W: fmt::Write, A: AssetSource + ?Sized>(
        &self,
        assets: &A,
        out: &mut W,
    ) -> fmt::Result {
        match &self.body {
            ReplyBody::Ok => out.write_str("OK"),
            ReplyBody::BadRequest => out.write_str("Bad Request"),
            ReplyBody::Status(snapshot) => snapshot.write_json(out),
            ReplyBody::Events(events) => write_events_json(events, out),
            ReplyBody::Asset(asset) => out.write_str(assets.body(*asset)),
        }
    }

    pub fn write_to<W: fmt::Write, A: AssetSource + ?Sized>(
        &self,
        assets: &A,
        out: &mut W,
    ) -> fmt::Result {
        self.write_head(out)?;
        self.write_body(assets, out)
    }
}

/// Outcome of one control request.
#[derive(Clone, Debug, PartialEq)]
pub struct Handled {
    pub route: Option<Route>,
    pub reply: Reply,
    /// Commands to dispatch once the lock is released.
    pub plan: Option<ActuationPlan>,
    pub overrides: Option<OverrideSummary>,
}

/// Parses and executes one raw request against the shared state.
pub fn handle<I: MissionInstant>(state: &mut SharedState<I>, raw: &str, now: I) -> Handled {
    let request = match parse_request(raw) {
        Ok(request) => request,
        Err(_) => {
            return Handled {
                route: None,
                reply: Reply::new(ReplyBody::BadRequest),
                plan: None,
                overrides: None,
            };
        }
    };

    let target = route(&request);
    let mut plan = None;
    let mut overrides = None;
    let body = match target {
        Route::Sensors => ReplyBody::Status(StatusSnapshot::capture(state)),
        Route::Events => ReplyBody::Events(state.events.digest(now)),
        Route::Asset(asset) => ReplyBody::Asset(asset),
        Route::Action(ControlAction::Start) => {
            let (summary, start_plan) = start(state, &request.query, now);
            overrides = Some(summary.with_dropped(request.dropped_pairs));
            plan = Some(start_plan);
            ReplyBody::Ok
        }
        Route::Action(ControlAction::Stop) => {
            plan = Some(stop(state, now));
            ReplyBody::Ok
        }
        Route::Action(ControlAction::Update) => {
            let summary = update(state, &request.query, now);
            overrides = Some(summary.with_dropped(request.dropped_pairs));
            ReplyBody::Ok
        }
    };

    Handled {
        route: Some(target),
        reply: Reply::new(body),
        plan,
        overrides,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    use crate::ports::{ArmChannel, Duty};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Ms(u64);

    impl MissionInstant for Ms {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    #[test]
    fn routes_follow_path_then_action() {
        let route_of = |raw: &str| route(&parse_request(raw).unwrap());
        assert_eq!(route_of("GET / HTTP/1.1"), Route::Asset(Asset::Page));
        assert_eq!(route_of("GET /sensors HTTP/1.1"), Route::Sensors);
        assert_eq!(route_of("GET /script.js HTTP/1.1"), Route::Asset(Asset::Script));
        assert_eq!(
            route_of("GET /?action=stop HTTP/1.1"),
            Route::Action(ControlAction::Stop)
        );
        assert_eq!(route_of("GET /?action=dance HTTP/1.1"), Route::Asset(Asset::Page));
    }

    #[test]
    fn start_applies_overrides_before_posing_the_arm() {
        let mut state = SharedState::<Ms>::new();
        let handled = handle(
            &mut state,
            "GET /?action=start&base_center=80&grip_open=130&speed=x HTTP/1.1\r\n\r\n",
            Ms(0),
        );

        let plan = handled.plan.expect("start plan");
        let arm = plan.arm_commands();
        assert_eq!(arm[0].channel, ArmChannel::Base);
        assert_eq!(arm[0].angle.degrees(), 80);
        assert_eq!(arm[1].angle.degrees(), 100);
        assert_eq!(arm[2].angle.degrees(), 130);
        assert!(plan.motor_commands().is_empty());

        assert_eq!(state.mission.mode, MissionMode::Outbound);
        assert_eq!(state.mission.status, STATUS_OUTBOUND);
        assert!(state.runtime.running);
        assert_eq!(
            handled.overrides,
            Some(OverrideSummary {
                applied: 2,
                skipped: 1,
                ignored: 0
            })
        );
    }

    #[test]
    fn stop_bumps_epoch_and_stops_wheels() {
        let mut state = SharedState::<Ms>::new();
        handle(&mut state, "GET /?action=start HTTP/1.1", Ms(0));
        let epoch_after_start = state.epoch();

        let handled = handle(&mut state, "GET /?action=stop HTTP/1.1", Ms(100));
        let plan = handled.plan.expect("stop plan");
        assert_eq!(plan.epoch(), epoch_after_start + 1);
        assert_eq!(plan.motor_commands(), &[MotorCommand::StopAll]);
        assert_eq!(state.mission.mode, MissionMode::Idle);
        assert!(!state.runtime.running);
    }

    #[test]
    fn update_leaves_mode_alone() {
        let mut state = SharedState::<Ms>::new();
        let handled = handle(
            &mut state,
            "GET /?action=update&rotate_speed=55 HTTP/1.1",
            Ms(0),
        );
        assert!(handled.plan.is_none());
        assert_eq!(state.mission.mode, MissionMode::Idle);
        assert_eq!(state.mission_tunables.rotate_speed, Duty::new(55));
    }

    #[test]
    fn replies_carry_cors_and_close_headers() {
        let mut state = SharedState::<Ms>::new();
        let handled = handle(&mut state, "GET /?action=update HTTP/1.1", Ms(0));

        let mut out: heapless::String<256> = heapless::String::new();
        handled.reply.write_to(&PlaceholderAssets, &mut out).unwrap();
        assert_eq!(
            out.as_str(),
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\
             Access-Control-Allow-Origin: *\r\nConnection: close\r\n\r\nOK"
        );
    }

    #[test]
    fn unparseable_request_is_rejected() {
        let mut state = SharedState::<Ms>::new();
        let handled = handle(&mut state, "\r\n", Ms(0));
        assert_eq!(handled.route, None);
        assert_eq!(handled.reply.status_line(), "HTTP/1.1 400 Bad Request");
    }
}
