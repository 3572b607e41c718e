//! Mission event log shared by firmware and host targets.
//!
//! Every mode change, stage entry, junction, line loss and control action is
//! appended to a fixed-capacity ring so the platforms can drain it into their
//! log sinks and the control surface can expose the recent history.

use core::fmt;
use core::time::Duration;

use heapless::{HistoryBuf, Vec};

use crate::MissionInstant;
use crate::mission::{MissionMode, MissionStage};
use crate::ports::PortFault;

/// Monotonic identifier assigned to each recorded event.
pub type EventId = u32;

/// Total number of events retained in memory.
pub const EVENT_RING_CAPACITY: usize = 32;

/// Discriminated mission events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissionEvent {
    ModeChanged(MissionMode),
    StageEntered(MissionStage),
    JunctionReached,
    LineLost,
    LineReacquired,
    ControlStart { applied: u8, skipped: u8 },
    ControlStop,
    ControlUpdate { applied: u8, skipped: u8 },
    PortFault(PortFault),
    FailSafe,
}

impl fmt::Display for MissionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissionEvent::ModeChanged(mode) => write!(f, "mode-changed {}", mode.name()),
            MissionEvent::StageEntered(stage) => write!(f, "stage-entered {}", stage.index()),
            MissionEvent::JunctionReached => f.write_str("junction-reached"),
            MissionEvent::LineLost => f.write_str("line-lost"),
            MissionEvent::LineReacquired => f.write_str("line-reacquired"),
            MissionEvent::ControlStart { applied, skipped } => {
                write!(f, "control-start applied={applied} skipped={skipped}")
            }
            MissionEvent::ControlStop => f.write_str("control-stop"),
            MissionEvent::ControlUpdate { applied, skipped } => {
                write!(f, "control-update applied={applied} skipped={skipped}")
            }
            MissionEvent::PortFault(fault) => write!(f, "port-fault {fault}"),
            MissionEvent::FailSafe => f.write_str("fail-safe"),
        }
    }
}

/// Event stored in the ring buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant> {
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: MissionEvent,
}

/// Copy of a record with its age resolved against a reference instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventDigest {
    pub id: EventId,
    pub age: Duration,
    pub event: MissionEvent,
}

/// Records mission events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = EVENT_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: MissionInstant,
{
    /// Creates a recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    pub fn record(&mut self, event: MissionEvent, timestamp: TInstant) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
        });
        id
    }

    /// Iterates the retained records in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Records with an id at or after `cursor`, oldest first.
    ///
    /// Platforms keep the cursor between drains so every event is logged once.
    pub fn since(&self, cursor: EventId) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        self.oldest_first().filter(move |record| record.id >= cursor)
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Identifier the next recorded event will receive.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Copies the history out with ages measured from `now`.
    #[must_use]
    pub fn digest(&self, now: TInstant) -> Vec<EventDigest, CAPACITY> {
        let mut digest = Vec::new();
        for record in self.oldest_first() {
            // Capacity matches the ring, so the push cannot fail.
            let _ = digest.push(EventDigest {
                id: record.id,
                age: now.saturating_duration_since(record.timestamp),
                event: record.event,
            });
        }
        digest
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: MissionInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Renders a digest as a JSON array.
pub fn write_events_json<W: fmt::Write>(events: &[EventDigest], out: &mut W) -> fmt::Result {
    out.write_char('[')?;
    for (index, entry) in events.iter().enumerate() {
        if index > 0 {
            out.write_char(',')?;
        }
        write!(
            out,
            "{{\"id\":{},\"age_ms\":{},\"event\":\"{}\"}}",
            entry.id,
            entry.age.as_millis(),
            entry.event
        )?;
    }
    out.write_char(']')
}
