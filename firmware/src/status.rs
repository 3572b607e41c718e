//! Link and fault counters shared between tasks.
//!
//! Plain atomics so the control task can report them without entering the
//! shared-state critical section.

use portable_atomic::{AtomicU32, Ordering};

static REQUESTS_SERVED: AtomicU32 = AtomicU32::new(0);
static LINK_ERRORS: AtomicU32 = AtomicU32::new(0);
static SUPERSEDED_PLANS: AtomicU32 = AtomicU32::new(0);

/// Counter values captured at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkCounters {
    pub requests_served: u32,
    pub link_errors: u32,
    pub superseded_plans: u32,
}

pub fn record_request() {
    REQUESTS_SERVED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_link_error() {
    LINK_ERRORS.fetch_add(1, Ordering::Relaxed);
}

/// Counts a plan the actuator gate dropped because a newer epoch had been applied.
pub fn record_superseded() {
    SUPERSEDED_PLANS.fetch_add(1, Ordering::Relaxed);
}

pub fn counters() -> LinkCounters {
    LinkCounters {
        requests_served: REQUESTS_SERVED.load(Ordering::Relaxed),
        link_errors: LINK_ERRORS.load(Ordering::Relaxed),
        superseded_plans: SUPERSEDED_PLANS.load(Ordering::Relaxed),
    }
}
