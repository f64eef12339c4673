//! Clock collaborator and tick conversion
//!
//! The runtime never reads hardware time itself: a [`Clock`] supplies
//! monotonic nanoseconds, and only that monotonic value feeds the timer
//! queue (converted to ticks). Wall-clock reconciliation is the
//! collaborator's problem.

use portable_atomic::{AtomicI64, Ordering};

use crate::core::config::CFG_NANOS_PER_TICK;
use crate::core::types::Tick;

/// Monotonic time source
pub trait Clock: Sync {
    /// Monotonic nanoseconds since an arbitrary origin. Must never go
    /// backwards; callable from interrupt context.
    fn nanotime(&self) -> i64;

    /// Wall-clock seconds, nanoseconds within the second, and the
    /// monotonic reading taken at the same instant. Only `mono` is ever
    /// consumed by the scheduler.
    fn now(&self) -> (i64, i32, i64) {
        let mono = self.nanotime();
        (mono / 1_000_000_000, (mono % 1_000_000_000) as i32, mono)
    }
}

/// Convert monotonic nanoseconds to ticks
#[inline]
pub fn ticks_from_nanos(ns: i64) -> Tick {
    ns / CFG_NANOS_PER_TICK
}

/// Convert ticks back to nanoseconds, saturating
#[inline]
pub fn nanos_from_ticks(ticks: Tick) -> i64 {
    ticks.saturating_mul(CFG_NANOS_PER_TICK)
}

/// An externally driven clock
///
/// Holds the monotonic count in an atomic so a tick interrupt can advance
/// it with `advance` while tasks read it. Also the clock used by the host
/// tests, where the test body plays the role of the tick ISR.
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    pub const fn new() -> Self {
        Self { nanos: AtomicI64::new(0) }
    }

    /// Advance the clock, saturating at `i64::MAX`
    ///
    /// A single atomic update, so concurrent advances (tick ISR plus a
    /// test thread) never lose an increment.
    pub fn advance(&self, ns: i64) {
        let _ = self
            .nanos
            .fetch_update(Ordering::Release, Ordering::Relaxed, |cur| {
                Some(cur.saturating_add(ns))
            });
    }

    /// Set the absolute monotonic count; must not move backwards
    pub fn set(&self, ns: i64) {
        self.nanos.store(ns, Ordering::Release);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn nanotime(&self) -> i64 {
        self.nanos.load(Ordering::Acquire)
    }
}
