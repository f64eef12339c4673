//! Deadline-ordered timer queue
//!
//! Timers and tickers live in an intrusive singly-linked list kept sorted
//! ascending by deadline, so the next event is always the head (O(1) for
//! the idle wait). Insertion is a linear walk, which is fine for the small
//! node counts typical of a firmware image.
//!
//! Firing goes through an indirect callback rather than a direct static
//! call. That keeps the timer subsystem eligible for dead-code
//! elimination: programs that never create a timer pay zero code size for
//! it. The indirection is a deliberate code-size tradeoff and should not
//! be "simplified" away.

use core::ptr::NonNull;

use crate::core::error::{RtError, RtResult};
use crate::core::types::{CatchUpPolicy, Tick};

/// Timer expiry callback
///
/// Invoked with the node and `delta = now - when` (>= 0), the lateness in
/// ticks for drift-aware callers. Runs on the scheduler stack, outside any
/// critical section; it may wake tasks or re-add timers.
///
/// # Safety
/// The node pointer is valid for the duration of the call.
pub type TimerCallback = unsafe fn(node: NonNull<TimerNode>, delta: i64);

/// A timer queue element
///
/// The node is intrusive: whoever creates it owns the memory and must keep
/// it alive while it is queued. One-shot nodes leave the queue when they
/// fire; periodic nodes (tickers) are re-queued with an advanced deadline.
pub struct TimerNode {
    pub(crate) next: Option<NonNull<TimerNode>>,
    pub(crate) queued: bool,
    when: Tick,
    period: Tick,
    callback: TimerCallback,
    /// Opaque context for the callback
    pub arg: *mut (),
}

impl TimerNode {
    /// Create a one-shot timer expiring at `when`
    pub const fn one_shot(when: Tick, callback: TimerCallback, arg: *mut ()) -> Self {
        Self {
            next: None,
            queued: false,
            when,
            period: 0,
            callback,
            arg,
        }
    }

    /// Create a periodic timer (ticker) first expiring at `when`
    pub fn periodic(
        when: Tick,
        period: Tick,
        callback: TimerCallback,
        arg: *mut (),
    ) -> RtResult<Self> {
        if period <= 0 {
            return Err(RtError::InvalidPeriod);
        }
        Ok(Self {
            next: None,
            queued: false,
            when,
            period,
            callback,
            arg,
        })
    }

    /// Absolute deadline in ticks
    #[inline]
    pub fn when(&self) -> Tick {
        self.when
    }

    /// Period in ticks, 0 for one-shot timers
    #[inline]
    pub fn period(&self) -> Tick {
        self.period
    }

    /// Whether the node is currently linked into a queue
    #[inline]
    pub fn is_queued(&self) -> bool {
        self.queued
    }

    /// Move the deadline of an unqueued node
    pub fn set_when(&mut self, when: Tick) -> RtResult<()> {
        if self.queued {
            return Err(RtError::TimerQueued);
        }
        self.when = when;
        Ok(())
    }

    /// Invoke the expiry callback
    ///
    /// # Safety
    /// `node` must point to this node and remain valid for the call.
    #[inline]
    pub(crate) unsafe fn fire(node: NonNull<TimerNode>, delta: i64) {
        let cb = unsafe { node.as_ref().callback };
        unsafe { cb(node, delta) };
    }

    /// Advance a periodic deadline after a firing
    ///
    /// Re-arming is `when += period`, never `now + period`: periods stay
    /// phase-stable even when a firing was late. If the scheduler fell
    /// behind by more than one whole period, `policy` decides whether the
    /// deadline resynchronizes past `now` (having fired once) or replays
    /// every missed period.
    pub(crate) fn advance_period(&mut self, now: Tick, policy: CatchUpPolicy) {
        debug_assert!(self.period > 0);
        self.when = self.when.saturating_add(self.period);

        if self.when <= now && policy == CatchUpPolicy::Resync {
            let missed = (now - self.when) / self.period + 1;
            self.when = self.when.saturating_add(missed.saturating_mul(self.period));
        }
    }
}

/// Deadline-ordered set of timer nodes
///
/// Sorted ascending by `when`; ties fire in insertion order.
pub struct TimerQueue {
    head: Option<NonNull<TimerNode>>,
}

impl TimerQueue {
    pub const fn new() -> Self {
        Self { head: None }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Deadline of the next event, if any
    #[inline]
    pub fn next_deadline(&self) -> Option<Tick> {
        self.head.map(|n| unsafe { n.as_ref().when })
    }

    /// Insert a node at its sorted position
    ///
    /// # Safety
    /// `node` must be valid, not already queued, and stay alive until it
    /// fires or is removed. Caller must hold the scheduler critical
    /// section.
    pub unsafe fn add(&mut self, mut node: NonNull<TimerNode>) {
        let node_ref = unsafe { node.as_mut() };
        debug_assert!(!node_ref.queued);
        let when = node_ref.when;

        // Walk to the first entry with a later deadline.
        let mut prev: Option<NonNull<TimerNode>> = None;
        let mut cur = self.head;
        while let Some(c) = cur {
            if unsafe { c.as_ref().when } > when {
                break;
            }
            prev = cur;
            cur = unsafe { c.as_ref().next };
        }

        node_ref.next = cur;
        node_ref.queued = true;
        match prev {
            Some(mut p) => unsafe { p.as_mut().next = Some(node) },
            None => self.head = Some(node),
        }
    }

    /// Unlink a node by identity
    ///
    /// Returns `false` if the node is not in this queue (it already fired
    /// or was never added); a no-op, not an error.
    ///
    /// # Safety
    /// `node` must be valid. Caller must hold the scheduler critical
    /// section.
    pub unsafe fn remove(&mut self, node: NonNull<TimerNode>) -> bool {
        if !unsafe { node.as_ref().queued } {
            return false;
        }

        let mut prev: Option<NonNull<TimerNode>> = None;
        let mut cur = self.head;
        while let Some(c) = cur {
            if c == node {
                let next = unsafe { c.as_ref().next };
                match prev {
                    Some(mut p) => unsafe { p.as_mut().next = next },
                    None => self.head = next,
                }
                let node_ref = unsafe { &mut *node.as_ptr() };
                node_ref.next = None;
                node_ref.queued = false;
                return true;
            }
            prev = cur;
            cur = unsafe { c.as_ref().next };
        }

        false
    }

    /// Pop the head if its deadline has been reached
    ///
    /// # Safety
    /// Caller must hold the scheduler critical section.
    pub unsafe fn pop_due(&mut self, now: Tick) -> Option<NonNull<TimerNode>> {
        let head = self.head?;
        if unsafe { head.as_ref().when } > now {
            return None;
        }
        let head_ref = unsafe { &mut *head.as_ptr() };
        self.head = head_ref.next;
        head_ref.next = None;
        head_ref.queued = false;
        Some(head)
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}
