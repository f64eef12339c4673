//! Core type definitions for greenrt
//!
//! These types provide strong typing for the runtime primitives.

/// Monotonic tick count
///
/// Ticks are derived from the clock collaborator's monotonic nanoseconds
/// (see [`crate::config::CFG_NANOS_PER_TICK`]) and are independent of any
/// wall-clock adjustment. All deadline arithmetic on ticks saturates;
/// a wrapped deadline could fire perpetually "in the past".
pub type Tick = i64;

/// Stack element type (one machine word)
pub type StkWord = usize;

/// Task state
///
/// Transitions: Runnable -> Running -> {Runnable (yield) | Parked (block) |
/// Dead (entry returned)}; Parked -> Runnable (wake). A newly spawned task
/// is Runnable; Dead is terminal and the slot is reclaimed by the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// In the run queue, waiting to be scheduled
    Runnable = 0,
    /// Currently executing; its saved context is invalid
    Running = 1,
    /// Blocked, in no queue; referenced only by its eventual waker
    Parked = 2,
    /// Entry function returned; slot awaiting reclaim
    Dead = 3,
}

/// What a parked task is waiting for
///
/// Purely diagnostic from the scheduler's point of view: the waker is
/// whatever holds the task reference (timer node, ISR, channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParkReason {
    Nothing = 0,
    /// Sleeping on the timer queue
    Timer = 1,
    /// Blocked on a channel operation
    Channel = 2,
    /// Blocked on a mutex or similar primitive
    Lock = 3,
    /// Waiting for an interrupt-delivered event
    Interrupt = 4,
}

/// Re-arm policy for periodic timers that missed more than one period
///
/// Applies when a ticker's next deadline is still in the past after one
/// `when += period` advance (the scheduler fell behind by multiple
/// periods).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchUpPolicy {
    /// Fire once, then advance the deadline by whole periods past `now`.
    /// Bounds worst-case CPU under load and keeps periods phase-stable.
    Resync,
    /// Re-queue with `when += period` each time, so every missed period
    /// eventually produces a firing.
    FireEach,
}
