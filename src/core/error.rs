//! Error types for greenrt
//!
//! Two distinct failure channels exist and must not be conflated:
//!
//! - [`RtError`] / [`RtResult`]: recoverable or reportable API outcomes,
//!   returned as ordinary `Result` values.
//! - [`fatal`]: a diverging control transfer for invariant violations and
//!   resource exhaustion. There is no swap or backing store to degrade
//!   into, so these report and halt; they are never retried.

/// Runtime error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RtError {
    // ============ Scheduler state errors ============
    /// Scheduler is already running
    AlreadyRunning = 1001,
    /// No task was ever spawned
    NoTasks = 1002,

    // ============ Run loop outcomes ============
    /// Live parked tasks remain but nothing can ever wake them:
    /// the timer queue is empty and no external wakeup source was
    /// declared via `Scheduler::expect_external_wakeups`
    Deadlock = 1101,

    // ============ Timer errors ============
    /// Periodic timer with a non-positive period
    InvalidPeriod = 1201,
    /// Timer node is already linked into a queue
    TimerQueued = 1202,
}

/// Result type alias for runtime operations
pub type RtResult<T> = Result<T, RtError>;

/// Report a fatal runtime error and halt
///
/// Used for programming errors (switching into a Dead task, waking a Dead
/// task, corrupted queue linkage) and for resource exhaustion (task pool or
/// stack space). Deliberately distinct from [`RtError`]: callers of the
/// runtime never observe these as values.
#[inline(never)]
#[cold]
pub fn fatal(msg: &'static str) -> ! {
    crate::error!("fatal runtime error: {}", msg);
    panic!("fatal runtime error: {}", msg);
}
