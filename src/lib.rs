//! Cooperative green-thread runtime for embedded language runtimes
//!
//! A strictly cooperative, single-core task runtime providing:
//! - Lightweight task creation over fixed-size stacks
//! - Per-architecture stack-switch primitives (Cortex-M, x86-64)
//! - FIFO cooperative scheduling with park/wake
//! - Deadline-ordered timers and phase-stable tickers
//! - Conservative stack scanning hooks for a garbage collector
//!
//! There is no preemption: a task runs until it yields, parks, sleeps
//! or returns. Interrupt handlers may wake tasks and advance the clock,
//! but never run task code themselves.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod port;

// ============ Re-exports ============

pub use crate::core::clock;
pub use crate::core::clock::{Clock, ManualClock};
pub use crate::core::config;
pub use crate::core::config::*;
pub use crate::core::critical;
pub use crate::core::error;
pub use crate::core::error::{RtError, RtResult};
pub use crate::core::gc;
pub use crate::core::gc::RootScanner;
pub use crate::core::sched;
pub use crate::core::sched::{Scheduler, TaskRef};
pub use crate::core::task;
pub use crate::core::task::TaskFn;
pub use crate::core::timer;
pub use crate::core::timer::{TimerCallback, TimerNode, TimerQueue};
pub use crate::core::types;
pub use crate::core::types::*;
