//! Task control block definition
//!
//! The TCB holds everything needed to suspend and resume a task: its saved
//! register context, state, run-queue linkage, stack bounds, and the timer
//! node used for sleeps.

use core::ptr::NonNull;

use crate::core::sched::Scheduler;
use crate::core::task::{sleep_wake_cb, TaskFn};
use crate::core::timer::TimerNode;
use crate::core::types::{ParkReason, StkWord, TaskState};
use crate::port::TaskContext;

/// Task control block
#[repr(C)]
pub struct Tcb {
    /// Saved register context; valid only while the task is not Running
    pub(crate) ctx: TaskContext,

    /// Current task state
    pub(crate) state: TaskState,
    /// Why the task is parked, if it is
    pub(crate) park_reason: ParkReason,

    // ============ Run queue links ============
    pub(crate) next_ptr: Option<NonNull<Tcb>>,
    pub(crate) prev_ptr: Option<NonNull<Tcb>>,

    // ============ Stack region ============
    /// Base (lowest address) of the stack region
    pub(crate) stk_base: *mut StkWord,
    /// Stack size in words
    pub(crate) stk_size: usize,

    // ============ Identification ============
    pub(crate) name: &'static str,

    // ============ Entry point ============
    pub(crate) entry: Option<TaskFn>,
    pub(crate) entry_arg: *mut (),

    /// Back-pointer to the owning scheduler, set at spawn
    pub(crate) sched: *const Scheduler,

    /// Timer node backing `sleep_ticks` and timeouts for this task
    pub(crate) sleep_node: TimerNode,

    /// Pool slot occupancy
    pub(crate) in_use: bool,
}

impl Tcb {
    /// Create a new, unoccupied TCB
    pub const fn new() -> Self {
        Tcb {
            ctx: TaskContext::new(),
            state: TaskState::Dead,
            park_reason: ParkReason::Nothing,
            next_ptr: None,
            prev_ptr: None,
            stk_base: core::ptr::null_mut(),
            stk_size: 0,
            name: "",
            entry: None,
            entry_arg: core::ptr::null_mut(),
            sched: core::ptr::null(),
            sleep_node: TimerNode::one_shot(0, sleep_wake_cb, core::ptr::null_mut()),
            in_use: false,
        }
    }

    /// Task name, for diagnostics
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current state
    #[inline]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// One past the highest word of the stack region
    #[inline]
    pub(crate) fn stack_top(&self) -> *mut StkWord {
        unsafe { self.stk_base.add(self.stk_size) }
    }
}

impl Default for Tcb {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for Tcb {}
unsafe impl Sync for Tcb {}
