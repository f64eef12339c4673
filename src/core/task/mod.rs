//! Task management
//!
//! Defines the task entry type, the fixed pool of TCBs and stacks a
//! scheduler owns, and the thunk every fresh task starts in. Stacks are
//! statically sized; there is no growth, and pool exhaustion at spawn is
//! fatal.

mod tcb;

pub use tcb::Tcb;

use core::ptr::NonNull;

use crate::core::config::{CFG_MAX_TASKS, CFG_STACK_WORDS};
use crate::core::error::fatal;
use crate::core::sched::{Scheduler, TaskRef};
use crate::core::timer::TimerNode;
use crate::core::types::StkWord;

/// Task entry point
///
/// Receives the owning scheduler and the opaque argument given to `spawn`.
/// Returning ends the task: its state becomes Dead and the run loop
/// reclaims the slot.
pub type TaskFn = fn(rt: &'static Scheduler, arg: *mut ());

/// Task stack storage, aligned for the strictest port ABI (x86-64 SysV)
#[repr(C, align(16))]
pub(crate) struct Stack(pub [StkWord; CFG_STACK_WORDS]);

impl Stack {
    const fn new() -> Self {
        Stack([0; CFG_STACK_WORDS])
    }
}

/// One pool slot: a TCB plus its stack region
pub(crate) struct TaskSlot {
    pub tcb: Tcb,
    pub stack: Stack,
}

impl TaskSlot {
    const fn new() -> Self {
        Self {
            tcb: Tcb::new(),
            stack: Stack::new(),
        }
    }
}

/// Fixed pool of task slots owned by a scheduler instance
pub(crate) struct TaskPool {
    slots: [TaskSlot; CFG_MAX_TASKS],
}

impl TaskPool {
    pub const fn new() -> Self {
        Self {
            slots: [const { TaskSlot::new() }; CFG_MAX_TASKS],
        }
    }

    /// Claim a free slot, or `None` when the pool is exhausted
    pub fn alloc(&mut self) -> Option<&mut TaskSlot> {
        let slot = self.slots.iter_mut().find(|s| !s.tcb.in_use)?;
        slot.tcb.in_use = true;
        Some(slot)
    }

    /// Release a slot once its task is Dead and off every queue
    pub fn free(&mut self, tcb: NonNull<Tcb>) {
        let tcb_ref = unsafe { &mut *tcb.as_ptr() };
        debug_assert!(tcb_ref.in_use);
        tcb_ref.in_use = false;
        tcb_ref.entry = None;
    }
}

/// Shared entry thunk for fresh tasks
///
/// Every port trampoline lands here with the TCB pointer it was seeded
/// with. Runs the entry function and hands control back to the scheduler
/// for good when it returns.
pub(crate) extern "C" fn task_start(tcb: *mut Tcb) -> ! {
    let tcb_ref = unsafe { &mut *tcb };
    // The scheduler outlives its tasks: spawn requires &'static self.
    let sched: &'static Scheduler = unsafe { &*tcb_ref.sched };
    let entry = match tcb_ref.entry {
        Some(f) => f,
        None => fatal("task started without an entry point"),
    };

    entry(sched, tcb_ref.entry_arg);

    // SAFETY: tcb comes from the scheduler's own pool.
    sched.task_returned(unsafe { NonNull::new_unchecked(tcb) })
}

/// Expiry callback for a task's embedded sleep timer
///
/// # Safety
/// `node` is the `sleep_node` of a live TCB whose `arg` points back at it.
pub(crate) unsafe fn sleep_wake_cb(node: NonNull<TimerNode>, _delta: i64) {
    let tcb = unsafe { node.as_ref() }.arg as *mut Tcb;
    let sched = unsafe { &*(*tcb).sched };
    // SAFETY: a sleeping task cannot die before its timer fires or is removed.
    sched.wake(TaskRef(unsafe { NonNull::new_unchecked(tcb) }));
}
