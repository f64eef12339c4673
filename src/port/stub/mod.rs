//! Stub port for host architectures without a switch implementation
//!
//! Lets the pure-logic parts (timer queue, run queue, clock) build and
//! test anywhere. Actually switching contexts is fatal here.

use crate::core::error::fatal;
use crate::core::task::Tcb;
use crate::core::types::StkWord;
use crate::port::ScanHook;

/// Saved context; only the stack pointer is tracked
#[repr(C)]
pub struct TaskContext {
    sp: usize,
}

impl TaskContext {
    pub const fn new() -> Self {
        Self { sp: 0 }
    }

    #[inline]
    pub fn as_words(&self) -> &[usize] {
        unsafe { core::slice::from_raw_parts(self as *const Self as *const usize, 1) }
    }

    #[inline]
    pub fn stack_pointer(&self) -> *const StkWord {
        self.sp as *const StkWord
    }
}

/// # Safety
/// Never returns control; unsupported on this target.
pub unsafe extern "C" fn task_switch(_old: *mut TaskContext, _new: *const TaskContext) {
    fatal("context switching is not implemented for this architecture");
}

/// Approximates the live stack pointer with a local's address
///
/// # Safety
/// `hook` must treat the range as read-only.
pub unsafe extern "C" fn scan_current_stack(hook: ScanHook, ctx: *mut core::ffi::c_void) {
    let marker: usize = 0;
    unsafe { hook(&marker as *const usize as *mut usize, ctx) };
}

/// # Safety
/// The resulting context must never be switched into.
pub unsafe fn init_context(ctx: &mut TaskContext, stack_top: *mut StkWord, _tcb: *mut Tcb) {
    ctx.sp = stack_top as usize;
}

#[inline]
pub fn idle_wait() {
    core::hint::spin_loop();
}

#[inline]
pub fn signal_event() {}
