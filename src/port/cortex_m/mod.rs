//! Cortex-M (Thumb-2) port
//!
//! Cooperative switching in thread mode: no PendSV, no exception frame.
//! The saved set is the AAPCS callee-saved registers r4-r11 plus sp and
//! the resume address. Requires ARMv7-M or later (32-bit STM/LDM with
//! high registers).

use core::arch::naked_asm;

use crate::core::task::{task_start, Tcb};
use crate::core::types::StkWord;
use crate::port::ScanHook;

/// Saved callee-saved register block
#[repr(C)]
pub struct TaskContext {
    sp: u32,
    pc: u32,
    r4: u32,
    r5: u32,
    r6: u32,
    r7: u32,
    r8: u32,
    r9: u32,
    r10: u32,
    r11: u32,
}

impl TaskContext {
    pub const fn new() -> Self {
        Self {
            sp: 0,
            pc: 0,
            r4: 0,
            r5: 0,
            r6: 0,
            r7: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
        }
    }

    /// The saved register block as conservative-scan candidate words
    #[inline]
    pub fn as_words(&self) -> &[usize] {
        let len = core::mem::size_of::<Self>() / core::mem::size_of::<usize>();
        unsafe { core::slice::from_raw_parts(self as *const Self as *const usize, len) }
    }

    /// Saved stack pointer; lower bound of the suspended task's live stack
    #[inline]
    pub fn stack_pointer(&self) -> *const StkWord {
        self.sp as *const StkWord
    }
}

/// Switch from `old` to `new`
///
/// Saves sp, the return address and r4-r11 into `old`, restores the same
/// set from `new` and branches to its resume address. Comes back only
/// when a later switch targets `old`.
///
/// # Safety
/// Both pointers must reference valid contexts: `new` was either saved by
/// an earlier switch or seeded by `init_context`. Scheduler-internal.
/// Safe against interrupt re-entry: only the argument contexts and the
/// caller's stack are touched.
#[unsafe(naked)]
pub unsafe extern "C" fn task_switch(_old: *mut TaskContext, _new: *const TaskContext) {
    naked_asm!(
        // Save current context into old (r0)
        "mov r2, sp",
        "str r2, [r0, #0]",
        "str lr, [r0, #4]",
        "add r2, r0, #8",
        "stmia r2, {{r4-r11}}",
        // Load new context (r1)
        "ldr r3, [r1, #4]",
        "ldr r2, [r1, #0]",
        "mov sp, r2",
        "add r2, r1, #8",
        "ldmia r2, {{r4-r11}}",
        "bx r3",
    );
}

/// Entry shim for fresh tasks; r4 was seeded with the TCB pointer
#[unsafe(naked)]
unsafe extern "C" fn task_trampoline() {
    naked_asm!(
        "mov r0, r4",
        "bl {start}",
        // task_start never returns
        "udf #0",
        start = sym task_start,
    );
}

/// Capture the caller's registers and scan its live stack
///
/// Pushes all callee-saved registers so they land inside the scanned
/// range, calls `hook(stack_low, ctx)`, restores and returns normally.
/// r3 is pushed only to keep the stack 8-byte aligned for the call.
///
/// # Safety
/// `hook` must treat the range as read-only and must not allocate on this
/// stack beyond ordinary call frames.
#[unsafe(naked)]
pub unsafe extern "C" fn scan_current_stack(_hook: ScanHook, _ctx: *mut core::ffi::c_void) {
    naked_asm!(
        "push {{r3-r11, lr}}",
        "mov r2, r0",
        "mov r0, sp",
        "blx r2",
        "pop {{r3-r11, pc}}",
    );
}

/// Seed a fresh context so the first switch enters the task trampoline
///
/// # Safety
/// `stack_top` must be one past a writable stack region of at least a few
/// words; `tcb` must stay valid for the task's lifetime.
pub unsafe fn init_context(ctx: &mut TaskContext, stack_top: *mut StkWord, tcb: *mut Tcb) {
    // AAPCS: sp 8-byte aligned at the public interface.
    let top = (stack_top as usize) & !0x7;

    ctx.sp = top as u32;
    // Fn pointers on Thumb carry the mode bit, as bx expects.
    ctx.pc = task_trampoline as *const () as usize as u32;
    ctx.r4 = tcb as u32;
    ctx.r5 = 0;
    ctx.r6 = 0;
    ctx.r7 = 0;
    ctx.r8 = 0;
    ctx.r9 = 0;
    ctx.r10 = 0;
    ctx.r11 = 0;
}

/// Low-power idle wait; woken by `signal_event` or any interrupt
#[inline]
pub fn idle_wait() {
    cortex_m::asm::wfe();
}

/// Post a wakeup event; callable from interrupt context
#[inline]
pub fn signal_event() {
    cortex_m::asm::sev();
}
