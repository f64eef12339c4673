//! x86-64 (System V) port
//!
//! Saves the SysV callee-saved set: rsp, rbp, rbx, r12-r15. The resume
//! address travels on the task stack (popped by `ret`), so a fresh task
//! needs its trampoline address planted at the initial stack top. Mostly
//! useful for running the scheduler and its tests on a development host.

use core::arch::naked_asm;

use crate::core::task::{task_start, Tcb};
use crate::core::types::StkWord;
use crate::port::ScanHook;

/// Saved callee-saved register block
#[repr(C)]
pub struct TaskContext {
    rsp: u64,
    rbp: u64,
    rbx: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
}

impl TaskContext {
    pub const fn new() -> Self {
        Self {
            rsp: 0,
            rbp: 0,
            rbx: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
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
        self.rsp as *const StkWord
    }
}

/// Switch from `old` to `new`
///
/// Saves the callee-saved registers and stack pointer into `old`, loads
/// `new`, and returns into the new context. Comes back only when a later
/// switch targets `old`.
///
/// # Safety
/// Both pointers must reference valid contexts: `new` was either saved by
/// an earlier switch or seeded by `init_context`. Scheduler-internal.
#[unsafe(naked)]
pub unsafe extern "C" fn task_switch(_old: *mut TaskContext, _new: *const TaskContext) {
    naked_asm!(
        // Save callee-saved registers into old (rdi)
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], rbp",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], r13",
        "mov [rdi + 0x28], r14",
        "mov [rdi + 0x30], r15",
        // Load callee-saved registers from new (rsi)
        "mov rsp, [rsi + 0x00]",
        "mov rbp, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov r12, [rsi + 0x18]",
        "mov r13, [rsi + 0x20]",
        "mov r14, [rsi + 0x28]",
        "mov r15, [rsi + 0x30]",
        // Fresh task: pops the trampoline address and starts there.
        // Suspended task: returns to its own task_switch call site.
        "ret",
    );
}

/// Entry shim for fresh tasks; r12 was seeded with the TCB pointer
#[unsafe(naked)]
unsafe extern "C" fn task_trampoline() {
    naked_asm!(
        "mov rdi, r12",
        "call {start}",
        // task_start never returns
        "ud2",
        start = sym task_start,
    );
}

/// Capture the caller's registers and scan its live stack
///
/// Pushes all callee-saved registers so they land inside the scanned
/// range, calls `hook(stack_low, ctx)`, restores and returns normally.
///
/// # Safety
/// `hook` must treat the range as read-only and must not allocate on this
/// stack beyond ordinary call frames.
#[unsafe(naked)]
pub unsafe extern "C" fn scan_current_stack(_hook: ScanHook, _ctx: *mut core::ffi::c_void) {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        // Re-align for the call; the pad word is inside the scanned range
        // and harmless to a conservative scan
        "sub rsp, 8",
        "mov rax, rdi",
        "mov rdi, rsp",
        "call rax",
        "add rsp, 8",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    );
}

/// Seed a fresh context so the first switch enters the task trampoline
///
/// # Safety
/// `stack_top` must be one past a writable stack region of at least a few
/// words; `tcb` must stay valid for the task's lifetime.
pub unsafe fn init_context(ctx: &mut TaskContext, stack_top: *mut StkWord, tcb: *mut Tcb) {
    // SysV: rsp ≡ 0 (mod 16) immediately after `ret` into the trampoline.
    let top = (stack_top as usize) & !0xF;
    let slot = (top - core::mem::size_of::<usize>()) as *mut usize;
    unsafe { slot.write(task_trampoline as *const () as usize) };

    ctx.rsp = slot as u64;
    ctx.rbp = 0;
    ctx.rbx = 0;
    ctx.r12 = tcb as u64;
    ctx.r13 = 0;
    ctx.r14 = 0;
    ctx.r15 = 0;
}

/// Idle wait; on the host just a spin hint, re-polled by the run loop
#[inline]
pub fn idle_wait() {
    core::hint::spin_loop();
}

/// Wakeup event for the idle wait; nothing to do on the host
#[inline]
pub fn signal_event() {}
