//! Port layer - per-architecture stack-switch primitives
//!
//! Each port exports the same two-operation context surface, so all
//! register-level unsafety stays behind this boundary:
//!
//! - `task_switch(old, new)`: save the caller's callee-saved set into
//!   `old`, restore `new`, transfer control. Returns only when another
//!   switch targets `old`. Reachable only through the scheduler.
//! - `scan_current_stack(hook, ctx)`: push every callee-saved register
//!   onto the caller's own stack, call `hook` with the resulting stack
//!   pointer as the scan lower bound, pop, return normally. A
//!   capture/restore/call sequence, never a control transfer.
//!
//! plus `init_context` to seed a fresh task, and the `idle_wait` /
//! `signal_event` pair for the run loop's low-power idle. The functional
//! contract - save exactly what is needed to resume this exact point
//! later - is architecture independent; the register set is not.

/// Callback invoked by `scan_current_stack` with the live stack pointer
pub type ScanHook = unsafe extern "C" fn(stack_low: *mut usize, ctx: *mut core::ffi::c_void);

#[cfg(target_arch = "arm")]
pub mod cortex_m;

#[cfg(target_arch = "arm")]
pub use cortex_m::*;

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(target_arch = "x86_64")]
pub use x86_64::*;

// Non-switching stub for other host architectures (pure-logic testing)
#[cfg(not(any(target_arch = "arm", target_arch = "x86_64")))]
pub mod stub;

#[cfg(not(any(target_arch = "arm", target_arch = "x86_64")))]
pub use stub::*;
