//! Conservative stack scanning hook for a garbage collector
//!
//! The runtime owns no collector and no heap; it only knows where a
//! task's pointers can hide. A collector hands in a [`RootScanner`] and
//! gets called back with every memory range that may contain live
//! pointers: the saved register block of a suspended task and the region
//! between its saved stack pointer and the top of its stack. Every
//! aligned in-range word is a candidate; range and alignment
//! disambiguation is the collector's job, not this module's.

use crate::core::critical::critical_section;
use crate::core::error::fatal;
use crate::core::sched::{Scheduler, TaskRef};
use crate::core::types::TaskState;
use crate::port;

/// Root-scan callback supplied by the collector
///
/// `scan_range` receives half-open word ranges `[low, high)`. It is
/// invoked while the scanned task is suspended (or, for the current task,
/// from within the scan primitive) and must not allocate: the collector
/// runs precisely because memory is tight, and the scanned state must not
/// move under it.
pub trait RootScanner {
    fn scan_range(&mut self, low: *const usize, high: *const usize);
}

struct ScanCtx<'a> {
    scanner: &'a mut dyn RootScanner,
    stack_top: *const usize,
}

unsafe extern "C" fn scan_hook(stack_low: *mut usize, ctx: *mut core::ffi::c_void) {
    let ctx = unsafe { &mut *(ctx as *mut ScanCtx) };
    ctx.scanner.scan_range(stack_low as *const usize, ctx.stack_top);
}

impl Scheduler {
    /// Report all candidate pointer words of a task to the collector
    ///
    /// For the currently running task this saves the caller's own
    /// callee-saved registers onto the stack and scans the live stack
    /// through the port primitive; the pushed registers fall inside the
    /// scanned range. For a suspended task it scans the saved register
    /// block in the TCB plus the stack between the saved stack pointer
    /// and the stack top. Scanning a Dead task is fatal misuse.
    pub fn scan_task_roots(&self, task: TaskRef, scanner: &mut dyn RootScanner) {
        let is_current =
            critical_section(|cs| self.inner.get(cs).current == Some(task.0));
        let tcb = unsafe { task.0.as_ref() };

        match tcb.state {
            TaskState::Dead => fatal("root scan of a dead task"),
            TaskState::Running if !is_current => {
                fatal("root scan of a running task from outside it")
            }
            _ => {}
        }

        let stack_top = tcb.stack_top() as *const usize;

        if is_current {
            let mut ctx = ScanCtx { scanner, stack_top };
            // SAFETY: the hook runs before the primitive pops the pushed
            // registers, so the stack range it sees stays valid.
            unsafe {
                port::scan_current_stack(scan_hook, &mut ctx as *mut ScanCtx as *mut _);
            }
        } else {
            let regs = tcb.ctx.as_words();
            let low = regs.as_ptr();
            scanner.scan_range(low, unsafe { low.add(regs.len()) });
            scanner.scan_range(tcb.ctx.stack_pointer() as *const usize, stack_top);
        }
    }
}
