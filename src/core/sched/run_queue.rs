//! Run queue - doubly linked FIFO of runnable TCBs
//!
//! Tasks become Runnable in wake order: insertion at the tail, scheduling
//! from the head. There are no priorities; FIFO order is the fairness
//! guarantee.

use core::ptr::NonNull;

use crate::core::task::Tcb;

/// FIFO queue of runnable tasks
#[derive(Debug)]
pub struct RunQueue {
    head: Option<NonNull<Tcb>>,
    tail: Option<NonNull<Tcb>>,
}

impl RunQueue {
    /// Create a new empty run queue
    pub const fn new() -> Self {
        RunQueue {
            head: None,
            tail: None,
        }
    }

    /// Insert TCB at the tail of the queue (FIFO order)
    ///
    /// # Safety
    /// Caller must ensure tcb is valid, not already in the queue, and must
    /// hold the scheduler critical section.
    pub unsafe fn push_tail(&mut self, tcb: NonNull<Tcb>) {
        let tcb_ref = unsafe { &mut *tcb.as_ptr() };

        tcb_ref.next_ptr = None;
        tcb_ref.prev_ptr = self.tail;

        match self.tail {
            Some(tail) => {
                // Queue not empty - link from current tail
                unsafe { (*tail.as_ptr()).next_ptr = Some(tcb) };
            }
            None => {
                // Queue is empty - this becomes head
                self.head = Some(tcb);
            }
        }

        self.tail = Some(tcb);
    }

    /// Pop the head of the queue
    ///
    /// # Safety
    /// Caller must hold the scheduler critical section.
    pub unsafe fn pop_head(&mut self) -> Option<NonNull<Tcb>> {
        let head = self.head?;
        unsafe { self.remove(head) };
        Some(head)
    }

    /// Remove a TCB from the queue
    ///
    /// # Safety
    /// Caller must ensure tcb is in this queue and must hold the scheduler
    /// critical section.
    pub unsafe fn remove(&mut self, tcb: NonNull<Tcb>) {
        let tcb_ref = unsafe { &mut *tcb.as_ptr() };

        // Update previous node's next pointer
        match tcb_ref.prev_ptr {
            Some(prev) => {
                unsafe { (*prev.as_ptr()).next_ptr = tcb_ref.next_ptr };
            }
            None => {
                // This was the head
                self.head = tcb_ref.next_ptr;
            }
        }

        // Update next node's prev pointer
        match tcb_ref.next_ptr {
            Some(next) => {
                unsafe { (*next.as_ptr()).prev_ptr = tcb_ref.prev_ptr };
            }
            None => {
                // This was the tail
                self.tail = tcb_ref.prev_ptr;
            }
        }

        // Clear TCB's queue pointers
        tcb_ref.prev_ptr = None;
        tcb_ref.next_ptr = None;
    }
}

impl Default for RunQueue {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: RunQueue is only modified within critical sections
unsafe impl Send for RunQueue {}
unsafe impl Sync for RunQueue {}
