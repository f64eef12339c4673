//! Cooperative scheduler
//!
//! One [`Scheduler`] instance owns every piece of runtime state: the task
//! pool, the FIFO run queue, the timer queue and the saved scheduler
//! context. Nothing is global, so isolated instances can be created for
//! testing. The instance must not move once tasks exist (contexts point
//! into its pool), which is why `spawn` and `run` take `&'static self`:
//! place the scheduler in a `static` or leak a box.
//!
//! Exactly one task is Running at any instant. The run loop lives on the
//! stack of whoever calls [`Scheduler::run`]; every suspension switches
//! back to it. Interrupt handlers never run task code: they may only call
//! [`Scheduler::wake`], [`Scheduler::note_tick`] and the timer add/remove
//! operations, all of which confine their queue mutation to brief
//! interrupt-disabled critical sections.

mod run_queue;

pub use run_queue::RunQueue;

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::core::clock::{ticks_from_nanos, Clock};
use crate::core::config::{CFG_STACK_GUARD_WORDS, STACK_GUARD};
use crate::core::critical::{critical_section, is_isr_context};
use crate::core::cs_cell::CsCell;
use crate::core::error::{fatal, RtError, RtResult};
use crate::core::task::{TaskFn, TaskPool, Tcb};
use crate::core::timer::{TimerNode, TimerQueue};
use crate::core::types::{CatchUpPolicy, ParkReason, TaskState, Tick};
use crate::port::{self, TaskContext};

/// Handle to a spawned task
///
/// Valid until the task dies; waking a dead task is a fatal programming
/// error, so holders must not outlive the task they reference.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TaskRef(pub(crate) NonNull<Tcb>);

unsafe impl Send for TaskRef {}
unsafe impl Sync for TaskRef {}

impl TaskRef {
    /// Task name, for diagnostics
    pub fn name(&self) -> &'static str {
        unsafe { self.0.as_ref() }.name()
    }
}

/// Atomic scheduler flags, readable without a critical section
struct SchedFlags {
    running: AtomicBool,
    external_wakeups: AtomicBool,
}

impl SchedFlags {
    const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            external_wakeups: AtomicBool::new(false),
        }
    }
}

/// Mutable scheduler state, guarded by critical sections
pub(crate) struct SchedInner {
    pub(crate) pool: TaskPool,
    pub(crate) run_queue: RunQueue,
    pub(crate) timers: TimerQueue,
    /// The one Running task, if the run loop has switched into one
    pub(crate) current: Option<NonNull<Tcb>>,
    /// Saved context of the run loop itself
    pub(crate) sched_ctx: TaskContext,
    /// Tasks spawned and not yet reclaimed
    pub(crate) live_tasks: usize,
    pub(crate) catch_up: CatchUpPolicy,
}

impl SchedInner {
    const fn new() -> Self {
        Self {
            pool: TaskPool::new(),
            run_queue: RunQueue::new(),
            timers: TimerQueue::new(),
            current: None,
            sched_ctx: TaskContext::new(),
            live_tasks: 0,
            catch_up: CatchUpPolicy::Resync,
        }
    }
}

/// A cooperative scheduler instance
pub struct Scheduler {
    flags: SchedFlags,
    clock: &'static dyn Clock,
    pub(crate) inner: CsCell<SchedInner>,
}

impl Scheduler {
    /// Create a scheduler driven by the given monotonic clock
    pub const fn new(clock: &'static dyn Clock) -> Self {
        Self {
            flags: SchedFlags::new(),
            clock,
            inner: CsCell::new(SchedInner::new()),
        }
    }

    /// Whether the run loop is active
    #[inline]
    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::Acquire)
    }

    /// Declare that interrupt handlers may wake parked tasks
    ///
    /// Disables the run loop's deadlock detection: with no runnable task
    /// and no pending timer it will idle-wait for an interrupt instead of
    /// returning `Err(Deadlock)`.
    pub fn expect_external_wakeups(&self, yes: bool) {
        self.flags.external_wakeups.store(yes, Ordering::Release);
    }

    /// Select the re-arm policy for tickers that missed multiple periods
    pub fn set_catch_up_policy(&self, policy: CatchUpPolicy) {
        critical_section(|cs| self.inner.get(cs).catch_up = policy);
    }

    /// Current monotonic time in ticks
    #[inline]
    pub fn now_ticks(&self) -> Tick {
        ticks_from_nanos(self.clock.nanotime())
    }

    // ============ Task API ============

    /// Spawn a new task
    ///
    /// Claims a fixed-size stack and TCB from the scheduler's pool and
    /// enqueues the task Runnable; it first runs when the run loop reaches
    /// it. Pool exhaustion is fatal: stacks are bounded and there is
    /// nothing to degrade into. Fatal from interrupt context.
    pub fn spawn(&'static self, entry: TaskFn, arg: *mut (), name: &'static str) -> TaskRef {
        if is_isr_context() {
            fatal("spawn from interrupt context");
        }

        critical_section(|cs| {
            let inner = self.inner.get(cs);

            let slot = match inner.pool.alloc() {
                Some(slot) => slot,
                None => fatal("task pool exhausted"),
            };

            let stack = slot.stack.0.as_mut_ptr();
            let stk_size = slot.stack.0.len();
            for i in 0..CFG_STACK_GUARD_WORDS {
                unsafe { stack.add(i).write(STACK_GUARD) };
            }

            let tcb_ptr = NonNull::from(&mut slot.tcb);
            let tcb = unsafe { &mut *tcb_ptr.as_ptr() };
            tcb.state = TaskState::Runnable;
            tcb.park_reason = ParkReason::Nothing;
            tcb.next_ptr = None;
            tcb.prev_ptr = None;
            tcb.stk_base = stack;
            tcb.stk_size = stk_size;
            tcb.name = name;
            tcb.entry = Some(entry);
            tcb.entry_arg = arg;
            tcb.sched = self as *const Scheduler;
            tcb.sleep_node.arg = tcb_ptr.as_ptr() as *mut ();

            let stack_top = tcb.stack_top();
            unsafe {
                port::init_context(&mut tcb.ctx, stack_top, tcb_ptr.as_ptr());
                inner.run_queue.push_tail(tcb_ptr);
            }
            inner.live_tasks += 1;

            crate::trace!("spawned task {}", name);
            TaskRef(tcb_ptr)
        })
    }

    /// Voluntarily give up the processor
    ///
    /// The calling task goes back to the tail of the run queue and the
    /// scheduler resumes the next runnable task. This is the cooperative
    /// safe point: no asynchronous preemption exists.
    pub fn yield_now(&self) {
        let (task_ctx, sched_ctx) = critical_section(|cs| {
            let inner = self.inner.get(cs);
            let cur = match inner.current {
                Some(cur) => cur,
                None => fatal("yield outside a task"),
            };
            let cur_ref = unsafe { &mut *cur.as_ptr() };
            cur_ref.state = TaskState::Runnable;
            unsafe { inner.run_queue.push_tail(cur) };
            (
                &mut cur_ref.ctx as *mut TaskContext,
                &inner.sched_ctx as *const TaskContext,
            )
        });

        // SAFETY: both contexts belong to this scheduler instance.
        unsafe { port::task_switch(task_ctx, sched_ctx) };
    }

    /// Park the calling task
    ///
    /// The task leaves the run queue under the given reason and will not
    /// run again until some collaborator calls [`Scheduler::wake`] on it.
    /// Wakes may be spurious: callers must re-check their condition.
    pub fn park(&self, reason: ParkReason) {
        let (task_ctx, sched_ctx) = critical_section(|cs| {
            let inner = self.inner.get(cs);
            let cur = match inner.current {
                Some(cur) => cur,
                None => fatal("park outside a task"),
            };
            let cur_ref = unsafe { &mut *cur.as_ptr() };
            cur_ref.state = TaskState::Parked;
            cur_ref.park_reason = reason;
            (
                &mut cur_ref.ctx as *mut TaskContext,
                &inner.sched_ctx as *const TaskContext,
            )
        });

        // SAFETY: both contexts belong to this scheduler instance.
        unsafe { port::task_switch(task_ctx, sched_ctx) };
    }

    /// Make a parked task runnable
    ///
    /// No-op on a task that is already Runnable or Running (a second wake
    /// before the task runs coalesces into one run-queue entry). Waking a
    /// Dead task is a fatal programming error. Callable from interrupt
    /// context.
    pub fn wake(&self, task: TaskRef) {
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            let tcb_ref = unsafe { &mut *task.0.as_ptr() };
            match tcb_ref.state {
                TaskState::Parked => {
                    tcb_ref.state = TaskState::Runnable;
                    tcb_ref.park_reason = ParkReason::Nothing;
                    unsafe { inner.run_queue.push_tail(task.0) };
                    port::signal_event();
                }
                TaskState::Runnable | TaskState::Running => {}
                TaskState::Dead => fatal("wake of a dead task"),
            }
        });
    }

    /// Sleep the calling task for `ticks`
    ///
    /// Implemented purely as a timer-queue wakeup on the TCB's embedded
    /// timer node. Re-parks after spurious wakes until the deadline has
    /// passed. A non-positive duration degenerates to a yield.
    pub fn sleep_ticks(&self, ticks: Tick) {
        if ticks <= 0 {
            self.yield_now();
            return;
        }

        let deadline = self.now_ticks().saturating_add(ticks);

        let node = critical_section(|cs| {
            let inner = self.inner.get(cs);
            let cur = match inner.current {
                Some(cur) => cur,
                None => fatal("sleep outside a task"),
            };
            let cur_ref = unsafe { &mut *cur.as_ptr() };
            let node = NonNull::from(&mut cur_ref.sleep_node);
            if cur_ref.sleep_node.set_when(deadline).is_err() {
                fatal("sleep with the task's timer already armed");
            }
            unsafe { inner.timers.add(node) };
            node
        });

        loop {
            self.park(ParkReason::Timer);
            if self.now_ticks() >= deadline {
                break;
            }
            // Spurious wake: re-arm if the timer fired while we were
            // runnable for some other reason.
            critical_section(|cs| {
                let inner = self.inner.get(cs);
                let node_ref = unsafe { &mut *node.as_ptr() };
                if !node_ref.is_queued() {
                    let _ = node_ref.set_when(deadline);
                    unsafe { inner.timers.add(node) };
                }
            });
        }

        critical_section(|cs| unsafe { self.inner.get(cs).timers.remove(node) });
    }

    /// Sleep the calling task for `ns` nanoseconds
    pub fn sleep_ns(&self, ns: i64) {
        self.sleep_ticks(ticks_from_nanos(ns));
    }

    /// The task currently running, if the caller is inside one
    pub fn current_task(&self) -> Option<TaskRef> {
        critical_section(|cs| self.inner.get(cs).current.map(TaskRef))
    }

    // ============ Timer API ============

    /// Queue a timer node
    ///
    /// Callable from interrupt context.
    ///
    /// # Safety
    /// `node` must be valid, unqueued, and stay alive until it fires or is
    /// removed; periodic nodes must stay alive while queued anywhere.
    pub unsafe fn add_timer(&self, node: NonNull<TimerNode>) {
        critical_section(|cs| {
            unsafe { self.inner.get(cs).timers.add(node) };
            port::signal_event();
        });
    }

    /// Unlink a timer node by identity
    ///
    /// Returns `false` if the node already fired or was never queued.
    pub fn remove_timer(&self, node: NonNull<TimerNode>) -> bool {
        critical_section(|cs| unsafe { self.inner.get(cs).timers.remove(node) })
    }

    /// Cheap tick-ISR hook
    ///
    /// Posts a wakeup event and nothing else; the run loop does the actual
    /// timer-queue work, so the ISR never starves other interrupts.
    #[inline]
    pub fn note_tick(&self) {
        port::signal_event();
    }

    /// Fire every timer due at `now`
    ///
    /// Callbacks run on the caller's stack, outside the critical section.
    /// Periodic nodes re-arm with `when += period`; the catch-up policy
    /// applies when more than one period was missed.
    pub fn advance_timers(&self, now: Tick) {
        loop {
            let due = critical_section(|cs| unsafe { self.inner.get(cs).timers.pop_due(now) });
            let Some(node) = due else { break };

            // Read before firing: a one-shot owner may reclaim its node
            // once the callback has run.
            let (when, period) = {
                let node_ref = unsafe { node.as_ref() };
                (node_ref.when(), node_ref.period())
            };
            let delta = now - when;

            unsafe { TimerNode::fire(node, delta) };

            if period > 0 {
                critical_section(|cs| {
                    let inner = self.inner.get(cs);
                    let node_ref = unsafe { &mut *node.as_ptr() };
                    // The callback may have removed or re-queued it itself.
                    if !node_ref.is_queued() {
                        node_ref.advance_period(now, inner.catch_up);
                        unsafe { inner.timers.add(node) };
                    }
                });
            }
        }
    }

    // ============ Run loop ============

    /// Run tasks until shutdown or a fatal condition
    ///
    /// Repeatedly fires due timers and resumes the next runnable task.
    /// With nothing runnable it idle-waits (low-power wait on ARM) until
    /// the timer queue or an interrupt produces work. Returns `Ok(())`
    /// once no live task and no timer remains; returns
    /// `Err(RtError::Deadlock)` if parked tasks remain that nothing can
    /// ever wake.
    pub fn run(&'static self) -> RtResult<()> {
        if self.flags.running.swap(true, Ordering::AcqRel) {
            return Err(RtError::AlreadyRunning);
        }

        let spawned = critical_section(|cs| self.inner.get(cs).live_tasks);
        if spawned == 0 {
            self.flags.running.store(false, Ordering::Release);
            return Err(RtError::NoTasks);
        }

        crate::debug!("run loop started");
        let result = self.run_inner();
        self.flags.running.store(false, Ordering::Release);
        result
    }

    fn run_inner(&'static self) -> RtResult<()> {
        loop {
            self.advance_timers(self.now_ticks());

            let next = critical_section(|cs| unsafe { self.inner.get(cs).run_queue.pop_head() });

            let Some(task) = next else {
                let idle = critical_section(|cs| {
                    let inner = self.inner.get(cs);
                    if inner.live_tasks == 0 && inner.timers.is_empty() {
                        return IdleVerdict::Shutdown;
                    }
                    if inner.timers.is_empty()
                        && !self.flags.external_wakeups.load(Ordering::Acquire)
                    {
                        return IdleVerdict::Deadlock;
                    }
                    IdleVerdict::Wait
                });
                match idle {
                    IdleVerdict::Shutdown => return Ok(()),
                    IdleVerdict::Deadlock => {
                        crate::error!("all tasks parked with nothing to wake them");
                        return Err(RtError::Deadlock);
                    }
                    IdleVerdict::Wait => {
                        port::idle_wait();
                        continue;
                    }
                }
            };

            self.resume(task);
        }
    }

    /// Switch into a runnable task and handle its suspension
    fn resume(&'static self, task: NonNull<Tcb>) {
        let (sched_ctx, task_ctx) = critical_section(|cs| {
            let inner = self.inner.get(cs);
            let tcb_ref = unsafe { &mut *task.as_ptr() };
            if tcb_ref.state != TaskState::Runnable {
                fatal("switch into a task that is not runnable");
            }
            tcb_ref.state = TaskState::Running;
            inner.current = Some(task);
            (
                &mut inner.sched_ctx as *mut TaskContext,
                &tcb_ref.ctx as *const TaskContext,
            )
        });

        // SAFETY: task context was saved at its last suspension (or seeded
        // at spawn); returns when the task switches back.
        unsafe { port::task_switch(sched_ctx, task_ctx) };

        critical_section(|cs| {
            let inner = self.inner.get(cs);
            inner.current = None;
            let tcb_ref = unsafe { &mut *task.as_ptr() };
            check_stack_guard(tcb_ref);
            if tcb_ref.state == TaskState::Dead {
                // A task woken spuriously out of a sleep can die with its
                // timer still queued; unlink before the slot is reused.
                unsafe { inner.timers.remove(NonNull::from(&mut tcb_ref.sleep_node)) };
                crate::trace!("task {} finished", tcb_ref.name);
                inner.pool.free(task);
                inner.live_tasks -= 1;
            }
        });
    }

    /// Final suspension of a task whose entry function returned
    pub(crate) fn task_returned(&self, task: NonNull<Tcb>) -> ! {
        let (task_ctx, sched_ctx) = critical_section(|cs| {
            let inner = self.inner.get(cs);
            let tcb_ref = unsafe { &mut *task.as_ptr() };
            tcb_ref.state = TaskState::Dead;
            (
                &mut tcb_ref.ctx as *mut TaskContext,
                &inner.sched_ctx as *const TaskContext,
            )
        });

        // SAFETY: the scheduler context is valid; control never comes back.
        unsafe { port::task_switch(task_ctx, sched_ctx) };
        fatal("dead task resumed");
    }
}

enum IdleVerdict {
    Shutdown,
    Deadlock,
    Wait,
}

/// Verify the guard words at the low end of a task stack
fn check_stack_guard(tcb: &Tcb) {
    for i in 0..CFG_STACK_GUARD_WORDS {
        if unsafe { tcb.stk_base.add(i).read() } != STACK_GUARD {
            crate::error!("stack guard tripped for task {}", tcb.name);
            fatal("task stack overflow");
        }
    }
}
