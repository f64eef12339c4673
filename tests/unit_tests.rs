//! Unit tests for the core runtime modules
//!
//! These run on the host, not an embedded target. Pure-logic tests
//! (timer queue, clock, run ordering bookkeeping) run anywhere; tests
//! that actually switch stacks are gated on the x86-64 port.

use core::ptr::NonNull;

use greenrt::timer::TimerNode;

/// Timer callback that appends (deadline, delta) to the Vec behind `arg`
unsafe fn record_cb(node: NonNull<TimerNode>, delta: i64) {
    let node_ref = unsafe { node.as_ref() };
    let log = unsafe { &mut *(node_ref.arg as *mut Vec<(i64, i64)>) };
    log.push((node_ref.when(), delta));
}

unsafe fn nop_cb(_node: NonNull<TimerNode>, _delta: i64) {}

#[cfg(test)]
mod timer_queue_tests {
    use super::nop_cb;
    use core::ptr::NonNull;
    use greenrt::error::RtError;
    use greenrt::timer::{TimerNode, TimerQueue};

    #[test]
    fn test_deadline_ordering() {
        let mut q = TimerQueue::new();
        let mut a = TimerNode::one_shot(50, nop_cb, core::ptr::null_mut());
        let mut b = TimerNode::one_shot(10, nop_cb, core::ptr::null_mut());
        let mut c = TimerNode::one_shot(30, nop_cb, core::ptr::null_mut());

        unsafe {
            q.add(NonNull::from(&mut a));
            q.add(NonNull::from(&mut b));
            q.add(NonNull::from(&mut c));
        }

        assert_eq!(q.next_deadline(), Some(10));

        let order: Vec<i64> = (0..3)
            .map(|_| unsafe { q.pop_due(100).unwrap().as_ref().when() })
            .collect();
        assert_eq!(order, vec![10, 30, 50]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_pop_due_respects_now() {
        let mut q = TimerQueue::new();
        let mut a = TimerNode::one_shot(40, nop_cb, core::ptr::null_mut());
        unsafe { q.add(NonNull::from(&mut a)) };

        assert!(unsafe { q.pop_due(39) }.is_none());
        assert!(unsafe { q.pop_due(40) }.is_some());
        assert!(q.is_empty());
    }

    #[test]
    fn test_remove_by_identity() {
        let mut q = TimerQueue::new();
        let mut a = TimerNode::one_shot(10, nop_cb, core::ptr::null_mut());
        let mut b = TimerNode::one_shot(20, nop_cb, core::ptr::null_mut());
        let mut c = TimerNode::one_shot(30, nop_cb, core::ptr::null_mut());

        unsafe {
            q.add(NonNull::from(&mut a));
            q.add(NonNull::from(&mut b));
            q.add(NonNull::from(&mut c));
        }

        // Unlink the middle node
        assert!(unsafe { q.remove(NonNull::from(&mut b)) });
        assert!(!b.is_queued());
        // Second remove is a no-op
        assert!(!unsafe { q.remove(NonNull::from(&mut b)) });

        assert_eq!(unsafe { q.pop_due(100) }, Some(NonNull::from(&mut a)));
        assert_eq!(unsafe { q.pop_due(100) }, Some(NonNull::from(&mut c)));
        assert!(q.is_empty());
    }

    #[test]
    fn test_remove_after_fire_is_noop() {
        let mut q = TimerQueue::new();
        let mut a = TimerNode::one_shot(5, nop_cb, core::ptr::null_mut());
        unsafe { q.add(NonNull::from(&mut a)) };

        let fired = unsafe { q.pop_due(10) }.unwrap();
        assert_eq!(fired, NonNull::from(&mut a));
        assert!(!unsafe { q.remove(NonNull::from(&mut a)) });
    }

    #[test]
    fn test_equal_deadlines_fire_in_insertion_order() {
        let mut q = TimerQueue::new();
        let mut a = TimerNode::one_shot(10, nop_cb, 1usize as *mut ());
        let mut b = TimerNode::one_shot(10, nop_cb, 2usize as *mut ());

        unsafe {
            q.add(NonNull::from(&mut a));
            q.add(NonNull::from(&mut b));
        }

        let first = unsafe { q.pop_due(10).unwrap() };
        let second = unsafe { q.pop_due(10).unwrap() };
        assert_eq!(unsafe { first.as_ref() }.arg as usize, 1);
        assert_eq!(unsafe { second.as_ref() }.arg as usize, 2);
    }

    #[test]
    fn test_set_when_on_queued_node_rejected() {
        let mut q = TimerQueue::new();
        let mut a = TimerNode::one_shot(10, nop_cb, core::ptr::null_mut());
        unsafe { q.add(NonNull::from(&mut a)) };
        assert_eq!(a.set_when(99), Err(RtError::TimerQueued));
        unsafe { q.remove(NonNull::from(&mut a)) };
        assert_eq!(a.set_when(99), Ok(()));
        assert_eq!(a.when(), 99);
    }

    #[test]
    fn test_invalid_period_rejected() {
        assert!(TimerNode::periodic(0, 0, nop_cb, core::ptr::null_mut()).is_err());
        assert!(TimerNode::periodic(0, -5, nop_cb, core::ptr::null_mut()).is_err());
        assert!(TimerNode::periodic(0, 1, nop_cb, core::ptr::null_mut()).is_ok());
    }
}

#[cfg(test)]
mod ticker_tests {
    use super::record_cb;
    use core::ptr::NonNull;
    use greenrt::clock::ManualClock;
    use greenrt::sched::Scheduler;
    use greenrt::timer::TimerNode;
    use greenrt::types::CatchUpPolicy;

    fn fresh_scheduler(clock: &'static ManualClock) -> &'static Scheduler {
        Box::leak(Box::new(Scheduler::new(clock)))
    }

    #[test]
    fn test_one_shot_fire_order_and_delta() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);

        let mut log: Vec<(i64, i64)> = Vec::new();
        let log_ptr = &mut log as *mut Vec<(i64, i64)> as *mut ();
        let mut a = TimerNode::one_shot(50, record_cb, log_ptr);
        let mut b = TimerNode::one_shot(10, record_cb, log_ptr);
        let mut c = TimerNode::one_shot(30, record_cb, log_ptr);

        unsafe {
            rt.add_timer(NonNull::from(&mut a));
            rt.add_timer(NonNull::from(&mut b));
            rt.add_timer(NonNull::from(&mut c));
        }

        rt.advance_timers(60);
        assert_eq!(log, vec![(10, 50), (30, 30), (50, 10)]);
    }

    #[test]
    fn test_ticker_does_not_drift() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);

        let mut log: Vec<(i64, i64)> = Vec::new();
        let mut t = TimerNode::periodic(
            100,
            100,
            record_cb,
            &mut log as *mut Vec<(i64, i64)> as *mut (),
        )
        .unwrap();
        unsafe { rt.add_timer(NonNull::from(&mut t)) };

        // Fired 15 ticks late: the next deadline is still 200, not 215.
        rt.advance_timers(115);
        assert_eq!(log, vec![(100, 15)]);
        assert_eq!(t.when(), 200);
        assert!(t.is_queued());
    }

    #[test]
    fn test_ticker_catch_up_resync() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);

        let mut log: Vec<(i64, i64)> = Vec::new();
        let mut t = TimerNode::periodic(
            100,
            100,
            record_cb,
            &mut log as *mut Vec<(i64, i64)> as *mut (),
        )
        .unwrap();
        unsafe { rt.add_timer(NonNull::from(&mut t)) };

        // Two whole periods elapsed: exactly one firing, deadline
        // resynchronizes to 300.
        rt.advance_timers(250);
        assert_eq!(log, vec![(100, 150)]);
        assert_eq!(t.when(), 300);
    }

    #[test]
    fn test_ticker_catch_up_fire_each() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);
        rt.set_catch_up_policy(CatchUpPolicy::FireEach);

        let mut log: Vec<(i64, i64)> = Vec::new();
        let mut t = TimerNode::periodic(
            100,
            100,
            record_cb,
            &mut log as *mut Vec<(i64, i64)> as *mut (),
        )
        .unwrap();
        unsafe { rt.add_timer(NonNull::from(&mut t)) };

        // Every missed period produces a firing.
        rt.advance_timers(250);
        assert_eq!(log, vec![(100, 150), (200, 50)]);
        assert_eq!(t.when(), 300);
    }

    #[test]
    fn test_deadline_arithmetic_saturates() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);

        let mut log: Vec<(i64, i64)> = Vec::new();
        let mut t = TimerNode::periodic(
            10,
            i64::MAX,
            record_cb,
            &mut log as *mut Vec<(i64, i64)> as *mut (),
        )
        .unwrap();
        unsafe { rt.add_timer(NonNull::from(&mut t)) };

        rt.advance_timers(20);
        assert_eq!(log.len(), 1);
        // Saturated, not wrapped into the past
        assert_eq!(t.when(), i64::MAX);
    }

    #[test]
    fn test_removed_ticker_never_fires() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);

        let mut log: Vec<(i64, i64)> = Vec::new();
        let mut t = TimerNode::periodic(
            10,
            10,
            record_cb,
            &mut log as *mut Vec<(i64, i64)> as *mut (),
        )
        .unwrap();
        unsafe { rt.add_timer(NonNull::from(&mut t)) };

        assert!(rt.remove_timer(NonNull::from(&mut t)));
        rt.advance_timers(1_000);
        assert!(log.is_empty());
    }
}

#[cfg(test)]
mod clock_tests {
    use greenrt::clock::{nanos_from_ticks, ticks_from_nanos, ManualClock, Clock};
    use greenrt::config::CFG_NANOS_PER_TICK;

    #[test]
    fn test_tick_conversion() {
        assert_eq!(ticks_from_nanos(0), 0);
        assert_eq!(ticks_from_nanos(CFG_NANOS_PER_TICK - 1), 0);
        assert_eq!(ticks_from_nanos(CFG_NANOS_PER_TICK), 1);
        assert_eq!(ticks_from_nanos(5 * CFG_NANOS_PER_TICK + 17), 5);
        assert_eq!(nanos_from_ticks(7), 7 * CFG_NANOS_PER_TICK);
    }

    #[test]
    fn test_nanos_from_ticks_saturates() {
        assert_eq!(nanos_from_ticks(i64::MAX), i64::MAX);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        assert_eq!(clock.nanotime(), 0);
        clock.advance(1_500);
        assert_eq!(clock.nanotime(), 1_500);
        clock.advance(i64::MAX);
        assert_eq!(clock.nanotime(), i64::MAX);
    }

    #[test]
    fn test_manual_clock_concurrent_advances_all_count() {
        static CLOCK: ManualClock = ManualClock::new();
        let ticker = std::thread::spawn(|| {
            for _ in 0..1_000 {
                CLOCK.advance(3);
            }
        });
        for _ in 0..1_000 {
            CLOCK.advance(7);
        }
        ticker.join().unwrap();
        // Every advance from both writers lands
        assert_eq!(CLOCK.nanotime(), 1_000 * 3 + 1_000 * 7);
    }

    #[test]
    fn test_now_derived_from_mono() {
        let clock = ManualClock::new();
        clock.set(3_000_000_123);
        let (sec, nsec, mono) = clock.now();
        assert_eq!(sec, 3);
        assert_eq!(nsec, 123);
        assert_eq!(mono, 3_000_000_123);
    }
}

#[cfg(test)]
mod spawn_tests {
    use greenrt::clock::ManualClock;
    use greenrt::config::CFG_MAX_TASKS;
    use greenrt::error::RtError;
    use greenrt::sched::Scheduler;

    fn noop_task(_rt: &'static Scheduler, _arg: *mut ()) {}

    #[test]
    fn test_run_without_tasks_rejected() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt: &'static Scheduler = Box::leak(Box::new(Scheduler::new(&CLOCK)));
        assert_eq!(rt.run(), Err(RtError::NoTasks));
        assert!(!rt.is_running());
    }

    #[test]
    #[should_panic(expected = "task pool exhausted")]
    fn test_spawn_exhaustion_is_fatal() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt: &'static Scheduler = Box::leak(Box::new(Scheduler::new(&CLOCK)));
        for _ in 0..=CFG_MAX_TASKS {
            rt.spawn(noop_task, core::ptr::null_mut(), "filler");
        }
    }

    #[test]
    fn test_task_ref_name() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt: &'static Scheduler = Box::leak(Box::new(Scheduler::new(&CLOCK)));
        let t = rt.spawn(noop_task, core::ptr::null_mut(), "worker");
        assert_eq!(t.name(), "worker");
    }
}

// Tests below actually switch stacks and need the x86-64 port.
#[cfg(all(test, target_arch = "x86_64"))]
mod sched_tests {
    use greenrt::clock::ManualClock;
    use greenrt::error::RtError;
    use greenrt::sched::{Scheduler, TaskRef};
    use greenrt::types::ParkReason;

    /// Shared state handed to tasks through the spawn argument
    struct Shared {
        log: Vec<u32>,
        peer: Option<TaskRef>,
        done: bool,
    }

    impl Shared {
        fn new() -> Self {
            Self {
                log: Vec::new(),
                peer: None,
                done: false,
            }
        }
    }

    fn fresh_scheduler(clock: &'static ManualClock) -> &'static Scheduler {
        Box::leak(Box::new(Scheduler::new(clock)))
    }

    unsafe fn shared<'a>(arg: *mut ()) -> &'a mut Shared {
        unsafe { &mut *(arg as *mut Shared) }
    }

    #[test]
    fn test_run_to_completion_in_spawn_order() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);
        let mut sh = Shared::new();
        let arg = &mut sh as *mut Shared as *mut ();

        fn t1(_rt: &'static Scheduler, arg: *mut ()) {
            unsafe { shared(arg) }.log.push(1);
        }
        fn t2(_rt: &'static Scheduler, arg: *mut ()) {
            unsafe { shared(arg) }.log.push(2);
        }
        fn t3(_rt: &'static Scheduler, arg: *mut ()) {
            unsafe { shared(arg) }.log.push(3);
        }

        rt.spawn(t1, arg, "t1");
        rt.spawn(t2, arg, "t2");
        rt.spawn(t3, arg, "t3");

        assert_eq!(rt.run(), Ok(()));
        assert_eq!(sh.log, vec![1, 2, 3]);
    }

    #[test]
    fn test_yield_interleaves_fifo() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);
        let mut sh = Shared::new();
        let arg = &mut sh as *mut Shared as *mut ();

        fn spin(rt: &'static Scheduler, arg: *mut (), id: u32) {
            for _ in 0..3 {
                unsafe { shared(arg) }.log.push(id);
                rt.yield_now();
            }
        }
        fn a(rt: &'static Scheduler, arg: *mut ()) {
            spin(rt, arg, 1)
        }
        fn b(rt: &'static Scheduler, arg: *mut ()) {
            spin(rt, arg, 2)
        }
        fn c(rt: &'static Scheduler, arg: *mut ()) {
            spin(rt, arg, 3)
        }

        rt.spawn(a, arg, "a");
        rt.spawn(b, arg, "b");
        rt.spawn(c, arg, "c");

        assert_eq!(rt.run(), Ok(()));
        assert_eq!(sh.log, vec![1, 2, 3, 1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_current_task_tracks_the_running_task() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);
        let mut sh = Shared::new();
        let arg = &mut sh as *mut Shared as *mut ();

        fn introspect(rt: &'static Scheduler, arg: *mut ()) {
            let me = rt.current_task().unwrap();
            for _ in 0..3 {
                rt.yield_now();
                // Still the current task after every resumption
                if rt.current_task() == Some(me) {
                    unsafe { shared(arg) }.log.push(1);
                }
            }
        }

        rt.spawn(introspect, arg, "one");
        rt.spawn(introspect, arg, "two");
        assert_eq!(rt.run(), Ok(()));
        assert_eq!(sh.log, vec![1; 6]);
        // Nobody is current once the run loop has returned
        assert!(rt.current_task().is_none());
    }

    #[test]
    fn test_park_and_wake() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);
        let mut sh = Shared::new();
        let arg = &mut sh as *mut Shared as *mut ();

        fn sleeper(rt: &'static Scheduler, arg: *mut ()) {
            unsafe { shared(arg) }.log.push(10);
            rt.park(ParkReason::Interrupt);
            unsafe { shared(arg) }.log.push(12);
        }
        fn waker(rt: &'static Scheduler, arg: *mut ()) {
            let sh = unsafe { shared(arg) };
            sh.log.push(11);
            rt.wake(sh.peer.unwrap());
        }

        let a = rt.spawn(sleeper, arg, "sleeper");
        sh.peer = Some(a);
        rt.spawn(waker, arg, "waker");

        assert_eq!(rt.run(), Ok(()));
        assert_eq!(sh.log, vec![10, 11, 12]);
    }

    #[test]
    fn test_wake_is_idempotent() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);
        let mut sh = Shared::new();
        let arg = &mut sh as *mut Shared as *mut ();

        fn parker(rt: &'static Scheduler, arg: *mut ()) {
            unsafe { shared(arg) }.log.push(1);
            rt.park(ParkReason::Interrupt);
            unsafe { shared(arg) }.log.push(2);
            // If the double wake had queued two entries, the scheduler
            // would try to resume this task again after it dies and halt.
        }
        fn double_waker(rt: &'static Scheduler, arg: *mut ()) {
            let sh = unsafe { shared(arg) };
            let peer = sh.peer.unwrap();
            rt.wake(peer);
            rt.wake(peer);
        }

        let a = rt.spawn(parker, arg, "parker");
        sh.peer = Some(a);
        rt.spawn(double_waker, arg, "double-waker");

        assert_eq!(rt.run(), Ok(()));
        assert_eq!(sh.log, vec![1, 2]);
    }

    #[test]
    fn test_wake_on_runnable_is_noop() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);
        let mut sh = Shared::new();
        let arg = &mut sh as *mut Shared as *mut ();

        fn quiet(rt: &'static Scheduler, arg: *mut ()) {
            unsafe { shared(arg) }.log.push(7);
            rt.yield_now();
        }
        fn noisy_waker(rt: &'static Scheduler, arg: *mut ()) {
            let sh = unsafe { shared(arg) };
            // Peer is Runnable (queued), not Parked: both wakes coalesce
            // into nothing.
            rt.wake(sh.peer.unwrap());
            rt.wake(sh.peer.unwrap());
            sh.log.push(8);
        }

        let a = rt.spawn(quiet, arg, "quiet");
        sh.peer = Some(a);
        rt.spawn(noisy_waker, arg, "noisy");

        assert_eq!(rt.run(), Ok(()));
        assert_eq!(sh.log, vec![7, 8]);
    }

    #[test]
    fn test_unwakeable_park_is_deadlock() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);

        fn forever(rt: &'static Scheduler, _arg: *mut ()) {
            rt.park(ParkReason::Channel);
        }

        rt.spawn(forever, core::ptr::null_mut(), "forever");
        assert_eq!(rt.run(), Err(RtError::Deadlock));
    }

    #[test]
    fn test_context_round_trip_preserves_locals() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);
        let mut sh = Shared::new();
        let arg = &mut sh as *mut Shared as *mut ();

        fn canary(rt: &'static Scheduler, arg: *mut ()) {
            let a: u64 = 0xA5A5_5A5A_0000_0001;
            let b: u64 = 0xDEAD_BEEF_CAFE_0002;
            let buf: [u64; 4] = [11, 22, 33, 44];
            core::hint::black_box(&buf);
            rt.yield_now();
            rt.yield_now();
            // Resumed at the exact next instruction with the frame intact
            let sum = a
                .wrapping_add(b)
                .wrapping_add(buf.iter().sum::<u64>());
            unsafe { shared(arg) }.log.push((sum & 0xFFFF_FFFF) as u32);
        }
        fn clobberer(rt: &'static Scheduler, _arg: *mut ()) {
            for _ in 0..4 {
                let junk: [u64; 32] = [0x4242_4242_4242_4242; 32];
                core::hint::black_box(&junk);
                rt.yield_now();
            }
        }

        rt.spawn(canary, arg, "canary");
        rt.spawn(clobberer, core::ptr::null_mut(), "clobberer");

        assert_eq!(rt.run(), Ok(()));
        let expected: u64 = 0xA5A5_5A5A_0000_0001u64
            .wrapping_add(0xDEAD_BEEF_CAFE_0002)
            .wrapping_add(11 + 22 + 33 + 44);
        assert_eq!(sh.log, vec![(expected & 0xFFFF_FFFF) as u32]);
    }

    #[test]
    fn test_sleep_wakes_via_timer_queue() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);
        let mut sh = Shared::new();
        let arg = &mut sh as *mut Shared as *mut ();

        fn sleeper(rt: &'static Scheduler, arg: *mut ()) {
            rt.sleep_ticks(5);
            let sh = unsafe { shared(arg) };
            sh.log.push(rt.now_ticks() as u32);
            sh.done = true;
        }
        fn tick_driver(rt: &'static Scheduler, arg: *mut ()) {
            for _ in 0..1_000 {
                if unsafe { shared(arg) }.done {
                    return;
                }
                // Play the tick interrupt: advance one tick, then let the
                // run loop process timers.
                CLOCK.advance(greenrt::config::CFG_NANOS_PER_TICK);
                rt.note_tick();
                rt.yield_now();
            }
        }

        rt.spawn(sleeper, arg, "sleeper");
        rt.spawn(tick_driver, arg, "tick-driver");

        assert_eq!(rt.run(), Ok(()));
        assert!(sh.done);
        assert_eq!(sh.log.len(), 1);
        assert!(sh.log[0] >= 5, "woke at tick {} before the deadline", sh.log[0]);
    }

    #[test]
    fn test_spurious_wake_reparks_until_deadline() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt = fresh_scheduler(&CLOCK);
        let mut sh = Shared::new();
        let arg = &mut sh as *mut Shared as *mut ();

        fn sleeper(rt: &'static Scheduler, arg: *mut ()) {
            rt.sleep_ticks(10);
            let sh = unsafe { shared(arg) };
            sh.log.push(rt.now_ticks() as u32);
            sh.done = true;
        }
        fn disturber(rt: &'static Scheduler, arg: *mut ()) {
            for _ in 0..1_000 {
                if unsafe { shared(arg) }.done {
                    return;
                }
                CLOCK.advance(greenrt::config::CFG_NANOS_PER_TICK);
                rt.note_tick();
                // Premature wake every tick; the sleeper must re-check
                // its deadline and park again.
                rt.wake(unsafe { shared(arg) }.peer.unwrap());
                rt.yield_now();
            }
        }

        let s = rt.spawn(sleeper, arg, "sleeper");
        sh.peer = Some(s);
        rt.spawn(disturber, arg, "disturber");

        assert_eq!(rt.run(), Ok(()));
        assert!(sh.done);
        assert_eq!(sh.log.len(), 1);
        assert!(
            sh.log[0] >= 10,
            "spurious wake let the sleeper return at tick {}",
            sh.log[0]
        );
    }

    #[test]
    fn test_two_schedulers_are_isolated() {
        static CLOCK_A: ManualClock = ManualClock::new();
        static CLOCK_B: ManualClock = ManualClock::new();
        let rt_a = fresh_scheduler(&CLOCK_A);
        let rt_b = fresh_scheduler(&CLOCK_B);
        let mut sh_a = Shared::new();
        let mut sh_b = Shared::new();

        fn tag(rt: &'static Scheduler, arg: *mut ()) {
            unsafe { shared(arg) }.log.push(99);
            rt.yield_now();
            unsafe { shared(arg) }.log.push(100);
        }

        rt_a.spawn(tag, &mut sh_a as *mut Shared as *mut (), "a");
        rt_b.spawn(tag, &mut sh_b as *mut Shared as *mut (), "b");

        assert_eq!(rt_a.run(), Ok(()));
        assert_eq!(rt_b.run(), Ok(()));
        assert_eq!(sh_a.log, vec![99, 100]);
        assert_eq!(sh_b.log, vec![99, 100]);
    }
}

#[cfg(all(test, target_arch = "x86_64"))]
mod gc_tests {
    use greenrt::clock::ManualClock;
    use greenrt::error::RtError;
    use greenrt::gc::RootScanner;
    use greenrt::sched::{Scheduler, TaskRef};
    use greenrt::types::ParkReason;

    const SENTINEL: usize = 0xDEAD_BEEF_CAFE_F00D;

    /// Collector stand-in: counts ranges and hunts for the sentinel word
    struct Hunt {
        ranges: usize,
        found: bool,
    }

    impl Hunt {
        fn new() -> Self {
            Self { ranges: 0, found: false }
        }
    }

    impl RootScanner for Hunt {
        fn scan_range(&mut self, low: *const usize, high: *const usize) {
            assert!(low <= high);
            self.ranges += 1;
            let mut p = low;
            while p < high {
                if unsafe { p.read() } == SENTINEL {
                    self.found = true;
                }
                p = unsafe { p.add(1) };
            }
        }
    }

    struct Shared {
        task: Option<TaskRef>,
        self_scan_found: bool,
    }

    #[test]
    fn test_scan_suspended_task_finds_stack_root() {
        static CLOCK: ManualClock = ManualClock::new();
        let rt: &'static Scheduler = Box::leak(Box::new(Scheduler::new(&CLOCK)));
        let mut sh = Shared { task: None, self_scan_found: false };

        fn holder(rt: &'static Scheduler, arg: *mut ()) {
            let root: usize = SENTINEL;
            core::hint::black_box(&root);

            // Scan ourselves while running: goes through the live-stack
            // primitive, a single range.
            let mut hunt = Hunt::new();
            let me = rt.current_task().unwrap();
            rt.scan_task_roots(me, &mut hunt);
            let sh = unsafe { &mut *(arg as *mut Shared) };
            sh.self_scan_found = hunt.found && hunt.ranges == 1;

            rt.park(ParkReason::Channel);
            core::hint::black_box(&root);
        }

        let t = rt.spawn(holder, &mut sh as *mut Shared as *mut (), "holder");
        sh.task = Some(t);

        // The holder parks with nothing to wake it; the run loop hands
        // control back and leaves its stack frozen for inspection.
        assert_eq!(rt.run(), Err(RtError::Deadlock));
        assert!(sh.self_scan_found);

        let mut hunt = Hunt::new();
        rt.scan_task_roots(sh.task.unwrap(), &mut hunt);
        // Saved register block plus the suspended stack region
        assert_eq!(hunt.ranges, 2);
        assert!(hunt.found, "sentinel not reported as a root candidate");
    }
}
