//! Compile-time configuration for greenrt
//!
//! These constants control the resource limits of the runtime.
//! Stacks are statically sized: there is no growth and no backing store.

/// Maximum number of concurrently live tasks per scheduler instance
pub const CFG_MAX_TASKS: usize = 8;

/// Task stack size in machine words
pub const CFG_STACK_WORDS: usize = 1024;

/// Nanoseconds per scheduler tick (1 ms)
pub const CFG_NANOS_PER_TICK: i64 = 1_000_000;

/// Number of guard words at the low end of each task stack
pub const CFG_STACK_GUARD_WORDS: usize = 4;

/// Pattern written to stack guard words at spawn, checked at every suspension
pub const STACK_GUARD: usize = 0x7ac7_57ac;

/// Minimum usable stack size in words (guard excluded)
pub const CFG_STACK_SIZE_MIN: usize = 64;

const _: () = assert!(CFG_STACK_WORDS >= CFG_STACK_SIZE_MIN + CFG_STACK_GUARD_WORDS);

