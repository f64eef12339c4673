//! Core runtime modules

pub mod clock;
pub mod config;
pub mod critical;
pub mod cs_cell;
pub mod error;
pub mod gc;
pub mod sched;
pub mod task;
pub mod timer;
pub mod types;
