//! ReviewHerald daemon: the review poll loop and its lifecycle reporting.

pub mod lifecycle;
pub mod poll_loop;

pub use lifecycle::{LifecycleEvent, LifecycleReporter};
pub use poll_loop::{LoopState, LoopStats, NextStep, PollLoop};
