//! tickwork
//!
//! Cooperative background tasks for hosts that only hand out a per-frame
//! update callback: no threads, no async runtime, just `tick()`.
//!
//! # Example
//!
//! ```rust
//! use tickwork::runtime::scheduler::{sequence, Scheduler, Step};
//! use tickwork::runtime::ManualClock;
//!
//! let clock = ManualClock::new();
//! let scheduler = Scheduler::new(clock.clone());
//! let task = scheduler.start(sequence([Step::next(), Step::wait(1.0)]));
//!
//! scheduler.tick().unwrap(); // runs up to the first yield
//! scheduler.tick().unwrap(); // starts the one second wait
//! clock.advance(1.0);
//! scheduler.tick().unwrap(); // wait elapsed, routine exhausted
//! assert!(task.is_finished());
//! ```

#![doc(html_root_url = "https://docs.rs/tickwork")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod demo;
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use runtime::scheduler::{
    OwnerToken, Routine, Scheduler, SchedulerError, SchedulerResult, Step, TaskHandle, Yield,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "tickwork";
