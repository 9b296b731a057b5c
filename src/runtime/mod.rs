//! Runtime system
//!
//! Time sources, the cooperative scheduler, and a simulated host loop that
//! drives it.

pub mod clock;
pub mod host;
pub mod scheduler;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use host::SimulatedHost;
pub use scheduler::{Scheduler, SchedulerConfig, TaskHandle, TickReport};
