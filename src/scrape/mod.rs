//! Periodic refresh of derived gauges.

mod scheduler;
mod size;

pub use scheduler::{DEFAULT_PERIOD_UNIT, SchedulerState, ScrapeOutcome, ScrapeScheduler};
pub use size::{DirectorySizeComputer, SizeComputer};
