//! Job Tracker (C5): the lifecycle state machine and per-stage atomic
//! counters, plus the centralized [`Monitor`] that replaces a per-job
//! supervisor task.

mod monitor;
mod tracker;

pub use monitor::Monitor;
pub use tracker::JobTracker;
