//! Scheduler (C10): loads enabled `ScheduledJob`s into an in-memory
//! registry, reconciles against the catalog on a fixed cadence, and fires
//! cron-due triggers by publishing their work message.

mod reconcile;
mod service;

pub use reconcile::{diff, ReconcileAction};
pub use service::Scheduler;
