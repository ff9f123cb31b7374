//! Scan Orchestrator (C6): the entry point for a library scan. Classifies
//! every candidate directory/archive against the existing catalog state and
//! either creates fresh work, clears and re-queues it, or resumes just the
//! missing derivatives.

mod classify;
mod service;

pub use classify::{classify, Action, ClassificationInput};
pub use service::ScanOrchestrator;
