use gallerist_model::{ScheduledJob, ScheduledJobId};

/// One outcome of diffing the DB's enabled scheduled jobs against the
/// in-memory registry (§4.10's reconciliation loop).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// New in DB, absent in registry.
    Register(ScheduledJobId),
    /// Present in both, but the cron expression differs — deregister then
    /// register fresh rather than trying to patch a live schedule in place.
    Reregister(ScheduledJobId),
    /// Disabled or deleted in DB while still present in registry.
    Deregister(ScheduledJobId),
}

/// Computes the reconciliation actions for one pass. `registered` is the
/// `(id, cron_expression)` pairs currently held in the registry; `enabled`
/// is every `ScheduledJob` the catalog currently reports as enabled.
pub fn diff(enabled: &[ScheduledJob], registered: &[(ScheduledJobId, String)]) -> Vec<ReconcileAction> {
    let mut actions = Vec::new();

    for job in enabled {
        match registered.iter().find(|(id, _)| *id == job.id) {
            None => actions.push(ReconcileAction::Register(job.id)),
            Some((_, cron)) if *cron != job.cron_expression => {
                actions.push(ReconcileAction::Reregister(job.id))
            }
            Some(_) => {}
        }
    }

    for (id, _) in registered {
        if !enabled.iter().any(|j| j.id == *id) {
            actions.push(ReconcileAction::Deregister(*id));
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallerist_model::Id;

    fn job(id: ScheduledJobId, cron: &str) -> ScheduledJob {
        ScheduledJob {
            id,
            name: "daily".into(),
            job_type: gallerist_model::JobType::LibraryScan,
            cron_expression: cron.to_string(),
            interval_seconds: None,
            is_enabled: true,
            parameters: Default::default(),
            last_run_at: None,
            next_run_at: None,
            run_count: 0,
            success_count: 0,
            failure_count: 0,
            last_status: None,
            last_error: None,
            priority: 0,
            timeout_seconds: 3600,
            max_retries: 0,
        }
    }

    #[test]
    fn registers_a_job_new_in_the_db() {
        let id = Id::generate();
        let actions = diff(&[job(id, "0 2 * * *")], &[]);
        assert_eq!(actions, vec![ReconcileAction::Register(id)]);
    }

    #[test]
    fn reregisters_when_cron_changes() {
        let id = Id::generate();
        let actions = diff(&[job(id, "0 3 * * *")], &[(id, "0 2 * * *".to_string())]);
        assert_eq!(actions, vec![ReconcileAction::Reregister(id)]);
    }

    #[test]
    fn deregisters_jobs_no_longer_enabled() {
        let id = Id::generate();
        let actions = diff(&[], &[(id, "0 2 * * *".to_string())]);
        assert_eq!(actions, vec![ReconcileAction::Deregister(id)]);
    }

    #[test]
    fn leaves_unchanged_jobs_alone() {
        let id = Id::generate();
        let actions = diff(&[job(id, "0 2 * * *")], &[(id, "0 2 * * *".to_string())]);
        assert!(actions.is_empty());
    }
}
