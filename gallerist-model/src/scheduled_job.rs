use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ScheduledJobId, ScheduledJobRunId};
use crate::job::JobType;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: ScheduledJobId,
    pub name: String,
    pub job_type: JobType,
    pub cron_expression: String,
    pub interval_seconds: Option<i64>,
    pub is_enabled: bool,
    pub parameters: HashMap<String, Value>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub run_count: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub last_status: Option<RunStatus>,
    pub last_error: Option<String>,
    pub priority: i32,
    pub timeout_seconds: i64,
    pub max_retries: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggeredBy {
    Scheduler,
    Manual,
    Api,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduledJobRun {
    pub id: ScheduledJobRunId,
    pub scheduled_job_id: ScheduledJobId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub result: HashMap<String, Value>,
    pub error_message: Option<String>,
    pub triggered_by: TriggeredBy,
}
