//! # Daily Scheduled-Action Processor
//!
//! One run per day (or per manual trigger): select the due pending actions,
//! apply each in isolation, and leave a Job audit trail whose final counts
//! are recomputed from the written log rows. Re-invocation is safe — the
//! due-selection and the per-action re-fetch both filter out anything a
//! previous run already completed.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use pax_core::action::{ActionStatus, ActionType, ScheduledAction};
use pax_core::audit::{JobLogEntry, JobRecord, LogStatus};
use pax_core::error::StoreError;
use pax_core::ports::{ActionStore, DirectoryStore, JobStore, RuleStore};

/// Job type written on every daily-processor header.
pub const JOB_TYPE_SCHEDULED_ACTIONS: &str = "scheduled-actions";

/// Outcome of one daily run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// The Job header the run wrote.
    pub job_id: Uuid,
    /// Actions selected for the run.
    pub total: u32,
    /// Actions that completed.
    pub success: u32,
    /// Actions that failed and remain pending for the next run.
    pub failure: u32,
}

/// The daily processor.
pub struct DailyProcessor {
    actions: Arc<dyn ActionStore>,
    directory: Arc<dyn DirectoryStore>,
    rules: Arc<dyn RuleStore>,
    jobs: Arc<dyn JobStore>,
}

impl DailyProcessor {
    /// Build a processor over the stores it drives.
    pub fn new(
        actions: Arc<dyn ActionStore>,
        directory: Arc<dyn DirectoryStore>,
        rules: Arc<dyn RuleStore>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            actions,
            directory,
            rules,
            jobs,
        }
    }

    /// Process every action due on `today`.
    ///
    /// Hires apply on their effective date, terminations the day after.
    /// Actions are ordered by `(effective_date, seq)` so a same-day hire
    /// and terminate resolve in arrival order. Each action is isolated: a
    /// failure is logged against the job and the run continues.
    pub async fn run_daily(&self, today: NaiveDate) -> Result<RunSummary, StoreError> {
        let mut due = self.actions.due_actions(today).await?;
        due.sort_by(|a, b| {
            (a.effective_date, a.seq).cmp(&(b.effective_date, b.seq))
        });

        let job = JobRecord::open(JOB_TYPE_SCHEDULED_ACTIONS, due.len() as u32);
        self.jobs.open_job(&job).await?;
        info!(job_id = %job.id, total = due.len(), %today, "daily run started");

        for action in &due {
            // Another run may have completed it since selection.
            let current = match self.actions.reload(action.id).await? {
                Some(current) if current.status == ActionStatus::Pending => current,
                _ => continue,
            };

            let (status, message) = match self.apply(&current).await {
                Ok(message) => (LogStatus::Success, message),
                Err(e) => {
                    warn!(
                        action_id = %current.id,
                        employee_no = %current.employee_no,
                        error = %e,
                        "scheduled action failed; left pending for the next run"
                    );
                    (
                        LogStatus::Failed,
                        format!(
                            "{} {} failed: {e}",
                            current.action_type, current.employee_no
                        ),
                    )
                }
            };

            self.jobs
                .append_job_log(&JobLogEntry {
                    id: Uuid::new_v4(),
                    job_id: job.id,
                    message,
                    status,
                    created_at: Utc::now(),
                })
                .await?;
        }

        let (success, failure) = self.jobs.finalize_job(job.id).await?;
        info!(job_id = %job.id, success, failure, "daily run completed");
        Ok(RunSummary {
            job_id: job.id,
            total: due.len() as u32,
            success,
            failure,
        })
    }

    /// Apply one action; on success the action is marked completed and the
    /// returned message goes on its job log row.
    async fn apply(&self, action: &ScheduledAction) -> Result<String, StoreError> {
        let message = match action.action_type {
            ActionType::Hire => self.apply_hire(action).await?,
            ActionType::Terminate => self.apply_terminate(action).await?,
        };
        self.actions.mark_completed(action.id, Utc::now()).await?;
        Ok(message)
    }

    /// Hire: grant the union of the role sets of every active rule matching
    /// the person's `(campus, title)`. No matching rule is a no-op, not a
    /// failure — the person simply starts without rule-granted roles.
    async fn apply_hire(&self, action: &ScheduledAction) -> Result<String, StoreError> {
        let person = self
            .directory
            .find_by_employee_no(&action.employee_no)
            .await?
            .ok_or_else(|| StoreError::PersonnelNotFound(action.employee_no.clone()))?;

        let roles: BTreeSet<Uuid> = self
            .rules
            .list()
            .await?
            .iter()
            .filter(|r| r.grants() && r.scope.matches(person.campus, person.title))
            .flat_map(|r| r.role_ids.iter().copied())
            .collect();

        if roles.is_empty() {
            warn!(
                employee_no = %action.employee_no,
                campus = %person.campus,
                title = %person.title,
                "hire matched no rules; no roles granted"
            );
            return Ok(format!(
                "hire {}: no matching rules, nothing granted",
                action.employee_no
            ));
        }

        let mut granted = 0usize;
        for role_id in &roles {
            self.directory.assign_role(person.id, *role_id).await?;
            granted += 1;
        }
        Ok(format!(
            "hire {}: granted {granted} role(s)",
            action.employee_no
        ))
    }

    /// Terminate: clear every role and soft-delete the person.
    async fn apply_terminate(&self, action: &ScheduledAction) -> Result<String, StoreError> {
        let person = self
            .directory
            .find_by_employee_no(&action.employee_no)
            .await?
            .ok_or_else(|| StoreError::PersonnelNotFound(action.employee_no.clone()))?;
        self.directory.clear_roles_and_retire(person.id).await?;
        Ok(format!(
            "terminate {}: roles cleared, personnel retired",
            action.employee_no
        ))
    }
}
