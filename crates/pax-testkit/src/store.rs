//! # MemStore — All Ports Over One In-Memory World
//!
//! One shared struct implements every port trait, so a single
//! `Arc<MemStore>` can be handed to each component under test and they all
//! observe the same state. Fault injection is limited to what the pipeline
//! actually distinguishes: a switch that makes role mutations return
//! `Unavailable`, for exercising the abort-and-retry paths.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use pax_core::action::{ActionStatus, NewScheduledAction, ScheduledAction};
use pax_core::audit::{
    EventLogEntry, EventRecord, EventTotals, JobLogEntry, JobRecord, JobStatus, LogStatus,
    OutboxMessage, RelayLogEntry,
};
use pax_core::domain::{Campus, Personnel, Role, Rule, Title};
use pax_core::error::StoreError;
use pax_core::ports::{
    ActionStore, AuditStore, DirectoryStore, JobStore, MutationOutcome, OutboxStore, Page,
    PersonnelRef, RelayAuditStore, RoleStore, RuleStore,
};
use pax_core::scope::Scope;

/// In-memory world implementing every storage port.
#[derive(Default)]
pub struct MemStore {
    personnel: Mutex<BTreeMap<String, Personnel>>,
    roles: Mutex<BTreeMap<Uuid, Role>>,
    rules: Mutex<Vec<Rule>>,
    actions: Mutex<Vec<ScheduledAction>>,
    next_seq: Mutex<i64>,
    events: Mutex<Vec<EventRecord>>,
    event_logs: Mutex<Vec<EventLogEntry>>,
    jobs: Mutex<Vec<JobRecord>>,
    job_logs: Mutex<Vec<JobLogEntry>>,
    relay_log: Mutex<Vec<RelayLogEntry>>,
    outbox: Mutex<Vec<OutboxMessage>>,
    fail_role_mutations: Mutex<bool>,
}

impl MemStore {
    /// Fresh, empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a role into the catalog.
    pub fn seed_role(&self, role: Role) {
        self.roles.lock().insert(role.id, role);
    }

    /// Seed a person into the directory.
    pub fn seed_personnel(&self, person: Personnel) {
        self.personnel.lock().insert(person.employee_no.clone(), person);
    }

    /// Seed a rule without going through the duplicate-scope check.
    pub fn seed_rule(&self, rule: Rule) {
        self.rules.lock().push(rule);
    }

    /// Remove a role from the catalog, simulating a deleted role that rules
    /// or plans still reference.
    pub fn drop_role(&self, id: Uuid) {
        self.roles.lock().remove(&id);
    }

    /// When set, `assign_role` and `revoke_role` fail with `Unavailable`.
    pub fn set_role_mutations_unavailable(&self, fail: bool) {
        *self.fail_role_mutations.lock() = fail;
    }

    /// Snapshot of one person, deleted or not.
    pub fn person(&self, employee_no: &str) -> Option<Personnel> {
        self.personnel.lock().get(employee_no).cloned()
    }

    /// Snapshot of all scheduled actions in arrival order.
    pub fn actions_snapshot(&self) -> Vec<ScheduledAction> {
        self.actions.lock().clone()
    }

    /// Snapshot of every event log row written so far.
    pub fn event_logs_snapshot(&self) -> Vec<EventLogEntry> {
        self.event_logs.lock().clone()
    }

    /// Snapshot of every job log row written so far.
    pub fn job_logs_snapshot(&self) -> Vec<JobLogEntry> {
        self.job_logs.lock().clone()
    }

    /// Snapshot of the staged outbox messages.
    pub fn outbox_snapshot(&self) -> Vec<OutboxMessage> {
        self.outbox.lock().clone()
    }

    fn page_slice<T: Clone>(rows: &[T], page: Page) -> Vec<T> {
        rows.iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DirectoryStore for MemStore {
    async fn count_matching(&self, scope: &Scope) -> Result<u64, StoreError> {
        let count = self
            .personnel
            .lock()
            .values()
            .filter(|p| !p.is_deleted && scope.matches(p.campus, p.title))
            .count();
        Ok(count as u64)
    }

    async fn page_matching(
        &self,
        scope: &Scope,
        after: Option<&str>,
        limit: u32,
    ) -> Result<Vec<PersonnelRef>, StoreError> {
        // BTreeMap keyed by employee_no gives the ascending order the
        // contract requires.
        Ok(self
            .personnel
            .lock()
            .values()
            .filter(|p| !p.is_deleted && scope.matches(p.campus, p.title))
            .filter(|p| after.map_or(true, |a| p.employee_no.as_str() > a))
            .take(limit as usize)
            .map(|p| PersonnelRef {
                id: p.id,
                employee_no: p.employee_no.clone(),
                full_name: p.full_name.clone(),
            })
            .collect())
    }

    async fn find_by_employee_no(
        &self,
        employee_no: &str,
    ) -> Result<Option<Personnel>, StoreError> {
        Ok(self
            .personnel
            .lock()
            .get(employee_no)
            .filter(|p| !p.is_deleted)
            .cloned())
    }

    async fn assign_role(
        &self,
        personnel_id: Uuid,
        role_id: Uuid,
    ) -> Result<MutationOutcome, StoreError> {
        if *self.fail_role_mutations.lock() {
            return Err(StoreError::Unavailable("role mutations disabled".into()));
        }
        if !self.roles.lock().contains_key(&role_id) {
            return Err(StoreError::RoleNotFound(role_id));
        }
        let mut personnel = self.personnel.lock();
        let person = personnel
            .values_mut()
            .find(|p| p.id == personnel_id && !p.is_deleted)
            .ok_or_else(|| StoreError::PersonnelNotFound(personnel_id.to_string()))?;
        if person.role_ids.contains(&role_id) {
            return Ok(MutationOutcome::AlreadyInState);
        }
        person.role_ids.push(role_id);
        Ok(MutationOutcome::Applied)
    }

    async fn revoke_role(
        &self,
        personnel_id: Uuid,
        role_id: Uuid,
    ) -> Result<MutationOutcome, StoreError> {
        if *self.fail_role_mutations.lock() {
            return Err(StoreError::Unavailable("role mutations disabled".into()));
        }
        let mut personnel = self.personnel.lock();
        let person = personnel
            .values_mut()
            .find(|p| p.id == personnel_id && !p.is_deleted)
            .ok_or_else(|| StoreError::PersonnelNotFound(personnel_id.to_string()))?;
        let before = person.role_ids.len();
        person.role_ids.retain(|r| *r != role_id);
        if person.role_ids.len() == before {
            return Ok(MutationOutcome::AlreadyInState);
        }
        Ok(MutationOutcome::Applied)
    }

    async fn clear_roles_and_retire(&self, personnel_id: Uuid) -> Result<(), StoreError> {
        let mut personnel = self.personnel.lock();
        let person = personnel
            .values_mut()
            .find(|p| p.id == personnel_id)
            .ok_or_else(|| StoreError::PersonnelNotFound(personnel_id.to_string()))?;
        person.role_ids.clear();
        person.is_deleted = true;
        Ok(())
    }

    async fn occupied_groups(&self) -> Result<Vec<(Campus, Title)>, StoreError> {
        let groups: BTreeSet<(Campus, Title)> = self
            .personnel
            .lock()
            .values()
            .filter(|p| !p.is_deleted)
            .map(|p| (p.campus, p.title))
            .collect();
        Ok(groups.into_iter().collect())
    }
}

#[async_trait]
impl RuleStore for MemStore {
    async fn create(&self, rule: &Rule) -> Result<(), StoreError> {
        let mut rules = self.rules.lock();
        let (campus, title) = rule.scope.storage_key();
        if rules
            .iter()
            .any(|r| !r.is_deleted && r.scope.storage_key() == (campus.clone(), title.clone()))
        {
            return Err(StoreError::DuplicateScope { campus, title });
        }
        rules.push(rule.clone());
        Ok(())
    }

    async fn update(&self, rule: &Rule) -> Result<(), StoreError> {
        let mut rules = self.rules.lock();
        let existing = rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or_else(|| StoreError::Backend(format!("rule not found: {}", rule.id)))?;
        existing.name = rule.name.clone();
        existing.scope = rule.scope;
        existing.is_active = rule.is_active;
        existing.role_ids = rule.role_ids.clone();
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut rules = self.rules.lock();
        let existing = rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::Backend(format!("rule not found: {id}")))?;
        existing.is_deleted = true;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Rule>, StoreError> {
        Ok(self.rules.lock().iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Rule>, StoreError> {
        Ok(self
            .rules
            .lock()
            .iter()
            .filter(|r| !r.is_deleted)
            .cloned()
            .collect())
    }

    async fn active_overlapping(
        &self,
        scope: &Scope,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Rule>, StoreError> {
        Ok(self
            .rules
            .lock()
            .iter()
            .filter(|r| r.grants() && r.scope.overlaps(scope) && Some(r.id) != exclude)
            .cloned()
            .collect())
    }

    async fn find_active_by_scope_key(
        &self,
        campus_key: &str,
        title_key: &str,
    ) -> Result<Option<Rule>, StoreError> {
        Ok(self
            .rules
            .lock()
            .iter()
            .find(|r| {
                !r.is_deleted
                    && r.scope.storage_key() == (campus_key.to_string(), title_key.to_string())
            })
            .cloned())
    }
}

#[async_trait]
impl RoleStore for MemStore {
    async fn find(&self, id: Uuid) -> Result<Option<Role>, StoreError> {
        Ok(self.roles.lock().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Role>, StoreError> {
        Ok(self.roles.lock().values().cloned().collect())
    }
}

#[async_trait]
impl ActionStore for MemStore {
    async fn insert_if_absent(&self, action: &NewScheduledAction) -> Result<bool, StoreError> {
        let mut actions = self.actions.lock();
        if actions
            .iter()
            .any(|a| a.external_event_id == action.external_event_id)
        {
            return Ok(false);
        }
        let mut next_seq = self.next_seq.lock();
        *next_seq += 1;
        actions.push(ScheduledAction {
            id: Uuid::new_v4(),
            seq: *next_seq,
            external_event_id: action.external_event_id,
            employee_no: action.employee_no.clone(),
            action_type: action.action_type,
            effective_date: action.effective_date,
            status: ActionStatus::Pending,
            correlation_id: action.correlation_id,
            created_at: Utc::now(),
            processed_at: None,
        });
        Ok(true)
    }

    async fn has_pending_terminate(&self, employee_no: &str) -> Result<bool, StoreError> {
        Ok(self.actions.lock().iter().any(|a| {
            a.employee_no == employee_no
                && a.status == ActionStatus::Pending
                && a.action_type == pax_core::action::ActionType::Terminate
        }))
    }

    async fn due_actions(&self, today: NaiveDate) -> Result<Vec<ScheduledAction>, StoreError> {
        Ok(self
            .actions
            .lock()
            .iter()
            .filter(|a| a.is_due(today))
            .cloned()
            .collect())
    }

    async fn reload(&self, id: Uuid) -> Result<Option<ScheduledAction>, StoreError> {
        Ok(self.actions.lock().iter().find(|a| a.id == id).cloned())
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut actions = self.actions.lock();
        let action = actions
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::Backend(format!("scheduled action not found: {id}")))?;
        action.status = ActionStatus::Completed;
        action.processed_at = Some(processed_at);
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemStore {
    async fn open_event(&self, event: &EventRecord) -> Result<(), StoreError> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    async fn append_event_logs(&self, logs: &[EventLogEntry]) -> Result<(), StoreError> {
        self.event_logs.lock().extend_from_slice(logs);
        Ok(())
    }

    async fn finalize_event(&self, id: Uuid, totals: EventTotals) -> Result<(), StoreError> {
        let mut events = self.events.lock();
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::Backend(format!("event not found: {id}")))?;
        event.total_count = totals.total;
        event.success_count = totals.success;
        event.fail_count = totals.fail;
        event.is_completed = true;
        Ok(())
    }

    async fn list_events(&self, page: Page) -> Result<Vec<EventRecord>, StoreError> {
        let mut events = self.events.lock().clone();
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(Self::page_slice(&events, page))
    }

    async fn event_logs(&self, event_id: Uuid) -> Result<Vec<EventLogEntry>, StoreError> {
        Ok(self
            .event_logs
            .lock()
            .iter()
            .filter(|l| l.event_id == event_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl JobStore for MemStore {
    async fn open_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.jobs.lock().push(job.clone());
        Ok(())
    }

    async fn append_job_log(&self, log: &JobLogEntry) -> Result<(), StoreError> {
        self.job_logs.lock().push(log.clone());
        Ok(())
    }

    async fn finalize_job(&self, id: Uuid) -> Result<(u32, u32), StoreError> {
        // Counts come from the written logs, never from the caller.
        let (success, failure) = {
            let logs = self.job_logs.lock();
            let success = logs
                .iter()
                .filter(|l| l.job_id == id && l.status == LogStatus::Success)
                .count() as u32;
            let failure = logs
                .iter()
                .filter(|l| l.job_id == id && l.status == LogStatus::Failed)
                .count() as u32;
            (success, failure)
        };
        let mut jobs = self.jobs.lock();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| StoreError::Backend(format!("job not found: {id}")))?;
        job.success_count = success;
        job.failure_count = failure;
        job.status = JobStatus::Completed;
        job.finished_at = Some(Utc::now());
        Ok((success, failure))
    }

    async fn list_jobs(&self, page: Page) -> Result<Vec<JobRecord>, StoreError> {
        let mut jobs = self.jobs.lock().clone();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(Self::page_slice(&jobs, page))
    }
}

#[async_trait]
impl RelayAuditStore for MemStore {
    async fn record(&self, entry: &RelayLogEntry) -> Result<(), StoreError> {
        self.relay_log.lock().push(entry.clone());
        Ok(())
    }

    async fn list(&self, page: Page) -> Result<Vec<RelayLogEntry>, StoreError> {
        let mut entries = self.relay_log.lock().clone();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Self::page_slice(&entries, page))
    }
}

#[async_trait]
impl OutboxStore for MemStore {
    async fn forward(
        &self,
        message: &OutboxMessage,
        log: &RelayLogEntry,
    ) -> Result<(), StoreError> {
        self.outbox.lock().push(message.clone());
        self.relay_log.lock().push(log.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use pax_core::action::ActionType;
    use pax_core::audit::RelayStatus;

    #[tokio::test]
    async fn forward_stages_the_message_with_its_log_row() {
        let store = MemStore::new();
        let message = OutboxMessage {
            id: Uuid::new_v4(),
            topic: "pax.scheduled-actions".into(),
            key: Some("E-1".into()),
            payload: serde_json::json!({"employeeNo": "E-1"}),
            published_at: Utc::now(),
        };
        let log = RelayLogEntry {
            id: Uuid::new_v4(),
            topic: "hr.lifecycle".into(),
            partition: 0,
            offset: 17,
            key: None,
            value: None,
            status: RelayStatus::Success,
            error_message: None,
            retry_count: 0,
            created_at: Utc::now(),
        };

        store.forward(&message, &log).await.unwrap();

        assert_eq!(store.outbox.lock().len(), 1);
        let listed = RelayAuditStore::list(&store, Page::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].offset, 17);
        assert_eq!(listed[0].status, RelayStatus::Success);
    }

    #[tokio::test]
    async fn paging_is_ordered_by_employee_no_and_resumes_after_cursor() {
        let store = MemStore::new();
        for no in ["E-003", "E-001", "E-002"] {
            store.seed_personnel(fixtures::personnel(
                no,
                Campus::Istanbul,
                Title::Engineer,
                vec![],
            ));
        }

        let scope = Scope::new(Some(Campus::Istanbul), Some(Title::Engineer));
        let first = store.page_matching(&scope, None, 2).await.unwrap();
        assert_eq!(
            first.iter().map(|p| p.employee_no.as_str()).collect::<Vec<_>>(),
            vec!["E-001", "E-002"]
        );

        let rest = store.page_matching(&scope, Some("E-002"), 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].employee_no, "E-003");
    }

    #[tokio::test]
    async fn assign_is_idempotent_and_validates_the_role() {
        let store = MemStore::new();
        let role = fixtures::role("gate-access");
        let role_id = role.id;
        store.seed_role(role);
        let person = fixtures::personnel("E-1", Campus::Ankara, Title::Teacher, vec![]);
        let person_id = person.id;
        store.seed_personnel(person);

        assert_eq!(
            store.assign_role(person_id, role_id).await.unwrap(),
            MutationOutcome::Applied
        );
        assert_eq!(
            store.assign_role(person_id, role_id).await.unwrap(),
            MutationOutcome::AlreadyInState
        );

        store.drop_role(role_id);
        let err = store.assign_role(person_id, role_id).await.unwrap_err();
        assert!(matches!(err, StoreError::RoleNotFound(id) if id == role_id));
    }

    #[tokio::test]
    async fn duplicate_scope_is_rejected_until_the_holder_is_deleted() {
        let store = MemStore::new();
        let scope = Scope::new(Some(Campus::Izmir), None);
        let first = fixtures::rule("izmir-wide", scope, vec![]);
        store.create(&first).await.unwrap();

        let second = fixtures::rule("izmir-wide-again", scope, vec![]);
        assert!(matches!(
            store.create(&second).await.unwrap_err(),
            StoreError::DuplicateScope { .. }
        ));

        store.soft_delete(first.id).await.unwrap();
        store.create(&second).await.unwrap();
    }

    #[tokio::test]
    async fn scheduled_actions_get_monotonic_seq_and_dedupe_on_event_id() {
        let store = MemStore::new();
        let event_id = Uuid::new_v4();
        let action = NewScheduledAction {
            external_event_id: event_id,
            employee_no: "E-5".into(),
            action_type: ActionType::Hire,
            effective_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            correlation_id: Uuid::new_v4(),
        };

        assert!(store.insert_if_absent(&action).await.unwrap());
        assert!(!store.insert_if_absent(&action).await.unwrap());

        let mut other = action.clone();
        other.external_event_id = Uuid::new_v4();
        assert!(store.insert_if_absent(&other).await.unwrap());

        let snapshot = store.actions_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[0].seq < snapshot[1].seq);
    }

    #[tokio::test]
    async fn finalize_job_recomputes_counts_from_logs() {
        let store = MemStore::new();
        let job = JobRecord::open("scheduled-actions", 3);
        store.open_job(&job).await.unwrap();
        for status in [LogStatus::Success, LogStatus::Success, LogStatus::Failed] {
            store
                .append_job_log(&JobLogEntry {
                    id: Uuid::new_v4(),
                    job_id: job.id,
                    message: "x".into(),
                    status,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let (success, failure) = store.finalize_job(job.id).await.unwrap();
        assert_eq!((success, failure), (2, 1));
        let listed = store.list_jobs(Page::default()).await.unwrap();
        assert_eq!(listed[0].status, JobStatus::Completed);
        assert!(listed[0].finished_at.is_some());
    }
}
