//! # Ports — Async Traits at the Storage Seam
//!
//! The relay, batch, and API layers are written against these traits, not
//! against a concrete store. `pax-store` implements them on PostgreSQL;
//! `pax-testkit` provides in-memory implementations so every pipeline
//! behavior is testable without a database.
//!
//! All mutations are idempotent: assigning a role already held (or revoking
//! one not held) reports [`MutationOutcome::AlreadyInState`] rather than
//! failing, which is what makes page-level retry after a store failure safe.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::action::{NewScheduledAction, ScheduledAction};
use crate::audit::{
    EventLogEntry, EventRecord, EventTotals, JobLogEntry, JobRecord, OutboxMessage, RelayLogEntry,
};
use crate::domain::{Campus, Personnel, Role, Rule, Title};
use crate::error::StoreError;
use crate::scope::Scope;

/// Upper bound on `per_page` for the operational listings.
pub const MAX_PER_PAGE: u32 = 200;

/// Page request for the read-only listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub page: u32,
    /// Rows per page, capped at [`MAX_PER_PAGE`].
    pub per_page: u32,
}

impl Page {
    /// Build a page request, clamping `page` to at least 1 and `per_page`
    /// into `1..=MAX_PER_PAGE`.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Row offset of this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    /// Row limit of this page.
    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 50)
    }
}

/// Result of an idempotent role mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The store changed state.
    Applied,
    /// The person already was in the requested state; nothing changed.
    AlreadyInState,
}

/// Minimal personnel projection used while paging through a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonnelRef {
    /// Stable personnel id.
    pub id: Uuid,
    /// Employee number; the stable paging key.
    pub employee_no: String,
    /// Display name, carried into audit rows.
    pub full_name: String,
}

/// Personnel directory: lookups, scope paging, and role mutations.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Count non-deleted personnel matching the scope.
    async fn count_matching(&self, scope: &Scope) -> Result<u64, StoreError>;

    /// Fetch up to `limit` non-deleted personnel matching the scope, in
    /// ascending `employee_no` order, strictly after `after` when given.
    /// The stable key guarantees forward progress for resumed batches.
    async fn page_matching(
        &self,
        scope: &Scope,
        after: Option<&str>,
        limit: u32,
    ) -> Result<Vec<PersonnelRef>, StoreError>;

    /// Look up a person by employee number (non-deleted only).
    async fn find_by_employee_no(&self, employee_no: &str)
        -> Result<Option<Personnel>, StoreError>;

    /// Grant a role. `RoleNotFound` if the role no longer exists;
    /// `AlreadyInState` if the person already holds it.
    async fn assign_role(
        &self,
        personnel_id: Uuid,
        role_id: Uuid,
    ) -> Result<MutationOutcome, StoreError>;

    /// Remove a role. `AlreadyInState` if the person does not hold it.
    async fn revoke_role(
        &self,
        personnel_id: Uuid,
        role_id: Uuid,
    ) -> Result<MutationOutcome, StoreError>;

    /// Terminate handling: clear every role and soft-delete the person.
    async fn clear_roles_and_retire(&self, personnel_id: Uuid) -> Result<(), StoreError>;

    /// Distinct `(campus, title)` pairs with at least one non-deleted
    /// person. Reconciliation only plans over groups that exist.
    async fn occupied_groups(&self) -> Result<Vec<(Campus, Title)>, StoreError>;
}

/// Access rules: CRUD plus the scope queries reconciliation needs.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Insert a rule. `DuplicateScope` if a non-deleted rule already covers
    /// the same `(campus, title)` storage key.
    async fn create(&self, rule: &Rule) -> Result<(), StoreError>;

    /// Replace a rule's name, scope, activity flag, and role set.
    async fn update(&self, rule: &Rule) -> Result<(), StoreError>;

    /// Soft-delete a rule; its row and audit history remain.
    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Fetch a rule by id (deleted ones included — callers filter).
    async fn find(&self, id: Uuid) -> Result<Option<Rule>, StoreError>;

    /// All non-deleted rules.
    async fn list(&self) -> Result<Vec<Rule>, StoreError>;

    /// Non-deleted, active rules overlapping the scope, excluding `exclude`
    /// when given. Input to the reconciliation engine.
    async fn active_overlapping(
        &self,
        scope: &Scope,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Rule>, StoreError>;

    /// The non-deleted rule holding this exact scope storage key, if any.
    /// Pre-check behind the partial unique index.
    async fn find_active_by_scope_key(
        &self,
        campus_key: &str,
        title_key: &str,
    ) -> Result<Option<Rule>, StoreError>;
}

/// Role catalog, used to resolve names for audit rows.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Fetch a role by id.
    async fn find(&self, id: Uuid) -> Result<Option<Role>, StoreError>;

    /// All roles.
    async fn list(&self) -> Result<Vec<Role>, StoreError>;
}

/// Durable scheduled-action queue.
#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Insert unless an action with the same `external_event_id` already
    /// exists. Returns `true` when a row was created.
    async fn insert_if_absent(&self, action: &NewScheduledAction) -> Result<bool, StoreError>;

    /// Whether a `Pending` terminate intent already exists for the employee.
    async fn has_pending_terminate(&self, employee_no: &str) -> Result<bool, StoreError>;

    /// All `Pending` actions due on `today`
    /// (hire: `effective_date <= today`; terminate: `effective_date < today`).
    async fn due_actions(&self, today: NaiveDate) -> Result<Vec<ScheduledAction>, StoreError>;

    /// Re-fetch an action's current state.
    async fn reload(&self, id: Uuid) -> Result<Option<ScheduledAction>, StoreError>;

    /// Transition `Pending → Completed`, stamping `processed_at`.
    async fn mark_completed(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Propagation audit trail (Event header + per-attempt logs).
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a freshly opened event header.
    async fn open_event(&self, event: &EventRecord) -> Result<(), StoreError>;

    /// Append a page of event logs.
    async fn append_event_logs(&self, logs: &[EventLogEntry]) -> Result<(), StoreError>;

    /// Write final counters and set `is_completed`.
    async fn finalize_event(&self, id: Uuid, totals: EventTotals) -> Result<(), StoreError>;

    /// Paged event headers, newest first.
    async fn list_events(&self, page: Page) -> Result<Vec<EventRecord>, StoreError>;

    /// All log rows of one event.
    async fn event_logs(&self, event_id: Uuid) -> Result<Vec<EventLogEntry>, StoreError>;
}

/// Daily-processor audit trail (Job header + per-action logs).
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a freshly opened job header.
    async fn open_job(&self, job: &JobRecord) -> Result<(), StoreError>;

    /// Append one job log row.
    async fn append_job_log(&self, log: &JobLogEntry) -> Result<(), StoreError>;

    /// Finalize the job: recompute success/failure counts from the written
    /// logs (never from in-memory counters) and mark it completed.
    /// Returns `(success_count, failure_count)`.
    async fn finalize_job(&self, id: Uuid) -> Result<(u32, u32), StoreError>;

    /// Paged job headers, newest first.
    async fn list_jobs(&self, page: Page) -> Result<Vec<JobRecord>, StoreError>;
}

/// Relay observability log. Write-once; failures to record are swallowed by
/// the caller so the relay never stalls on its own audit trail.
#[async_trait]
pub trait RelayAuditStore: Send + Sync {
    /// Record one inbound message's disposition.
    async fn record(&self, entry: &RelayLogEntry) -> Result<(), StoreError>;

    /// Paged relay log, newest first.
    async fn list(&self, page: Page) -> Result<Vec<RelayLogEntry>, StoreError>;
}

/// Transactional outbox for the destination bus.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Stage a message together with its relay-log row. The Postgres
    /// implementation commits both in one transaction, so a staged message
    /// never lacks its log row; the external sweeper handles delivery and
    /// retries.
    async fn forward(
        &self,
        message: &OutboxMessage,
        log: &RelayLogEntry,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_inputs() {
        let page = Page::new(0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 1);

        let page = Page::new(3, 10_000);
        assert_eq!(page.per_page, MAX_PER_PAGE);
    }

    #[test]
    fn page_offset_and_limit() {
        let page = Page::new(3, 50);
        assert_eq!(page.offset(), 100);
        assert_eq!(page.limit(), 50);
    }

    #[test]
    fn default_page_is_first_fifty() {
        let page = Page::default();
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 50);
        assert_eq!(page.offset(), 0);
    }
}
