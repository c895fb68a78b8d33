//! # PgStore — The Ports, Implemented on PostgreSQL
//!
//! One pool-holding struct implements every port trait by delegating to the
//! per-table [`db`](crate::db) functions, mirroring the in-memory test
//! double so wiring code treats them interchangeably.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use pax_core::action::{NewScheduledAction, ScheduledAction};
use pax_core::audit::{
    EventLogEntry, EventRecord, EventTotals, JobLogEntry, JobRecord, OutboxMessage, RelayLogEntry,
};
use pax_core::domain::{Campus, Personnel, Role, Rule, Title};
use pax_core::error::StoreError;
use pax_core::ports::{
    ActionStore, AuditStore, DirectoryStore, JobStore, MutationOutcome, OutboxStore, Page,
    PersonnelRef, RelayAuditStore, RoleStore, RuleStore,
};
use pax_core::scope::Scope;

use crate::db;

/// PostgreSQL-backed implementation of every storage port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an initialized pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DirectoryStore for PgStore {
    async fn count_matching(&self, scope: &Scope) -> Result<u64, StoreError> {
        db::personnel::count_matching(&self.pool, scope).await
    }

    async fn page_matching(
        &self,
        scope: &Scope,
        after: Option<&str>,
        limit: u32,
    ) -> Result<Vec<PersonnelRef>, StoreError> {
        db::personnel::page_matching(&self.pool, scope, after, limit).await
    }

    async fn find_by_employee_no(
        &self,
        employee_no: &str,
    ) -> Result<Option<Personnel>, StoreError> {
        db::personnel::find_by_employee_no(&self.pool, employee_no).await
    }

    async fn assign_role(
        &self,
        personnel_id: Uuid,
        role_id: Uuid,
    ) -> Result<MutationOutcome, StoreError> {
        db::personnel::assign_role(&self.pool, personnel_id, role_id).await
    }

    async fn revoke_role(
        &self,
        personnel_id: Uuid,
        role_id: Uuid,
    ) -> Result<MutationOutcome, StoreError> {
        db::personnel::revoke_role(&self.pool, personnel_id, role_id).await
    }

    async fn clear_roles_and_retire(&self, personnel_id: Uuid) -> Result<(), StoreError> {
        db::personnel::clear_roles_and_retire(&self.pool, personnel_id).await
    }

    async fn occupied_groups(&self) -> Result<Vec<(Campus, Title)>, StoreError> {
        db::personnel::occupied_groups(&self.pool).await
    }
}

#[async_trait]
impl RuleStore for PgStore {
    async fn create(&self, rule: &Rule) -> Result<(), StoreError> {
        db::rules::create(&self.pool, rule).await
    }

    async fn update(&self, rule: &Rule) -> Result<(), StoreError> {
        db::rules::update(&self.pool, rule).await
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        db::rules::soft_delete(&self.pool, id).await
    }

    async fn find(&self, id: Uuid) -> Result<Option<Rule>, StoreError> {
        db::rules::find(&self.pool, id).await
    }

    async fn list(&self) -> Result<Vec<Rule>, StoreError> {
        db::rules::list(&self.pool).await
    }

    async fn active_overlapping(
        &self,
        scope: &Scope,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Rule>, StoreError> {
        db::rules::active_overlapping(&self.pool, scope, exclude).await
    }

    async fn find_active_by_scope_key(
        &self,
        campus_key: &str,
        title_key: &str,
    ) -> Result<Option<Rule>, StoreError> {
        db::rules::find_active_by_scope_key(&self.pool, campus_key, title_key).await
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn find(&self, id: Uuid) -> Result<Option<Role>, StoreError> {
        db::roles::find(&self.pool, id).await
    }

    async fn list(&self) -> Result<Vec<Role>, StoreError> {
        db::roles::list(&self.pool).await
    }
}

#[async_trait]
impl ActionStore for PgStore {
    async fn insert_if_absent(&self, action: &NewScheduledAction) -> Result<bool, StoreError> {
        db::scheduled_actions::insert_if_absent(&self.pool, action).await
    }

    async fn has_pending_terminate(&self, employee_no: &str) -> Result<bool, StoreError> {
        db::scheduled_actions::has_pending_terminate(&self.pool, employee_no).await
    }

    async fn due_actions(&self, today: NaiveDate) -> Result<Vec<ScheduledAction>, StoreError> {
        db::scheduled_actions::due_actions(&self.pool, today).await
    }

    async fn reload(&self, id: Uuid) -> Result<Option<ScheduledAction>, StoreError> {
        db::scheduled_actions::reload(&self.pool, id).await
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        db::scheduled_actions::mark_completed(&self.pool, id, processed_at).await
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn open_event(&self, event: &EventRecord) -> Result<(), StoreError> {
        db::events::open_event(&self.pool, event).await
    }

    async fn append_event_logs(&self, logs: &[EventLogEntry]) -> Result<(), StoreError> {
        db::events::append_event_logs(&self.pool, logs).await
    }

    async fn finalize_event(&self, id: Uuid, totals: EventTotals) -> Result<(), StoreError> {
        db::events::finalize_event(&self.pool, id, totals).await
    }

    async fn list_events(&self, page: Page) -> Result<Vec<EventRecord>, StoreError> {
        db::events::list_events(&self.pool, page).await
    }

    async fn event_logs(&self, event_id: Uuid) -> Result<Vec<EventLogEntry>, StoreError> {
        db::events::event_logs(&self.pool, event_id).await
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn open_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        db::jobs::open_job(&self.pool, job).await
    }

    async fn append_job_log(&self, log: &JobLogEntry) -> Result<(), StoreError> {
        db::jobs::append_job_log(&self.pool, log).await
    }

    async fn finalize_job(&self, id: Uuid) -> Result<(u32, u32), StoreError> {
        db::jobs::finalize_job(&self.pool, id).await
    }

    async fn list_jobs(&self, page: Page) -> Result<Vec<JobRecord>, StoreError> {
        db::jobs::list_jobs(&self.pool, page).await
    }
}

#[async_trait]
impl RelayAuditStore for PgStore {
    async fn record(&self, entry: &RelayLogEntry) -> Result<(), StoreError> {
        db::relay_log::record(&self.pool, entry).await
    }

    async fn list(&self, page: Page) -> Result<Vec<RelayLogEntry>, StoreError> {
        db::relay_log::list(&self.pool, page).await
    }
}

#[async_trait]
impl OutboxStore for PgStore {
    async fn forward(
        &self,
        message: &OutboxMessage,
        log: &RelayLogEntry,
    ) -> Result<(), StoreError> {
        db::outbox::forward(&self.pool, message, log).await
    }
}
