//! # Rule Propagation Service
//!
//! Applies role deltas across personnel in pages, leaving one Event audit
//! header per run and one log row per (person, role) attempt. Three entry
//! points share the machinery:
//!
//! - [`Propagator::apply_rule`] — grant a rule's role set to everyone its
//!   scope matches (rule create, or re-apply after update).
//! - [`Propagator::apply_removal_plan`] — revoke per reconciled group, after
//!   a rule update or delete.
//! - [`Propagator::assign_to`] / [`Propagator::revoke_from`] — manual batch
//!   over explicit employee numbers.
//!
//! A domain failure (missing role, missing person) is recorded on its log
//! row and the batch continues; a store-level failure aborts the run with
//! the already-written rows intact, and a re-invocation is safe because the
//! mutations are idempotent.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use pax_core::audit::{EventLogEntry, EventRecord, EventTotals, GrantAction, LogStatus};
use pax_core::error::StoreError;
use pax_core::ports::{AuditStore, DirectoryStore, PersonnelRef, RoleStore};
use pax_core::recon::ReconciliationGroup;
use pax_core::scope::Scope;
use pax_core::Rule;

/// Personnel fetched per page while walking a scope.
pub const PAGE_SIZE: u32 = 200;

/// Event type for the manual assign batch.
pub const EVENT_MANUAL_ASSIGN: &str = "manual.assign";
/// Event type for the manual revoke batch.
pub const EVENT_MANUAL_REVOKE: &str = "manual.revoke";

/// Outcome of one propagation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationSummary {
    /// The Event header the run wrote.
    pub event_id: Uuid,
    /// Personnel in scope for the run.
    pub total: u32,
    /// Successful mutation attempts.
    pub success: u32,
    /// Failed mutation attempts.
    pub fail: u32,
}

/// The propagation service.
pub struct Propagator {
    directory: Arc<dyn DirectoryStore>,
    roles: Arc<dyn RoleStore>,
    audit: Arc<dyn AuditStore>,
}

impl Propagator {
    /// Build a propagator over the directory, role catalog, and audit trail.
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        roles: Arc<dyn RoleStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            directory,
            roles,
            audit,
        }
    }

    /// Grant `rule`'s role set to every person its scope matches.
    pub async fn apply_rule(
        &self,
        rule: &Rule,
        event_type: &str,
        correlation_id: Uuid,
    ) -> Result<PropagationSummary, StoreError> {
        let total = self.directory.count_matching(&rule.scope).await? as u32;
        let event = EventRecord::open(event_type, Some(rule.id), correlation_id, total);
        self.audit.open_event(&event).await?;

        let mut success = 0u32;
        let mut fail = 0u32;
        if !rule.role_ids.is_empty() {
            let names = self.role_names(&rule.role_ids).await?;
            self.walk_scope(
                &rule.scope,
                event.id,
                &rule.role_ids,
                &names,
                GrantAction::Assigned,
                &mut success,
                &mut fail,
            )
            .await?;
        }

        self.finalize(event.id, event_type, total, success, fail).await
    }

    /// Apply a reconciliation removal plan: revoke each entry's role set
    /// from every person in its `(campus, title)` groups.
    pub async fn apply_removal_plan(
        &self,
        plan: &[ReconciliationGroup],
        event_type: &str,
        source_id: Option<Uuid>,
        correlation_id: Uuid,
    ) -> Result<PropagationSummary, StoreError> {
        let mut total = 0u32;
        for entry in plan {
            for (campus, title) in &entry.groups {
                let scope = Scope::new(Some(*campus), Some(*title));
                total += self.directory.count_matching(&scope).await? as u32;
            }
        }

        let event = EventRecord::open(event_type, source_id, correlation_id, total);
        self.audit.open_event(&event).await?;

        let mut success = 0u32;
        let mut fail = 0u32;
        for entry in plan {
            let names = self.role_names(&entry.roles_to_remove).await?;
            for (campus, title) in &entry.groups {
                let scope = Scope::new(Some(*campus), Some(*title));
                self.walk_scope(
                    &scope,
                    event.id,
                    &entry.roles_to_remove,
                    &names,
                    GrantAction::Revoked,
                    &mut success,
                    &mut fail,
                )
                .await?;
            }
        }

        self.finalize(event.id, event_type, total, success, fail).await
    }

    /// Manual batch: grant `role_ids` to each listed employee.
    pub async fn assign_to(
        &self,
        employee_nos: &[String],
        role_ids: &[Uuid],
        correlation_id: Uuid,
    ) -> Result<PropagationSummary, StoreError> {
        self.manual(
            GrantAction::Assigned,
            EVENT_MANUAL_ASSIGN,
            employee_nos,
            role_ids,
            correlation_id,
        )
        .await
    }

    /// Manual batch: revoke `role_ids` from each listed employee.
    pub async fn revoke_from(
        &self,
        employee_nos: &[String],
        role_ids: &[Uuid],
        correlation_id: Uuid,
    ) -> Result<PropagationSummary, StoreError> {
        self.manual(
            GrantAction::Revoked,
            EVENT_MANUAL_REVOKE,
            employee_nos,
            role_ids,
            correlation_id,
        )
        .await
    }

    async fn manual(
        &self,
        action: GrantAction,
        event_type: &str,
        employee_nos: &[String],
        role_ids: &[Uuid],
        correlation_id: Uuid,
    ) -> Result<PropagationSummary, StoreError> {
        let total = employee_nos.len() as u32;
        let event = EventRecord::open(event_type, None, correlation_id, total);
        self.audit.open_event(&event).await?;

        let names = self.role_names(role_ids).await?;
        let mut success = 0u32;
        let mut fail = 0u32;
        for employee_no in employee_nos {
            let logs = match self.directory.find_by_employee_no(employee_no).await? {
                Some(person) => {
                    let person = PersonnelRef {
                        id: person.id,
                        employee_no: person.employee_no,
                        full_name: person.full_name,
                    };
                    self.attempt_person(event.id, &person, role_ids, &names, action, &mut success, &mut fail)
                        .await?
                }
                None => {
                    // One failed row per requested role, so the audit trail
                    // shows exactly which grants never happened.
                    fail += role_ids.len() as u32;
                    role_ids
                        .iter()
                        .map(|role_id| EventLogEntry {
                            id: Uuid::new_v4(),
                            event_id: event.id,
                            employee_no: employee_no.clone(),
                            personnel_name: String::new(),
                            role_id: *role_id,
                            role_name: names.get(role_id).cloned().unwrap_or_default(),
                            action,
                            status: LogStatus::Failed,
                            error: Some(
                                StoreError::PersonnelNotFound(employee_no.clone()).to_string(),
                            ),
                        })
                        .collect()
                }
            };
            if !logs.is_empty() {
                self.audit.append_event_logs(&logs).await?;
            }
        }

        self.finalize(event.id, event_type, total, success, fail).await
    }

    /// Page through a scope, attempting `action` for each person × role and
    /// persisting one page of log rows at a time.
    #[allow(clippy::too_many_arguments)]
    async fn walk_scope(
        &self,
        scope: &Scope,
        event_id: Uuid,
        role_ids: &[Uuid],
        names: &BTreeMap<Uuid, String>,
        action: GrantAction,
        success: &mut u32,
        fail: &mut u32,
    ) -> Result<(), StoreError> {
        let mut after: Option<String> = None;
        loop {
            let page = self
                .directory
                .page_matching(scope, after.as_deref(), PAGE_SIZE)
                .await?;
            if page.is_empty() {
                break;
            }

            let mut logs = Vec::with_capacity(page.len() * role_ids.len());
            for person in &page {
                logs.extend(
                    self.attempt_person(event_id, person, role_ids, names, action, success, fail)
                        .await?,
                );
            }
            self.audit.append_event_logs(&logs).await?;

            after = page.last().map(|p| p.employee_no.clone());
            if (page.len() as u32) < PAGE_SIZE {
                break;
            }
        }
        Ok(())
    }

    /// One person × every role: returns the log rows, bumping the counters.
    /// Domain failures become failed rows; store-level failures propagate.
    async fn attempt_person(
        &self,
        event_id: Uuid,
        person: &PersonnelRef,
        role_ids: &[Uuid],
        names: &BTreeMap<Uuid, String>,
        action: GrantAction,
        success: &mut u32,
        fail: &mut u32,
    ) -> Result<Vec<EventLogEntry>, StoreError> {
        let mut logs = Vec::with_capacity(role_ids.len());
        for role_id in role_ids {
            let result = match action {
                GrantAction::Assigned => self.directory.assign_role(person.id, *role_id).await,
                GrantAction::Revoked => self.directory.revoke_role(person.id, *role_id).await,
            };
            let (status, error) = match result {
                Ok(_) => {
                    *success += 1;
                    (LogStatus::Success, None)
                }
                Err(e) if e.is_domain_failure() => {
                    warn!(
                        employee_no = %person.employee_no,
                        role_id = %role_id,
                        error = %e,
                        "role mutation failed"
                    );
                    *fail += 1;
                    (LogStatus::Failed, Some(e.to_string()))
                }
                Err(e) => return Err(e),
            };
            logs.push(EventLogEntry {
                id: Uuid::new_v4(),
                event_id,
                employee_no: person.employee_no.clone(),
                personnel_name: person.full_name.clone(),
                role_id: *role_id,
                role_name: names.get(role_id).cloned().unwrap_or_default(),
                action,
                status,
                error,
            });
        }
        Ok(logs)
    }

    /// Resolve role names once per run; a missing role simply has no name
    /// (its mutation attempts will fail and record the reason anyway).
    async fn role_names(&self, role_ids: &[Uuid]) -> Result<BTreeMap<Uuid, String>, StoreError> {
        let mut names = BTreeMap::new();
        for role_id in role_ids {
            if let Some(role) = self.roles.find(*role_id).await? {
                names.insert(*role_id, role.name);
            }
        }
        Ok(names)
    }

    async fn finalize(
        &self,
        event_id: Uuid,
        event_type: &str,
        total: u32,
        success: u32,
        fail: u32,
    ) -> Result<PropagationSummary, StoreError> {
        self.audit
            .finalize_event(
                event_id,
                EventTotals {
                    total,
                    success,
                    fail,
                },
            )
            .await?;
        info!(
            event_id = %event_id,
            event_type,
            total,
            success,
            fail,
            "propagation run completed"
        );
        Ok(PropagationSummary {
            event_id,
            total,
            success,
            fail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pax_core::domain::{Campus, Title};
    use pax_core::ports::Page;
    use pax_core::recon::removal_plan;
    use pax_testkit::{fixtures, MemStore};

    fn propagator(store: &Arc<MemStore>) -> Propagator {
        Propagator::new(store.clone(), store.clone(), store.clone())
    }

    #[tokio::test]
    async fn apply_rule_grants_every_role_to_every_match() {
        let store = Arc::new(MemStore::new());
        let r1 = fixtures::role("door-access");
        let r2 = fixtures::role("lab-access");
        store.seed_role(r1.clone());
        store.seed_role(r2.clone());
        for no in ["E-1", "E-2"] {
            store.seed_personnel(fixtures::personnel(
                no,
                Campus::Istanbul,
                Title::Engineer,
                vec![],
            ));
        }
        // An outsider the scope must not touch.
        store.seed_personnel(fixtures::personnel(
            "E-9",
            Campus::Ankara,
            Title::Engineer,
            vec![],
        ));

        let rule = fixtures::rule(
            "istanbul-engineers",
            Scope::new(Some(Campus::Istanbul), Some(Title::Engineer)),
            vec![r1.id, r2.id],
        );
        let summary = propagator(&store)
            .apply_rule(&rule, "rule.created", Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.success, 4);
        assert_eq!(summary.fail, 0);
        for no in ["E-1", "E-2"] {
            let person = store.person(no).unwrap();
            assert!(person.role_ids.contains(&r1.id));
            assert!(person.role_ids.contains(&r2.id));
        }
        assert!(store.person("E-9").unwrap().role_ids.is_empty());
    }

    #[tokio::test]
    async fn deleted_role_fails_its_rows_but_the_batch_continues() {
        // Three people, a rule granting two roles, one role deleted from the
        // catalog: expect three successes and three failures, and a
        // completed event header with total 3.
        let store = Arc::new(MemStore::new());
        let live = fixtures::role("live-role");
        let gone = fixtures::role("gone-role");
        store.seed_role(live.clone());
        let gone_id = gone.id;
        for no in ["E-1", "E-2", "E-3"] {
            store.seed_personnel(fixtures::personnel(
                no,
                Campus::Istanbul,
                Title::Engineer,
                vec![],
            ));
        }

        let rule = fixtures::rule(
            "istanbul-engineers",
            Scope::new(Some(Campus::Istanbul), Some(Title::Engineer)),
            vec![live.id, gone_id],
        );
        let summary = propagator(&store)
            .apply_rule(&rule, "rule.created", Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.success, 3);
        assert_eq!(summary.fail, 3);

        let events = store.list_events(Page::default()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_completed);
        assert_eq!(events[0].total_count, 3);
        assert_eq!(events[0].success_count, 3);
        assert_eq!(events[0].fail_count, 3);

        let logs = store.event_logs_snapshot();
        assert_eq!(logs.len(), 6);
        let failed: Vec<_> = logs.iter().filter(|l| l.status == LogStatus::Failed).collect();
        assert_eq!(failed.len(), 3);
        assert!(failed.iter().all(|l| l.role_id == gone_id));
        assert!(failed.iter().all(|l| l.error.is_some()));
    }

    #[tokio::test]
    async fn store_level_failure_aborts_but_leaves_the_header() {
        let store = Arc::new(MemStore::new());
        let role = fixtures::role("any");
        store.seed_role(role.clone());
        store.seed_personnel(fixtures::personnel(
            "E-1",
            Campus::Bursa,
            Title::Teacher,
            vec![],
        ));
        store.set_role_mutations_unavailable(true);

        let rule = fixtures::rule(
            "bursa-teachers",
            Scope::new(Some(Campus::Bursa), Some(Title::Teacher)),
            vec![role.id],
        );
        let err = propagator(&store)
            .apply_rule(&rule, "rule.created", Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Unavailable(_)));
        let events = store.list_events(Page::default()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_completed);
    }

    #[tokio::test]
    async fn removal_plan_revokes_only_uncovered_roles() {
        // The worked reconciliation example: (Istanbul, Engineer) granting
        // {1, 2, 3} changes while (Istanbul, *) still grants {2}; the plan
        // revokes {1, 3} and leaves {2} in place.
        let store = Arc::new(MemStore::new());
        let roles: Vec<_> = (0..3).map(|i| fixtures::role(&format!("r{i}"))).collect();
        for r in &roles {
            store.seed_role(r.clone());
        }
        let all_ids: Vec<Uuid> = roles.iter().map(|r| r.id).collect();
        store.seed_personnel(fixtures::personnel(
            "E-1",
            Campus::Istanbul,
            Title::Engineer,
            all_ids.clone(),
        ));

        let affected = Scope::new(Some(Campus::Istanbul), Some(Title::Engineer));
        let survivor = fixtures::rule(
            "istanbul-wide",
            Scope::new(Some(Campus::Istanbul), None),
            vec![all_ids[1]],
        );
        let occupied = vec![(Campus::Istanbul, Title::Engineer)];
        let plan = removal_plan(&affected, &all_ids, &[survivor], &occupied);

        let summary = propagator(&store)
            .apply_removal_plan(&plan, "rule.deleted", Some(Uuid::new_v4()), Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.success, 2);
        assert_eq!(summary.fail, 0);
        assert_eq!(store.person("E-1").unwrap().role_ids, vec![all_ids[1]]);
    }

    #[tokio::test]
    async fn manual_assign_records_missing_personnel_per_role() {
        let store = Arc::new(MemStore::new());
        let role = fixtures::role("badge");
        store.seed_role(role.clone());
        store.seed_personnel(fixtures::personnel(
            "E-1",
            Campus::Izmir,
            Title::Counselor,
            vec![],
        ));

        let summary = propagator(&store)
            .assign_to(
                &["E-1".to_string(), "E-404".to_string()],
                &[role.id],
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.fail, 1);
        assert!(store.person("E-1").unwrap().role_ids.contains(&role.id));

        let logs = store.event_logs_snapshot();
        let failed = logs.iter().find(|l| l.status == LogStatus::Failed).unwrap();
        assert_eq!(failed.employee_no, "E-404");
        assert!(failed.error.as_deref().unwrap().contains("personnel not found"));
    }

    #[tokio::test]
    async fn manual_revoke_is_idempotent_over_roles_not_held() {
        let store = Arc::new(MemStore::new());
        let role = fixtures::role("badge");
        store.seed_role(role.clone());
        store.seed_personnel(fixtures::personnel(
            "E-1",
            Campus::Izmir,
            Title::Counselor,
            vec![],
        ));

        let summary = propagator(&store)
            .revoke_from(&["E-1".to_string()], &[role.id], Uuid::new_v4())
            .await
            .unwrap();

        // Not-held counts as success: the desired end state holds.
        assert_eq!(summary.success, 1);
        assert_eq!(summary.fail, 0);
    }

    #[tokio::test]
    async fn rule_with_no_roles_finalizes_an_empty_run() {
        let store = Arc::new(MemStore::new());
        store.seed_personnel(fixtures::personnel(
            "E-1",
            Campus::Ankara,
            Title::Technician,
            vec![],
        ));

        let rule = fixtures::rule(
            "empty",
            Scope::new(Some(Campus::Ankara), Some(Title::Technician)),
            vec![],
        );
        let summary = propagator(&store)
            .apply_rule(&rule, "rule.created", Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.success, 0);
        assert_eq!(summary.fail, 0);
        assert!(store.event_logs_snapshot().is_empty());
    }
}
