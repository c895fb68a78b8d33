//! # Lifecycle Event Intake
//!
//! Downstream handler of relayed lifecycle events: each becomes a durable
//! [`ScheduledAction`](pax_core::ScheduledAction) keyed by the source event
//! id. Replays are no-ops; a second pending terminate intent for the same
//! employee is rejected.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use pax_core::action::{ActionType, LifecycleEvent, NewScheduledAction};
use pax_core::error::StoreError;
use pax_core::ports::ActionStore;

/// Event type announcing a hire intent.
pub const EVENT_HIRED: &str = "personnel.hired";
/// Event type announcing a terminate intent.
pub const EVENT_TERMINATED: &str = "personnel.terminated";

/// What ingesting one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// A new scheduled action was created.
    Scheduled,
    /// The event id was seen before; nothing changed.
    Duplicate,
}

/// Intake failure.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// The event type names no scheduled-action kind.
    #[error("unrecognized lifecycle event type: {0}")]
    UnknownEventType(String),

    /// A pending terminate intent already exists for the employee.
    #[error("a pending terminate action already exists for employee {0}")]
    PendingTerminateExists(String),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Lifecycle-event intake handler.
pub struct Intake {
    actions: Arc<dyn ActionStore>,
}

impl Intake {
    /// Build an intake over the action store.
    pub fn new(actions: Arc<dyn ActionStore>) -> Self {
        Self { actions }
    }

    /// Ingest one lifecycle event, idempotently on its event id.
    pub async fn ingest(&self, event: &LifecycleEvent) -> Result<IntakeOutcome, IntakeError> {
        let action_type = match event.event_type.as_str() {
            EVENT_HIRED => ActionType::Hire,
            EVENT_TERMINATED => ActionType::Terminate,
            other => return Err(IntakeError::UnknownEventType(other.to_string())),
        };

        // At most one pending terminate per employee. The check races with
        // concurrent intake only across distinct event ids, which the daily
        // processor tolerates (the second terminate finds an already-retired
        // person and fails its own job log row, nothing else).
        if action_type == ActionType::Terminate
            && self.actions.has_pending_terminate(&event.employee_no).await?
        {
            return Err(IntakeError::PendingTerminateExists(event.employee_no.clone()));
        }

        let created = self
            .actions
            .insert_if_absent(&NewScheduledAction {
                external_event_id: event.event_id,
                employee_no: event.employee_no.clone(),
                action_type,
                effective_date: event.effective_date,
                correlation_id: event.correlation_id,
            })
            .await?;

        if created {
            info!(
                event_id = %event.event_id,
                employee_no = %event.employee_no,
                action = %action_type,
                effective_date = %event.effective_date,
                "scheduled action created"
            );
            Ok(IntakeOutcome::Scheduled)
        } else {
            warn!(event_id = %event.event_id, "duplicate lifecycle event ignored");
            Ok(IntakeOutcome::Duplicate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use pax_core::action::ActionStatus;
    use pax_testkit::MemStore;
    use uuid::Uuid;

    fn event(event_type: &str, employee_no: &str) -> LifecycleEvent {
        LifecycleEvent {
            event_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            employee_no: employee_no.to_string(),
            effective_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            occurred_at_utc: Utc::now(),
            correlation_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn hire_event_becomes_a_pending_action() {
        let store = Arc::new(MemStore::new());
        let intake = Intake::new(store.clone());

        let outcome = intake.ingest(&event(EVENT_HIRED, "E-1")).await.unwrap();

        assert_eq!(outcome, IntakeOutcome::Scheduled);
        let actions = store.actions_snapshot();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::Hire);
        assert_eq!(actions[0].status, ActionStatus::Pending);
        assert_eq!(actions[0].employee_no, "E-1");
    }

    #[tokio::test]
    async fn replayed_event_is_a_noop() {
        let store = Arc::new(MemStore::new());
        let intake = Intake::new(store.clone());
        let e = event(EVENT_HIRED, "E-2");

        assert_eq!(intake.ingest(&e).await.unwrap(), IntakeOutcome::Scheduled);
        assert_eq!(intake.ingest(&e).await.unwrap(), IntakeOutcome::Duplicate);
        assert_eq!(store.actions_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn second_pending_terminate_is_rejected() {
        let store = Arc::new(MemStore::new());
        let intake = Intake::new(store.clone());

        intake
            .ingest(&event(EVENT_TERMINATED, "E-3"))
            .await
            .unwrap();
        let err = intake
            .ingest(&event(EVENT_TERMINATED, "E-3"))
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::PendingTerminateExists(ref no) if no == "E-3"));
        assert_eq!(store.actions_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn terminate_for_a_different_employee_is_unaffected() {
        let store = Arc::new(MemStore::new());
        let intake = Intake::new(store.clone());

        intake
            .ingest(&event(EVENT_TERMINATED, "E-4"))
            .await
            .unwrap();
        let outcome = intake
            .ingest(&event(EVENT_TERMINATED, "E-5"))
            .await
            .unwrap();
        assert_eq!(outcome, IntakeOutcome::Scheduled);
    }

    #[tokio::test]
    async fn unknown_event_type_is_rejected() {
        let store = Arc::new(MemStore::new());
        let intake = Intake::new(store.clone());

        let err = intake
            .ingest(&event("personnel.promoted", "E-6"))
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::UnknownEventType(ref t) if t == "personnel.promoted"));
        assert!(store.actions_snapshot().is_empty());
    }
}
