//! # Lifecycle Events and Scheduled Actions
//!
//! The HR system emits lifecycle events ("hire on date X", "terminate on
//! date X"). The relay forwards them; the intake handler turns each into a
//! durable [`ScheduledAction`] keyed by the event's id, and the daily
//! processor later converts due actions into actual role mutations.
//!
//! Scheduled actions are never deleted: `Pending → Completed` is the only
//! transition, and failures leave the row `Pending` for the next run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::EnumParseError;

/// What a scheduled action does when it becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Grant the roles the person's matching rules confer.
    Hire,
    /// Clear all roles and soft-delete the person.
    Terminate,
}

impl ActionType {
    /// Canonical storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hire => "hire",
            Self::Terminate => "terminate",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = EnumParseError;

    // Legacy schema versions stored numeric codes; both spellings accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hire" | "0" => Ok(Self::Hire),
            "terminate" | "1" => Ok(Self::Terminate),
            _ => Err(EnumParseError::new("ActionType", s)),
        }
    }
}

/// Lifecycle of one scheduled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Awaiting its effective date (or retry after a failed run).
    Pending,
    /// Applied by a daily-processor run. Terminal.
    Completed,
}

impl ActionStatus {
    /// Canonical storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" | "0" => Ok(Self::Pending),
            "completed" | "1" => Ok(Self::Completed),
            _ => Err(EnumParseError::new("ActionStatus", s)),
        }
    }
}

/// Inbound personnel lifecycle event, as delivered on the source log.
///
/// Field names mirror the wire format exactly — including the source
/// system's `occuredAtUtc` spelling, which is part of the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Source-assigned event id; idempotency key for ingestion.
    #[serde(rename = "eventId")]
    pub event_id: Uuid,
    /// Declared event type, resolved against the route table.
    #[serde(rename = "eventType")]
    pub event_type: String,
    /// Employee number the event concerns.
    #[serde(rename = "employeeNo")]
    pub employee_no: String,
    /// Date the intent takes effect.
    #[serde(rename = "effectiveDate")]
    pub effective_date: NaiveDate,
    /// When the source system recorded the event.
    #[serde(rename = "occuredAtUtc")]
    pub occurred_at_utc: DateTime<Utc>,
    /// Correlation id threaded through the audit trail.
    #[serde(rename = "correlationId")]
    pub correlation_id: Uuid,
}

/// A durable hire/terminate intent awaiting its effective date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAction {
    /// Stable action id.
    pub id: Uuid,
    /// Arrival-order sequence number, assigned by the store. Tie-breaker
    /// for actions sharing an effective date.
    pub seq: i64,
    /// The source event's id; unique — replaying the event is a no-op.
    pub external_event_id: Uuid,
    /// Employee number the action concerns.
    pub employee_no: String,
    /// Hire or terminate.
    pub action_type: ActionType,
    /// Date the action becomes due.
    pub effective_date: NaiveDate,
    /// Pending or completed.
    pub status: ActionStatus,
    /// Correlation id from the originating event.
    pub correlation_id: Uuid,
    /// When the action row was created.
    pub created_at: DateTime<Utc>,
    /// When a daily run completed the action, if it has.
    pub processed_at: Option<DateTime<Utc>>,
}

impl ScheduledAction {
    /// Whether this action should be picked up by a run dated `today`.
    ///
    /// Hires apply on their effective date; terminations apply the day
    /// after (access remains valid through the last working day).
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.status == ActionStatus::Pending
            && match self.action_type {
                ActionType::Hire => self.effective_date <= today,
                ActionType::Terminate => self.effective_date < today,
            }
    }
}

/// Insert form of a scheduled action; `id`, `seq`, and `created_at` are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScheduledAction {
    /// Idempotency key (the source event id).
    pub external_event_id: Uuid,
    /// Employee number the action concerns.
    pub employee_no: String,
    /// Hire or terminate.
    pub action_type: ActionType,
    /// Date the action becomes due.
    pub effective_date: NaiveDate,
    /// Correlation id from the originating event.
    pub correlation_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn action(action_type: ActionType, effective: NaiveDate) -> ScheduledAction {
        ScheduledAction {
            id: Uuid::new_v4(),
            seq: 1,
            external_event_id: Uuid::new_v4(),
            employee_no: "E-100".into(),
            action_type,
            effective_date: effective,
            status: ActionStatus::Pending,
            correlation_id: Uuid::new_v4(),
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    #[test]
    fn hire_is_due_on_its_effective_date() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert!(action(ActionType::Hire, d).is_due(d));
        assert!(action(ActionType::Hire, d).is_due(d.succ_opt().unwrap()));
        assert!(!action(ActionType::Hire, d).is_due(d.pred_opt().unwrap()));
    }

    #[test]
    fn terminate_is_due_only_after_its_effective_date() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert!(!action(ActionType::Terminate, d).is_due(d));
        assert!(action(ActionType::Terminate, d).is_due(d.succ_opt().unwrap()));
    }

    #[test]
    fn completed_action_is_never_due() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let mut a = action(ActionType::Hire, d);
        a.status = ActionStatus::Completed;
        assert!(!a.is_due(d));
    }

    #[test]
    fn action_status_accepts_legacy_numeric_codes() {
        assert_eq!("0".parse::<ActionStatus>().unwrap(), ActionStatus::Pending);
        assert_eq!("1".parse::<ActionStatus>().unwrap(), ActionStatus::Completed);
        assert_eq!(
            "Pending".parse::<ActionStatus>().unwrap(),
            ActionStatus::Pending
        );
        assert!("99".parse::<ActionStatus>().is_err());
    }

    #[test]
    fn lifecycle_event_uses_wire_field_names() {
        let event = LifecycleEvent {
            event_id: Uuid::new_v4(),
            event_type: "personnel.hired".into(),
            employee_no: "E-7".into(),
            effective_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            occurred_at_utc: Utc.with_ymd_and_hms(2026, 8, 25, 8, 0, 0).unwrap(),
            correlation_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("eventId"));
        assert!(json.contains("employeeNo"));
        // The source system's spelling, preserved verbatim.
        assert!(json.contains("occuredAtUtc"));

        let parsed: LifecycleEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
