//! Fixture builders with sensible defaults, for terse test setup.

use chrono::NaiveDate;
use uuid::Uuid;

use pax_core::action::{ActionType, NewScheduledAction};
use pax_core::domain::{Campus, Personnel, Role, Rule, Title};
use pax_core::scope::Scope;

/// A person with the given assignment and starting roles.
pub fn personnel(
    employee_no: &str,
    campus: Campus,
    title: Title,
    role_ids: Vec<Uuid>,
) -> Personnel {
    Personnel {
        id: Uuid::new_v4(),
        employee_no: employee_no.to_string(),
        full_name: format!("Person {employee_no}"),
        campus,
        title,
        role_ids,
        is_deleted: false,
    }
}

/// A role with a fresh id.
pub fn role(name: &str) -> Role {
    Role {
        id: Uuid::new_v4(),
        name: name.to_string(),
    }
}

/// An active, non-deleted rule.
pub fn rule(name: &str, scope: Scope, role_ids: Vec<Uuid>) -> Rule {
    Rule {
        id: Uuid::new_v4(),
        name: name.to_string(),
        scope,
        is_active: true,
        role_ids,
        is_deleted: false,
    }
}

/// A hire or terminate intent ready for `insert_if_absent`.
pub fn new_action(
    employee_no: &str,
    action_type: ActionType,
    effective_date: NaiveDate,
) -> NewScheduledAction {
    NewScheduledAction {
        external_event_id: Uuid::new_v4(),
        employee_no: employee_no.to_string(),
        action_type,
        effective_date,
        correlation_id: Uuid::new_v4(),
    }
}
