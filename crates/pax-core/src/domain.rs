//! # Campus, Title, and the Core Aggregates
//!
//! Defines the two scoping dimensions (`Campus`, `Title`) as closed enums
//! and the three aggregates they govern: [`Role`], [`Rule`], and
//! [`Personnel`].
//!
//! ## Invariants
//!
//! - `Campus::ALL` / `Title::ALL` enumerate every variant in canonical
//!   order. Wildcard scope expansion iterates these slices, so adding a
//!   campus automatically widens every wildcard rule.
//! - Role membership is id-based on both sides (`Rule::role_ids`,
//!   `Personnel::role_ids`): the many-to-many graph is stored in join
//!   tables, never as live object references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::EnumParseError;
use crate::scope::Scope;

/// Every campus the system operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Campus {
    /// Istanbul campus.
    Istanbul,
    /// Ankara campus.
    Ankara,
    /// Izmir campus.
    Izmir,
    /// Bursa campus.
    Bursa,
}

impl Campus {
    /// All campuses in canonical order. Wildcard scopes expand over this.
    pub const ALL: &'static [Campus] = &[Self::Istanbul, Self::Ankara, Self::Izmir, Self::Bursa];

    /// Canonical storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Istanbul => "istanbul",
            Self::Ankara => "ankara",
            Self::Izmir => "izmir",
            Self::Bursa => "bursa",
        }
    }
}

impl fmt::Display for Campus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Campus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "istanbul" => Ok(Self::Istanbul),
            "ankara" => Ok(Self::Ankara),
            "izmir" => Ok(Self::Izmir),
            "bursa" => Ok(Self::Bursa),
            _ => Err(EnumParseError::new("Campus", s)),
        }
    }
}

/// Every personnel title the system scopes rules by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Title {
    /// Classroom teacher.
    Teacher,
    /// Engineering staff.
    Engineer,
    /// Administrative staff.
    Administrator,
    /// Guidance counselor.
    Counselor,
    /// Facility technician.
    Technician,
}

impl Title {
    /// All titles in canonical order. Wildcard scopes expand over this.
    pub const ALL: &'static [Title] = &[
        Self::Teacher,
        Self::Engineer,
        Self::Administrator,
        Self::Counselor,
        Self::Technician,
    ];

    /// Canonical storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Engineer => "engineer",
            Self::Administrator => "administrator",
            Self::Counselor => "counselor",
            Self::Technician => "technician",
        }
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Title {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "teacher" => Ok(Self::Teacher),
            "engineer" => Ok(Self::Engineer),
            "administrator" => Ok(Self::Administrator),
            "counselor" => Ok(Self::Counselor),
            "technician" => Ok(Self::Technician),
            _ => Err(EnumParseError::new("Title", s)),
        }
    }
}

/// An access role. Immutable identity; granted to personnel through rules,
/// scheduled actions, or manual batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role id.
    pub id: Uuid,
    /// Human-readable role name, carried into audit rows.
    pub name: String,
}

/// A declarative access rule: personnel matching `scope` hold `role_ids`.
///
/// At most one non-deleted rule may exist per distinct `(campus, title)`
/// pair, wildcards included. The store enforces this with a partial unique
/// index over the scope storage key; callers pre-check to return a friendly
/// conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Stable rule id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Which personnel this rule covers. `None` dimensions match any value.
    pub scope: Scope,
    /// Inactive rules grant nothing and are ignored by reconciliation.
    pub is_active: bool,
    /// Roles this rule grants, by id.
    pub role_ids: Vec<Uuid>,
    /// Soft-delete marker. Deleted rules keep their row for audit history.
    pub is_deleted: bool,
}

impl Rule {
    /// Whether this rule currently grants anything: active and not deleted.
    pub fn grants(&self) -> bool {
        self.is_active && !self.is_deleted
    }
}

/// A person known to the system.
///
/// The `role_ids` set is mutated only by rule propagation, reconciliation,
/// and scheduled-action processing — never by ordinary update paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personnel {
    /// Stable personnel id.
    pub id: Uuid,
    /// Employee number from the HR system; unique.
    pub employee_no: String,
    /// Full display name, carried into audit rows.
    pub full_name: String,
    /// Campus assignment.
    pub campus: Campus,
    /// Title.
    pub title: Title,
    /// Currently held roles, by id.
    pub role_ids: Vec<Uuid>,
    /// Soft-delete marker, set on termination.
    pub is_deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campus_round_trips_through_str() {
        for campus in Campus::ALL {
            assert_eq!(campus.as_str().parse::<Campus>().unwrap(), *campus);
        }
    }

    #[test]
    fn title_round_trips_through_str() {
        for title in Title::ALL {
            assert_eq!(title.as_str().parse::<Title>().unwrap(), *title);
        }
    }

    #[test]
    fn campus_parse_is_case_insensitive() {
        assert_eq!("Istanbul".parse::<Campus>().unwrap(), Campus::Istanbul);
        assert_eq!("ANKARA".parse::<Campus>().unwrap(), Campus::Ankara);
    }

    #[test]
    fn unknown_campus_is_rejected() {
        let err = "atlantis".parse::<Campus>().unwrap_err();
        assert_eq!(err.kind, "Campus");
        assert_eq!(err.value, "atlantis");
    }

    #[test]
    fn rule_grants_requires_active_and_not_deleted() {
        let mut rule = Rule {
            id: Uuid::new_v4(),
            name: "engineers".into(),
            scope: Scope::new(Some(Campus::Istanbul), Some(Title::Engineer)),
            is_active: true,
            role_ids: vec![],
            is_deleted: false,
        };
        assert!(rule.grants());
        rule.is_active = false;
        assert!(!rule.grants());
        rule.is_active = true;
        rule.is_deleted = true;
        assert!(!rule.grants());
    }
}
